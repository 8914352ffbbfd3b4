use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StorageError;

/// String-keyed, string-valued persistent storage.
///
/// Every profile field and the serialized entry map is one independent
/// key. Writes replace the whole value.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Key-value table in a SQLite database file.
pub struct SqliteKv {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteKv {
    /// Open or create the database at `db_path`.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let db_path = db_path.into();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        tracing::info!("📁 Database opened at: {}", db_path.display());

        let kv = SqliteKv { conn: Mutex::new(conn), db_path };
        kv.init_schema()?;
        Ok(kv)
    }

    /// Private in-memory database, gone when dropped.
    pub fn in_memory() -> Result<Self, StorageError> {
        let kv = SqliteKv {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: PathBuf::from(":memory:"),
        };
        kv.init_schema()?;
        Ok(kv)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS kv (
                    key         TEXT PRIMARY KEY,
                    value       TEXT NOT NULL,
                    updated_at  INTEGER NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T, StorageError> {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(f(&*conn)?)
    }
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
                .optional()
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![key, value, chrono::Utc::now().timestamp()],
            )?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
            Ok(())
        })
    }
}

impl std::fmt::Debug for SqliteKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKv")
            .field("db_path", &self.db_path)
            .finish()
    }
}

/// Volatile storage for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryKv {
    values: Mutex<HashMap<String, String>>,
    #[cfg(test)]
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every following `set`/`remove` fail like a full disk.
    #[cfg(test)]
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        #[cfg(test)]
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure").into());
        }
        Ok(())
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.values().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(kv: &dyn KvStore) {
        assert_eq!(kv.get("bgColor").unwrap(), None);

        kv.set("bgColor", "#fff7ed").unwrap();
        assert_eq!(kv.get("bgColor").unwrap().as_deref(), Some("#fff7ed"));

        kv.set("bgColor", "#f0fdf4").unwrap();
        assert_eq!(kv.get("bgColor").unwrap().as_deref(), Some("#f0fdf4"));

        kv.remove("bgColor").unwrap();
        assert_eq!(kv.get("bgColor").unwrap(), None);

        // Removing a missing key is fine
        kv.remove("bgColor").unwrap();
    }

    #[test]
    fn test_sqlite_kv() {
        exercise(&SqliteKv::in_memory().unwrap());
    }

    #[test]
    fn test_memory_kv() {
        exercise(&MemoryKv::new());
    }

    #[test]
    fn test_sqlite_kv_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("cloday.db");

        SqliteKv::open(&path).unwrap().set("profileName", "Ada").unwrap();

        let reopened = SqliteKv::open(&path).unwrap();
        assert_eq!(reopened.get("profileName").unwrap().as_deref(), Some("Ada"));
        assert_eq!(reopened.path(), path.as_path());
    }

    #[test]
    fn test_memory_kv_write_failure() {
        let kv = MemoryKv::new();
        kv.set("k", "v").unwrap();
        kv.fail_writes(true);
        assert!(kv.set("k", "w").is_err());
        assert!(kv.remove("k").is_err());
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("v"));
    }
}
