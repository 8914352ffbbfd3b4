use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use tokio::fs;
use tokio::sync::{OwnedMutexGuard, RwLock};
use walkdir::WalkDir;

use super::data::{EntryMap, OutfitEntry};
use super::kv::KvStore;
use super::schema::{self, OutfitCount, Schema, StoredEntries, UNREADABLE_ENTRIES_KEY};
use crate::config::AppConfig;
use crate::dates::{self, Clock, SystemClock};
use crate::error::{Result, StorageError, StoreError};
use crate::media::{self, remove_best_effort, Gallery, ImageSource};

/// The EntryStore owns the date -> photo mapping and the photo files.
///
/// Photos live in one app-owned directory, one file per day named
/// `{date}.{ext}`. The mapping is persisted as a whole to the key-value
/// store after every change; the in-memory copy is only replaced once that
/// write succeeded.
///
/// Mutations of the same day are serialized. `load`, `clear_all` and
/// `sweep_orphans` run exclusively.
pub struct EntryStore {
    kv: Arc<dyn KvStore>,
    photos_dir: PathBuf,
    clock: Arc<dyn Clock>,
    entries: Mutex<EntryMap>,
    day_locks: DayLocks,
    gate: RwLock<()>,
}

impl EntryStore {
    pub fn new(kv: Arc<dyn KvStore>, photos_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            photos_dir: photos_dir.into(),
            clock,
            entries: Mutex::new(EntryMap::new()),
            day_locks: DayLocks::default(),
            gate: RwLock::new(()),
        }
    }

    /// Store over the configured photos directory, using the local clock.
    pub fn with_config(config: &AppConfig, kv: Arc<dyn KvStore>) -> Self {
        Self::new(kv, config.photos_dir.clone(), Arc::new(SystemClock))
    }

    pub fn photos_dir(&self) -> &Path {
        &self.photos_dir
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn is_editable(&self, date: NaiveDate) -> bool {
        dates::is_editable_on(date, self.today())
    }

    pub fn is_future(&self, date: NaiveDate) -> bool {
        dates::is_future_on(date, self.today())
    }

    /// Read the persisted mapping and drop entries whose photo is gone.
    ///
    /// Never fails: unreadable storage yields an empty diary. When entries
    /// were pruned (or legacy entries adopted) the cleaned mapping is
    /// written back once. Unreferenced files in the photos directory are
    /// swept afterwards, unless a stored mapping could not be decoded: that
    /// value is kept aside and its photos stay on disk.
    pub async fn load(&self) -> EntryMap {
        let _exclusive = self.gate.write().await;

        let stored = match schema::read_checked::<StoredEntries>(&*self.kv) {
            Ok(decoded) => {
                if decoded.fell_back {
                    self.keep_unreadable_mapping();
                }
                decoded.value
            }
            Err(e) => {
                tracing::warn!("⚠️  Could not read saved outfits, starting empty: {}", e);
                *self.lock_entries() = EntryMap::new();
                return EntryMap::new();
            }
        };

        let mut cleaned = EntryMap::new();
        let mut changed = false;

        for (key, raw_path) in &stored.0 {
            let Some(date) = dates::parse_iso(key) else {
                tracing::warn!("⚠️  Pruned entry with invalid date key {:?}", key);
                changed = true;
                continue;
            };

            let path = resolve_stored_path(raw_path);
            if !is_existing_file(&path).await {
                tracing::warn!("⚠️  Pruned {}: photo {} no longer exists", date, path.display());
                changed = true;
                continue;
            }

            if path.parent() == Some(self.photos_dir.as_path()) {
                changed |= path.as_os_str() != raw_path.as_str();
                cleaned.insert(date, path);
                continue;
            }

            // Written before photos were copied: adopt the file
            match self.adopt(date, &path).await {
                Ok(stable) => {
                    tracing::info!("📥 Adopted {} into {}", path.display(), stable.display());
                    cleaned.insert(date, stable);
                }
                Err(e) => tracing::warn!("⚠️  Pruned {}: could not copy {}: {}", date, path.display(), e),
            }
            changed = true;
        }

        if changed {
            match self.persist(&cleaned) {
                Ok(()) => tracing::info!("🔄 Saved cleaned outfit map ({} entries)", cleaned.len()),
                Err(e) => tracing::warn!("⚠️  Could not save cleaned outfit map: {}", e),
            }
        }

        *self.lock_entries() = cleaned.clone();

        if self.sweep_allowed() {
            match self.sweep_unreferenced(&cleaned).await {
                Ok(0) => {}
                Ok(n) => tracing::info!("🧹 Removed {} unreferenced photo files", n),
                Err(e) => tracing::warn!("⚠️  Orphan sweep failed: {}", e),
            }
        }

        tracing::info!("✅ Loaded {} outfits", cleaned.len());
        cleaned
    }

    /// Save a photo for `date`, copying `source` into the photos directory.
    ///
    /// Returns the stable path. A previous photo for the same day is
    /// replaced. On error the mapping and the previous photo are unchanged.
    pub async fn capture(&self, date: NaiveDate, source: &Path) -> Result<PathBuf> {
        self.ensure_editable(date)?;
        let _shared = self.gate.read().await;
        let _day = self.day_locks.lock(date).await;

        media::check_source(source).await?;
        fs::create_dir_all(&self.photos_dir).await?;

        let dest = self
            .photos_dir
            .join(format!("{}.{}", dates::to_iso(date), media::sniff_extension(source)));
        let previous = self.lock_entries().get(date).map(|e| e.photo_path);

        // Staged next to dest; moved into place only once the mapping is saved
        let staged = media::stage(source, &dest).await?;

        if let Err(e) = self.commit(|map| map.insert(date, dest.clone())) {
            staged.discard().await;
            return Err(e.into());
        }

        if let Err(e) = staged.publish().await {
            if previous.as_deref() != Some(dest.as_path()) {
                self.restore_entry(date, previous);
            }
            return Err(e.into());
        }

        if let Some(old) = previous.filter(|old| old != &dest) {
            remove_best_effort(&old).await;
        }

        tracing::info!("📸 Saved outfit for {}: {}", date, dest.display());
        Ok(dest)
    }

    /// Ask a camera or picker for an image, then [`capture`](Self::capture) it.
    pub async fn capture_from(&self, date: NaiveDate, source: &dyn ImageSource) -> Result<PathBuf> {
        self.ensure_editable(date)?;
        let picked = source.acquire()?;
        self.capture(date, &picked).await
    }

    /// Delete the outfit for `date`.
    ///
    /// Returns false when there was nothing to delete. The photo file is
    /// removed after the mapping is saved; failing to delete it is only
    /// logged.
    pub async fn remove(&self, date: NaiveDate) -> Result<bool> {
        self.ensure_editable(date)?;
        let _shared = self.gate.read().await;
        let _day = self.day_locks.lock(date).await;

        if !self.lock_entries().contains(date) {
            return Ok(false);
        }

        let removed = self.commit(|map| map.remove(date))?;
        if let Some(path) = removed {
            remove_best_effort(&path).await;
        }

        tracing::info!("🗑️  Deleted outfit for {}", date);
        Ok(true)
    }

    pub fn get(&self, date: NaiveDate) -> Option<OutfitEntry> {
        self.lock_entries().get(date)
    }

    /// Snapshot of the current mapping.
    pub fn entries(&self) -> EntryMap {
        self.lock_entries().clone()
    }

    /// Number of saved outfits (titles unlock on this).
    pub fn count(&self) -> u32 {
        self.lock_entries().count()
    }

    /// Remove every outfit and photo. Ignores the edit window.
    pub async fn clear_all(&self) -> Result<usize> {
        let _exclusive = self.gate.write().await;

        let removed = self.commit(std::mem::take)?;
        for path in removed.paths() {
            remove_best_effort(path).await;
        }

        tracing::info!("🧹 Cleared {} outfits", removed.len());
        Ok(removed.len())
    }

    /// Hand the photo for `date` to a gallery ("save to gallery").
    pub fn export(&self, date: NaiveDate, gallery: &dyn Gallery) -> Result<PathBuf> {
        let entry = self.get(date).ok_or(StoreError::NotFound { date })?;
        Ok(gallery.save(&entry.photo_path)?)
    }

    /// Delete files in the photos directory that no entry references.
    ///
    /// Does nothing while an undecodable mapping is kept aside.
    pub async fn sweep_orphans(&self) -> Result<usize> {
        let _exclusive = self.gate.write().await;
        if !self.sweep_allowed() {
            return Ok(0);
        }
        let current = self.entries();
        Ok(self.sweep_unreferenced(&current).await?)
    }

    fn ensure_editable(&self, date: NaiveDate) -> Result<()> {
        if self.is_editable(date) {
            Ok(())
        } else {
            Err(StoreError::NotEditable { date })
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, EntryMap> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `change` to a copy of the mapping, persist it, then publish it.
    ///
    /// Holding the entries lock across the (synchronous) write keeps
    /// concurrent changes to different days from overwriting each other.
    fn commit<T>(&self, change: impl FnOnce(&mut EntryMap) -> T) -> std::result::Result<T, StorageError> {
        let mut entries = self.lock_entries();
        let mut next = entries.clone();
        let out = change(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(out)
    }

    fn persist(&self, map: &EntryMap) -> std::result::Result<(), StorageError> {
        let stored = StoredEntries(
            map.iter()
                .map(|e| (dates::to_iso(e.date), e.photo_path.to_string_lossy().to_string()))
                .collect(),
        );
        schema::write(&*self.kv, &stored)?;

        // The count key only mirrors the map
        if let Err(e) = schema::write(&*self.kv, &OutfitCount(map.count())) {
            tracing::warn!("⚠️  Could not update outfit count: {}", e);
        }
        Ok(())
    }

    /// Put back the mapping of `date` after its new photo could not be moved
    /// into place.
    fn restore_entry(&self, date: NaiveDate, previous: Option<PathBuf>) {
        let restored = self.commit(|map| match previous {
            Some(path) => map.insert(date, path),
            None => map.remove(date),
        });
        if let Err(e) = restored {
            tracing::warn!("⚠️  Could not restore outfit mapping for {}: {}", date, e);
        }
    }

    /// Save the raw mapping that failed to decode, once, so a later write of
    /// the mapping does not lose it.
    fn keep_unreadable_mapping(&self) {
        let kept = self.kv.get(UNREADABLE_ENTRIES_KEY).and_then(|existing| {
            if existing.is_some() {
                return Ok(());
            }
            match self.kv.get(StoredEntries::KEY)? {
                Some(raw) => self.kv.set(UNREADABLE_ENTRIES_KEY, &raw),
                None => Ok(()),
            }
        });
        match kept {
            Ok(()) => tracing::warn!(
                "⚠️  Saved outfits could not be decoded; kept under {:?}, photo files left in place",
                UNREADABLE_ENTRIES_KEY
            ),
            Err(e) => tracing::warn!("⚠️  Could not keep undecodable outfit map: {}", e),
        }
    }

    /// Orphan sweeps need a mapping known to be complete.
    fn sweep_allowed(&self) -> bool {
        match self.kv.get(UNREADABLE_ENTRIES_KEY) {
            Ok(None) => true,
            Ok(Some(_)) => {
                tracing::debug!("Orphan sweep skipped: undecodable outfit map is kept");
                false
            }
            Err(e) => {
                tracing::debug!("Orphan sweep skipped: {}", e);
                false
            }
        }
    }

    async fn adopt(&self, date: NaiveDate, path: &Path) -> std::result::Result<PathBuf, StorageError> {
        let dest = self
            .photos_dir
            .join(format!("{}.{}", dates::to_iso(date), media::sniff_extension(path)));
        media::copy_into(path, &dest).await
    }

    async fn sweep_unreferenced(&self, map: &EntryMap) -> std::result::Result<usize, StorageError> {
        if !fs::try_exists(&self.photos_dir).await? {
            return Ok(0);
        }

        let referenced: HashSet<PathBuf> = map.paths().map(Path::to_path_buf).collect();
        let photos_dir = self.photos_dir.clone();

        // Directory walking is blocking
        let removed = tokio::task::spawn_blocking(move || -> std::io::Result<usize> {
            let mut removed = 0;
            for entry in WalkDir::new(&photos_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() || referenced.contains(entry.path()) {
                    continue;
                }
                std::fs::remove_file(entry.path())?;
                tracing::debug!("Removed orphan {}", entry.path().display());
                removed += 1;
            }
            Ok(removed)
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("Task join error: {}", e)))??;

        Ok(removed)
    }
}

impl std::fmt::Debug for EntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStore")
            .field("photos_dir", &self.photos_dir)
            .field("entries", &self.lock_entries().len())
            .finish()
    }
}

/// One async mutex per diary day.
#[derive(Default)]
struct DayLocks {
    table: Mutex<HashMap<NaiveDate, Arc<tokio::sync::Mutex<()>>>>,
}

impl DayLocks {
    async fn lock(&self, date: NaiveDate) -> OwnedMutexGuard<()> {
        let day_lock = {
            let mut table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Locks nobody holds or waits for
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            table.entry(date).or_default().clone()
        };
        day_lock.lock_owned().await
    }
}

/// Stored values may be `file://` URIs from older versions.
fn resolve_stored_path(raw: &str) -> PathBuf {
    PathBuf::from(raw.strip_prefix("file://").unwrap_or(raw))
}

async fn is_existing_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}
