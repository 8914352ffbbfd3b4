/// Where Cloday keeps its data
///
/// Everything lives under one data directory:
/// - Linux: ~/.local/share/cloday
/// - macOS: ~/Library/Application Support/cloday
/// - Windows: %APPDATA%\cloday
///
/// `CLODAY_DATA_DIR` overrides the location.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "CLODAY_DATA_DIR";

const APP_DIR_NAME: &str = "cloday";
const PHOTOS_DIR_NAME: &str = "photos";
const DB_FILE_NAME: &str = "cloday.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Root directory (avatar copy lives here)
    pub data_dir: PathBuf,
    /// One image per diary day, named `{date}.{ext}`
    pub photos_dir: PathBuf,
    /// SQLite key-value database
    pub db_path: PathBuf,
}

impl AppConfig {
    /// Layout rooted at an explicit directory.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let data_dir = root.into();
        Self {
            photos_dir: data_dir.join(PHOTOS_DIR_NAME),
            db_path: data_dir.join(DB_FILE_NAME),
            data_dir,
        }
    }

    /// Resolve the data directory from the environment, then the platform
    /// data directory, then the home directory.
    pub fn from_env() -> Option<Self> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return Some(Self::at(PathBuf::from(dir)));
        }
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push(APP_DIR_NAME);
        Some(Self::at(path))
    }

    /// Create the data and photos directories if they don't exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.photos_dir)?;
        Ok(())
    }

    pub fn photos_dir(&self) -> &Path {
        &self.photos_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_root() {
        let config = AppConfig::at("/data/cloday");
        assert_eq!(config.photos_dir, PathBuf::from("/data/cloday/photos"));
        assert_eq!(config.db_path, PathBuf::from("/data/cloday/cloday.db"));
    }

    #[test]
    fn test_ensure_dirs_creates_photo_folder() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::at(dir.path().join("nested"));
        config.ensure_dirs().unwrap();
        assert!(config.photos_dir().is_dir());
    }
}
