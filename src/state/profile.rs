use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::kv::KvStore;
use super::schema::{self, AvatarPath, BackgroundColor, InstallDate, ProfileName, SelectedTitle};
use crate::error::{Result, StoreError};
use crate::media::{self, remove_best_effort, ImageSource};
use crate::titles::TierTable;

/// Longest display name accepted.
pub const MAX_NAME_LEN: usize = 40;

/// Background swatches offered in settings.
pub const PRESET_COLORS: [&str; 6] = ["#ffffff", "#f5f7ff", "#fff7ed", "#f0fdf4", "#fef2f2", "#f0f9ff"];

/// Everything the profile page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileState {
    pub name: String,
    /// Only set when the title is still unlocked
    pub selected_title: Option<String>,
    pub avatar: Option<PathBuf>,
    pub install_date: Option<DateTime<Utc>>,
    pub background_color: String,
}

/// Profile settings. Each field is its own storage key; none of them
/// depend on each other.
pub struct ProfileStore {
    kv: Arc<dyn KvStore>,
    data_dir: PathBuf,
    tiers: TierTable<'static>,
}

impl ProfileStore {
    /// `data_dir` is where the avatar copy is kept.
    pub fn new(kv: Arc<dyn KvStore>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            kv,
            data_dir: data_dir.into(),
            tiers: TierTable::standard(),
        }
    }

    /// Current profile, given how many outfits are saved.
    pub fn snapshot(&self, entry_count: u32) -> Result<ProfileState> {
        Ok(ProfileState {
            name: self.name()?,
            selected_title: self.selected_title(entry_count)?,
            avatar: self.avatar()?,
            install_date: schema::read::<InstallDate>(&*self.kv)?.0,
            background_color: self.background_color()?,
        })
    }

    pub fn name(&self) -> Result<String> {
        Ok(schema::read::<ProfileName>(&*self.kv)?.0)
    }

    pub fn set_name(&self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("name cannot be empty".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(StoreError::InvalidInput(format!("name is longer than {} characters", MAX_NAME_LEN)));
        }

        schema::write(&*self.kv, &ProfileName(name.to_string()))?;
        tracing::info!("✏️  Profile name set to {:?}", name);
        Ok(name.to_string())
    }

    /// The stored title, if it is still unlocked at `entry_count`.
    pub fn selected_title(&self, entry_count: u32) -> Result<Option<String>> {
        let stored = schema::read::<SelectedTitle>(&*self.kv)?.0;
        Ok(stored.filter(|label| self.tiers.is_unlocked(label, entry_count)))
    }

    /// Select a display title. Locked or unknown titles are ignored and
    /// `false` is returned.
    pub fn select_title(&self, label: &str, entry_count: u32) -> Result<bool> {
        if !self.tiers.is_unlocked(label, entry_count) {
            tracing::debug!("Ignored selection of locked title {:?}", label);
            return Ok(false);
        }
        schema::write(&*self.kv, &SelectedTitle(Some(label.to_string())))?;
        tracing::info!("🏷️  Title set to {:?}", label);
        Ok(true)
    }

    pub fn avatar(&self) -> Result<Option<PathBuf>> {
        let stored = schema::read::<AvatarPath>(&*self.kv)?.0;
        Ok(stored.map(PathBuf::from).filter(|p| p.is_file()))
    }

    /// Copy `source` into the data directory as the avatar photo.
    ///
    /// On error the stored avatar and its file are unchanged.
    pub async fn set_avatar(&self, source: &Path) -> Result<PathBuf> {
        media::check_source(source).await?;

        let previous = schema::read::<AvatarPath>(&*self.kv)?;
        let previous_path = previous.0.as_ref().map(PathBuf::from);
        let dest = self.data_dir.join(format!("avatar.{}", media::sniff_extension(source)));

        let staged = media::stage(source, &dest).await?;
        if let Err(e) = schema::write(&*self.kv, &AvatarPath(Some(dest.to_string_lossy().to_string()))) {
            staged.discard().await;
            return Err(e.into());
        }

        if let Err(e) = staged.publish().await {
            if previous_path.as_deref() != Some(dest.as_path()) {
                if let Err(restore) = schema::write(&*self.kv, &previous) {
                    tracing::warn!("⚠️  Could not restore previous avatar: {}", restore);
                }
            }
            return Err(e.into());
        }

        if let Some(old) = previous_path.filter(|old| old != &dest) {
            remove_best_effort(&old).await;
        }

        tracing::info!("🖼️  Avatar updated: {}", dest.display());
        Ok(dest)
    }

    pub async fn set_avatar_from(&self, source: &dyn ImageSource) -> Result<PathBuf> {
        let picked = source.acquire()?;
        self.set_avatar(&picked).await
    }

    pub async fn clear_avatar(&self) -> Result<()> {
        let previous = schema::read::<AvatarPath>(&*self.kv)?.0;
        self.kv.remove(<AvatarPath as schema::Schema>::KEY)?;
        if let Some(old) = previous {
            remove_best_effort(Path::new(&old)).await;
        }
        Ok(())
    }

    /// Record the first launch. Later calls return the stored timestamp.
    pub fn ensure_install_date(&self) -> Result<DateTime<Utc>> {
        if let Some(existing) = schema::read::<InstallDate>(&*self.kv)?.0 {
            return Ok(existing);
        }
        let now = Utc::now();
        schema::write(&*self.kv, &InstallDate(Some(now)))?;
        tracing::info!("🎉 First launch recorded at {}", now.to_rfc3339());
        Ok(now)
    }

    pub fn background_color(&self) -> Result<String> {
        Ok(schema::read::<BackgroundColor>(&*self.kv)?.0)
    }

    /// Accepts `#rgb`, `#rrggbb` or `#rrggbbaa`; stored lower-case.
    pub fn set_background_color(&self, color: &str) -> Result<String> {
        let color = normalize_hex_color(color)
            .ok_or_else(|| StoreError::InvalidInput(format!("{:?} is not a hex colour", color)))?;
        schema::write(&*self.kv, &BackgroundColor(color.clone()))?;
        tracing::info!("🎨 Background colour set to {}", color);
        Ok(color)
    }
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

fn normalize_hex_color(value: &str) -> Option<String> {
    let value = value.trim();
    let digits = value.strip_prefix('#')?;
    let valid = matches!(digits.len(), 3 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit());
    valid.then(|| format!("#{}", digits.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::kv::MemoryKv;

    fn store() -> (tempfile::TempDir, ProfileStore) {
        let (dir, _kv, profile) = store_with_kv();
        (dir, profile)
    }

    fn store_with_kv() -> (tempfile::TempDir, Arc<MemoryKv>, ProfileStore) {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(MemoryKv::new());
        let profile = ProfileStore::new(kv.clone(), dir.path());
        (dir, kv, profile)
    }

    #[test]
    fn test_defaults() {
        let (_dir, profile) = store();
        let state = profile.snapshot(0).unwrap();
        assert_eq!(state.name, "John Doe");
        assert_eq!(state.selected_title, None);
        assert_eq!(state.avatar, None);
        assert_eq!(state.install_date, None);
        assert_eq!(state.background_color, "#ffffff");
    }

    #[test]
    fn test_set_name() {
        let (_dir, profile) = store();
        assert_eq!(profile.set_name("  Ada  ").unwrap(), "Ada");
        assert_eq!(profile.name().unwrap(), "Ada");

        assert!(matches!(profile.set_name("   "), Err(StoreError::InvalidInput(_))));
        assert!(profile.set_name(&"x".repeat(41)).is_err());
        assert_eq!(profile.name().unwrap(), "Ada");
    }

    #[test]
    fn test_locked_title_is_a_no_op() {
        let (_dir, profile) = store();
        assert!(!profile.select_title("Style Icon", 10).unwrap());
        assert!(!profile.select_title("Made Up", 1000).unwrap());
        assert_eq!(profile.selected_title(1000).unwrap(), None);

        assert!(profile.select_title("Closet Explorer", 5).unwrap());
        assert_eq!(profile.selected_title(5).unwrap().as_deref(), Some("Closet Explorer"));

        // Deleting outfits locks it again
        assert_eq!(profile.selected_title(4).unwrap(), None);
    }

    #[test]
    fn test_install_date_written_once() {
        let (_dir, profile) = store();
        let first = profile.ensure_install_date().unwrap();
        let second = profile.ensure_install_date().unwrap();
        assert_eq!(first, second);
        assert_eq!(profile.snapshot(0).unwrap().install_date, Some(first));
    }

    #[test]
    fn test_background_color() {
        let (_dir, profile) = store();
        for preset in PRESET_COLORS {
            assert_eq!(profile.set_background_color(preset).unwrap(), preset);
        }
        assert_eq!(profile.set_background_color("#ABC").unwrap(), "#abc");
        assert_eq!(profile.set_background_color("#111111FF").unwrap(), "#111111ff");

        for bad in ["fff", "#ggg", "#12345", "", "red"] {
            assert!(matches!(profile.set_background_color(bad), Err(StoreError::InvalidInput(_))), "{}", bad);
        }
        assert_eq!(profile.background_color().unwrap(), "#111111ff");
    }

    #[tokio::test]
    async fn test_avatar_is_copied_and_replaced() {
        let (dir, profile) = store();
        let first = dir.path().join("pick1.png");
        let second = dir.path().join("pick2.jpg");
        std::fs::write(&first, b"one").unwrap();
        std::fs::write(&second, b"two").unwrap();

        let stored = profile.set_avatar(&first).await.unwrap();
        assert_eq!(stored, dir.path().join("avatar.png"));
        assert_eq!(profile.avatar().unwrap(), Some(stored.clone()));

        let replaced = profile.set_avatar_from(&media::PickedFile(second)).await.unwrap();
        assert_eq!(replaced, dir.path().join("avatar.jpg"));
        assert!(!stored.exists());
        assert_eq!(std::fs::read(&replaced).unwrap(), b"two");

        profile.clear_avatar().await.unwrap();
        assert_eq!(profile.avatar().unwrap(), None);
        assert!(!replaced.exists());
    }

    #[tokio::test]
    async fn test_avatar_from_missing_source() {
        let (dir, profile) = store();
        let err = profile.set_avatar(&dir.path().join("nope.jpg")).await.unwrap_err();
        assert!(matches!(err, StoreError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_failed_avatar_update_keeps_previous_photo() {
        let (dir, kv, profile) = store_with_kv();
        let first = dir.path().join("pick1.png");
        let second = dir.path().join("pick2.png");
        std::fs::write(&first, b"one").unwrap();
        std::fs::write(&second, b"two").unwrap();
        let stored = profile.set_avatar(&first).await.unwrap();

        kv.fail_writes(true);
        let err = profile.set_avatar(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));

        assert_eq!(profile.avatar().unwrap(), Some(stored.clone()));
        assert_eq!(std::fs::read(&stored).unwrap(), b"one");
        assert!(!media::import::staging_path(&stored).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_avatar_from_locked_source() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, profile) = store();
        let locked = dir.path().join("locked.jpg");
        std::fs::write(&locked, b"x").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::File::open(&locked).is_ok() {
            return;
        }

        let err = profile.set_avatar(&locked).await.unwrap_err();
        assert!(matches!(err, StoreError::SourceUnavailable(media::SourceError::PermissionDenied(_))));
        assert_eq!(profile.avatar().unwrap(), None);
    }
}
