//! Copy transient source images into app-owned storage
//!
//! Picker and camera references can disappear once the picking session
//! ends, so every photo is copied to a stable path before it is recorded.

use std::io::Read;
use std::path::{Path, PathBuf};

use tokio::fs;

use super::SourceError;
use crate::error::StorageError;

/// Extension used when nothing usable can be sniffed.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Longest extension accepted from a source path.
const MAX_EXTENSION_LEN: usize = 5;

/// Bytes read from the file header when the path has no extension.
const SNIFF_BYTES: usize = 32;

/// Suffix of the temporary file a copy is staged in.
pub const STAGING_SUFFIX: &str = "partial";

/// Pick the extension for a stored copy of `source`.
///
/// Uses the lower-cased path extension when it is short and alphanumeric.
/// When the path has none, the file header is sniffed. Falls back to `jpg`.
pub fn sniff_extension(source: &Path) -> String {
    match source.extension().map(|e| e.to_string_lossy().to_lowercase()) {
        Some(ext) if is_reasonable(&ext) => ext,
        Some(_) => DEFAULT_EXTENSION.to_string(),
        None => sniff_header(source).unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
    }
}

fn is_reasonable(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

fn sniff_header(source: &Path) -> Option<String> {
    let mut file = std::fs::File::open(source).ok()?;
    let mut header = vec![0u8; SNIFF_BYTES];
    let read = file.read(&mut header).ok()?;
    header.truncate(read);

    let format = image::guess_format(&header).ok()?;
    format.extensions_str().first().map(|e| e.to_string())
}

/// Check that `source` is a regular file the process may open.
///
/// Permission problems are reported apart from missing or broken sources.
pub async fn check_source(source: &Path) -> Result<(), SourceError> {
    let unreadable = |e: std::io::Error| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            SourceError::PermissionDenied(source.display().to_string())
        } else {
            SourceError::Unreadable(format!("{}: {}", source.display(), e))
        }
    };

    let meta = fs::metadata(source).await.map_err(unreadable)?;
    if !meta.is_file() {
        return Err(SourceError::Unreadable(format!("{} is not a file", source.display())));
    }
    fs::File::open(source).await.map_err(unreadable)?;
    Ok(())
}

/// A full copy of a source sitting next to its final path.
///
/// Nothing at `dest` changes until [`publish`](Self::publish) renames the
/// staged file over it.
#[derive(Debug)]
pub struct StagedCopy {
    staging: PathBuf,
    dest: PathBuf,
}

impl StagedCopy {
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Move the staged bytes into place, replacing any file at `dest`.
    pub async fn publish(self) -> Result<PathBuf, StorageError> {
        if let Err(e) = fs::rename(&self.staging, &self.dest).await {
            remove_best_effort(&self.staging).await;
            return Err(e.into());
        }
        Ok(self.dest)
    }

    /// Drop the staged copy, leaving `dest` as it was.
    pub async fn discard(self) {
        remove_best_effort(&self.staging).await;
    }
}

/// Copy `source` into `dest.partial`.
pub async fn stage(source: &Path, dest: &Path) -> Result<StagedCopy, StorageError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    let staging = staging_path(dest);
    if let Err(e) = fs::copy(source, &staging).await {
        remove_best_effort(&staging).await;
        return Err(e.into());
    }

    Ok(StagedCopy {
        staging,
        dest: dest.to_path_buf(),
    })
}

/// Copy `source` to `dest`, replacing whatever is there.
///
/// A failed copy (disk full, unreadable source) leaves any previous `dest`
/// untouched.
pub async fn copy_into(source: &Path, dest: &Path) -> Result<PathBuf, StorageError> {
    stage(source, dest).await?.publish().await
}

/// Delete a file, logging anything but "already gone".
pub async fn remove_best_effort(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("⚠️  Could not delete {}: {}", path.display(), e),
    }
}

/// `photo.jpg` -> `photo.jpg.partial`
pub fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".");
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}
