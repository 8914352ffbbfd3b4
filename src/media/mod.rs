/// Media collaborators and file handling
///
/// This module handles:
/// - The narrow traits the store uses to talk to OS capabilities
///   (camera, photo picker, gallery, URI launcher)
/// - Sniffing a file extension from a transient source reference
/// - Copying a source into an app-owned stable path (import.rs)
/// - Feedback mail drafts (mail.rs)

pub mod import;
pub mod mail;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use import::{check_source, copy_into, remove_best_effort, sniff_extension, stage, StagedCopy};
pub use mail::MailDraft;

/// Failure reported by an OS collaborator.
///
/// Each variant is distinguishable so the front end can show a specific
/// message instead of crashing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("cancelled by user")]
    Cancelled,

    #[error("no application available to handle {0}")]
    NoHandler(String),

    #[error("source not readable: {0}")]
    Unreadable(String),
}

/// Camera or photo-library picker: gives a readable, possibly transient,
/// image reference.
pub trait ImageSource: Send + Sync {
    fn acquire(&self) -> Result<PathBuf, SourceError>;
}

/// Destination for "save to gallery".
pub trait Gallery: Send + Sync {
    fn save(&self, photo: &Path) -> Result<PathBuf, SourceError>;
}

/// Opens an external URI (web link or `mailto:`).
pub trait Launcher {
    fn open_uri(&self, uri: &str) -> Result<(), SourceError>;
}

/// A file the user already picked, e.g. passed on the command line.
#[derive(Debug, Clone)]
pub struct PickedFile(pub PathBuf);

impl ImageSource for PickedFile {
    fn acquire(&self) -> Result<PathBuf, SourceError> {
        if self.0.is_file() {
            Ok(self.0.clone())
        } else {
            Err(SourceError::Unreadable(self.0.display().to_string()))
        }
    }
}

/// Gallery backed by a plain folder (desktop "Pictures/Cloday").
#[derive(Debug, Clone)]
pub struct FolderGallery {
    root: PathBuf,
}

impl FolderGallery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `Pictures/Cloday`, falling back to the home directory.
    pub fn default_location() -> Option<Self> {
        let mut path = dirs::picture_dir().or_else(dirs::home_dir)?;
        path.push("Cloday");
        Some(Self::new(path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Gallery for FolderGallery {
    fn save(&self, photo: &Path) -> Result<PathBuf, SourceError> {
        let name = photo
            .file_name()
            .ok_or_else(|| SourceError::Unreadable(photo.display().to_string()))?;
        std::fs::create_dir_all(&self.root)
            .map_err(|e| SourceError::PermissionDenied(format!("{}: {}", self.root.display(), e)))?;

        let target = self.root.join(name);
        std::fs::copy(photo, &target)
            .map_err(|e| SourceError::Unreadable(format!("{}: {}", photo.display(), e)))?;

        tracing::info!("🖼️  Saved {} to gallery", target.display());
        Ok(target)
    }
}
