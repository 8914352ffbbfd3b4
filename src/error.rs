//! Error types shared by the entry store, the profile store and the
//! storage backends.

use chrono::NaiveDate;
use thiserror::Error;

use crate::media::SourceError;

/// Failure of the underlying persistence: key-value writes, file copies,
/// directory creation or value encoding.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("could not encode stored value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Mutation attempted outside the trailing 7-day edit window.
    #[error("{date} can no longer be edited (only today and the 6 days before it)")]
    NotEditable { date: NaiveDate },

    /// Camera/picker permission denied, cancelled, or no readable image.
    #[error("no source image: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no outfit saved for {date}")]
    NotFound { date: NaiveDate },
}

impl StoreError {
    /// Expected conditions the front end reports as an informational
    /// message. Storage failures are the only unexpected ones.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StoreError::Storage(_))
    }

    /// Short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Storage(_) => "Something went wrong while saving. Please try again.".to_string(),
            StoreError::SourceUnavailable(SourceError::PermissionDenied(_)) => {
                "Permission required: camera or photo access is needed.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Storage(StorageError::Io(err))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Storage(StorageError::Database(err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Storage(StorageError::Encode(err))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_not_recoverable() {
        let err: StoreError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert!(!err.is_recoverable());
        assert!(err.user_message().contains("try again"));
    }

    #[test]
    fn test_not_editable_is_recoverable() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let err = StoreError::NotEditable { date };
        assert!(err.is_recoverable());
        assert!(err.user_message().contains("2025-01-01"));
    }

    #[test]
    fn test_permission_denied_message() {
        let err = StoreError::from(SourceError::PermissionDenied("camera".into()));
        assert!(err.is_recoverable());
        assert!(err.user_message().starts_with("Permission required"));
    }
}
