//! Persisted value schemas
//!
//! Every storage key has one record type. Values are written as a JSON
//! envelope carrying a schema version:
//!
//! ```json
//! {"version": 1, "data": {"2025-01-14": "/…/photos/2025-01-14.jpg"}}
//! ```
//!
//! Reading never fails: a missing, malformed or newer-than-known value
//! decodes to the record's default. Values written before envelopes
//! existed (a bare JSON object, or a raw string) are still accepted.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::kv::KvStore;
use crate::error::StorageError;

/// A record stored under a single key.
pub trait Schema: Serialize + DeserializeOwned + Default {
    const KEY: &'static str;
    const VERSION: u32;

    /// Decode a value written without an envelope.
    fn from_legacy(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

/// Serialize a record into its versioned envelope.
pub fn encode<S: Schema>(value: &S) -> Result<String, serde_json::Error> {
    serde_json::to_string(&EnvelopeRef { version: S::VERSION, data: value })
}

/// A decoded record, and whether a stored value had to be replaced by the
/// default because it was malformed or too new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<S> {
    pub value: S,
    pub fell_back: bool,
}

impl<S> Decoded<S> {
    fn clean(value: S) -> Self {
        Decoded { value, fell_back: false }
    }

    fn fallback(value: S) -> Self {
        Decoded { value, fell_back: true }
    }
}

/// Tolerant decode; see the module docs.
pub fn decode<S: Schema>(raw: Option<&str>) -> S {
    decode_checked(raw).value
}

/// Like [`decode`], but reports a fallback. A missing value is not one.
pub fn decode_checked<S: Schema>(raw: Option<&str>) -> Decoded<S> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Decoded::clean(S::default());
    };

    if let Ok(envelope) = serde_json::from_str::<Envelope<serde_json::Value>>(raw) {
        if envelope.version > S::VERSION {
            tracing::warn!(
                "⚠️  {} was written by a newer version ({} > {}), using defaults",
                S::KEY, envelope.version, S::VERSION
            );
            return Decoded::fallback(S::default());
        }
        return match serde_json::from_value(envelope.data) {
            Ok(value) => Decoded::clean(value),
            Err(e) => {
                tracing::warn!("⚠️  Malformed {} value ({}), using defaults", S::KEY, e);
                Decoded::fallback(S::default())
            }
        };
    }

    match S::from_legacy(raw) {
        Some(value) => {
            tracing::debug!("Read legacy {} value", S::KEY);
            Decoded::clean(value)
        }
        None => {
            tracing::warn!("⚠️  Unreadable {} value, using defaults", S::KEY);
            Decoded::fallback(S::default())
        }
    }
}

/// Read and decode a record. Storage read errors propagate; decoding
/// problems do not.
pub fn read<S: Schema>(kv: &dyn KvStore) -> Result<S, StorageError> {
    Ok(read_checked(kv)?.value)
}

pub fn read_checked<S: Schema>(kv: &dyn KvStore) -> Result<Decoded<S>, StorageError> {
    let raw = kv.get(S::KEY)?;
    Ok(decode_checked(raw.as_deref()))
}

pub fn write<S: Schema>(kv: &dyn KvStore, value: &S) -> Result<(), StorageError> {
    kv.set(S::KEY, &encode(value)?)
}

// ========== Entry map ==========

/// Diary entries: ISO date -> stored photo path.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct StoredEntries(pub BTreeMap<String, String>);

impl Schema for StoredEntries {
    const KEY: &'static str = "dateImages";
    const VERSION: u32 = 1;
}

/// Raw copy of a `dateImages` value that could not be decoded. While it
/// exists, photo files are never swept as unreferenced.
pub const UNREADABLE_ENTRIES_KEY: &str = "dateImages.unreadable";

/// Mirror of the entry count, rewritten on every persist.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct OutfitCount(pub u32);

impl Schema for OutfitCount {
    const KEY: &'static str = "outfitCount";
    const VERSION: u32 = 1;

    fn from_legacy(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().map(OutfitCount)
    }
}

// ========== Profile ==========

pub const DEFAULT_PROFILE_NAME: &str = "John Doe";
pub const DEFAULT_BACKGROUND: &str = "#ffffff";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct ProfileName(pub String);

impl Default for ProfileName {
    fn default() -> Self {
        ProfileName(DEFAULT_PROFILE_NAME.to_string())
    }
}

impl Schema for ProfileName {
    const KEY: &'static str = "profileName";
    const VERSION: u32 = 1;

    fn from_legacy(raw: &str) -> Option<Self> {
        Some(ProfileName(raw.to_string()))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct SelectedTitle(pub Option<String>);

impl Schema for SelectedTitle {
    const KEY: &'static str = "selectedTitle";
    const VERSION: u32 = 1;

    fn from_legacy(raw: &str) -> Option<Self> {
        Some(SelectedTitle(Some(raw.to_string())))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct AvatarPath(pub Option<String>);

impl Schema for AvatarPath {
    const KEY: &'static str = "avatarPath";
    const VERSION: u32 = 1;

    fn from_legacy(raw: &str) -> Option<Self> {
        Some(AvatarPath(Some(raw.to_string())))
    }
}

/// First launch timestamp, written once.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct InstallDate(pub Option<DateTime<Utc>>);

impl Schema for InstallDate {
    const KEY: &'static str = "installDate";
    const VERSION: u32 = 1;

    fn from_legacy(raw: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|t| InstallDate(Some(t.with_timezone(&Utc))))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct BackgroundColor(pub String);

impl Default for BackgroundColor {
    fn default() -> Self {
        BackgroundColor(DEFAULT_BACKGROUND.to_string())
    }
}

impl Schema for BackgroundColor {
    const KEY: &'static str = "bgColor";
    const VERSION: u32 = 1;

    fn from_legacy(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        raw.starts_with('#').then(|| BackgroundColor(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::kv::MemoryKv;

    #[test]
    fn test_missing_value_is_default() {
        assert_eq!(decode::<StoredEntries>(None), StoredEntries::default());
        assert_eq!(decode::<ProfileName>(Some("  ")).0, "John Doe");
        assert_eq!(decode::<BackgroundColor>(None).0, "#ffffff");
    }

    #[test]
    fn test_envelope_round_trip() {
        let mut entries = BTreeMap::new();
        entries.insert("2025-01-14".to_string(), "/photos/2025-01-14.jpg".to_string());
        let value = StoredEntries(entries);

        let json = encode(&value).unwrap();
        assert!(json.starts_with(r#"{"version":1,"data":"#));
        assert_eq!(decode::<StoredEntries>(Some(&json)), value);
    }

    #[test]
    fn test_legacy_bare_entry_map() {
        let raw = r#"{"2025-01-14":"file:///cache/ImagePicker/abc.jpg"}"#;
        let decoded = decode::<StoredEntries>(Some(raw));
        assert_eq!(decoded.0.get("2025-01-14").map(String::as_str), Some("file:///cache/ImagePicker/abc.jpg"));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        assert_eq!(decode::<StoredEntries>(Some("{not json")), StoredEntries::default());
        assert_eq!(decode::<StoredEntries>(Some(r#"{"version":1,"data":[1,2]}"#)), StoredEntries::default());
        assert_eq!(decode::<OutfitCount>(Some("many")), OutfitCount(0));
        assert_eq!(decode::<BackgroundColor>(Some("blue")).0, "#ffffff");
    }

    #[test]
    fn test_newer_version_is_ignored() {
        let raw = r#"{"version":99,"data":"Someone"}"#;
        assert_eq!(decode::<ProfileName>(Some(raw)), ProfileName::default());
    }

    #[test]
    fn test_fallback_is_reported() {
        assert!(!decode_checked::<StoredEntries>(None).fell_back);
        assert!(!decode_checked::<StoredEntries>(Some("")).fell_back);
        assert!(!decode_checked::<StoredEntries>(Some(r#"{"version":1,"data":{}}"#)).fell_back);
        assert!(!decode_checked::<StoredEntries>(Some(r#"{"2025-01-14":"/p/a.jpg"}"#)).fell_back);

        for raw in ["{not json", r#"{"version":1,"data":[1,2]}"#, r#"{"version":2,"data":{"x":1}}"#] {
            let decoded = decode_checked::<StoredEntries>(Some(raw));
            assert!(decoded.fell_back, "{}", raw);
            assert_eq!(decoded.value, StoredEntries::default());
        }
    }

    #[test]
    fn test_legacy_raw_strings() {
        assert_eq!(decode::<ProfileName>(Some("Ada")).0, "Ada");
        assert_eq!(decode::<OutfitCount>(Some("12")), OutfitCount(12));
        assert_eq!(decode::<BackgroundColor>(Some("#f0f9ff")).0, "#f0f9ff");

        let installed = decode::<InstallDate>(Some("2025-01-14T08:30:00.000Z"));
        assert_eq!(installed.0.map(|t| t.timestamp()), Some(1736843400));
    }

    #[test]
    fn test_read_write_through_kv() {
        let kv = MemoryKv::new();
        assert_eq!(read::<SelectedTitle>(&kv).unwrap(), SelectedTitle(None));

        write(&kv, &SelectedTitle(Some("Fresh Fit".into()))).unwrap();
        assert_eq!(read::<SelectedTitle>(&kv).unwrap().0.as_deref(), Some("Fresh Fit"));
        assert_eq!(
            kv.get("selectedTitle").unwrap().as_deref(),
            Some(r#"{"version":1,"data":"Fresh Fit"}"#)
        );
    }
}
