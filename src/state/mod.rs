/// State management module
///
/// This module handles all persisted application state:
/// - Key-value storage backends (kv.rs)
/// - Versioned schemas for every stored key (schema.rs)
/// - Shared data structures (data.rs)
/// - The date -> photo entry store (entries.rs)
/// - Profile settings (profile.rs)

pub mod kv;
pub mod schema;
pub mod data;
pub mod entries;
pub mod profile;

pub use data::{EntryMap, OutfitEntry};
pub use entries::EntryStore;
pub use kv::{KvStore, MemoryKv, SqliteKv};
pub use profile::{ProfileState, ProfileStore};
