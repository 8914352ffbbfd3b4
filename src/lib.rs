//! Cloday: a personal outfit diary.
//!
//! One photo per calendar day, stored in an app-owned directory and
//! indexed by date in a small key-value store. Only today and the six
//! days before it can be changed. Display titles unlock as the number of
//! saved outfits grows.

pub mod config;
pub mod dates;
pub mod error;
pub mod media;
pub mod state;
pub mod titles;

pub use config::AppConfig;
pub use error::{Result, StorageError, StoreError};
pub use state::{EntryMap, EntryStore, OutfitEntry, ProfileState, ProfileStore};
pub use titles::{TierTable, TitleTier};
