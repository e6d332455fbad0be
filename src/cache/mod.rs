//! Durable storage for the user collection and offline support.
//!
//! This module provides the storage facility the store falls back to when the
//! network is unavailable:
//! - Holds the full user collection plus provenance metadata
//! - Replaces the whole snapshot atomically after each successful fetch
//! - Updates single favorite flags in place
//! - Reports an unusable facility as unavailable rather than failing hard

mod memory;
mod storage;
mod traits;

pub use memory::MemoryCache;
pub use storage::{NoopCache, SqliteCache};
pub use traits::{PersistentCache, ALL_USERS_KEY};
