//! Core trait for the durable user cache.

use sha2::{Digest, Sha256};

use crate::error::StorageError;
use crate::models::{CacheMetadata, User};

/// Metadata key recorded for a full-collection fetch.
pub const ALL_USERS_KEY: &str = "all_users";

/// Durable storage for the full user collection.
///
/// Implementations are shared between the store and any later process that
/// opens the same facility, so stored data must be self-describing.
pub trait PersistentCache: Send + Sync {
  /// All stored users in insertion order. An empty store is `Ok(vec![])`.
  ///
  /// Errors with [`StorageError::Unavailable`] when there is no usable store
  /// and [`StorageError::Read`] when a query fails; callers treat both as empty.
  fn read_all(&self) -> Result<Vec<User>, StorageError>;

  /// Clear users and metadata, then insert `users` plus one metadata record.
  ///
  /// All-or-nothing: on error the previous contents are untouched.
  fn replace_all(&self, users: &[User], key: &str, page: u32) -> Result<(), StorageError>;

  /// Set the favorite flag on the record with `uuid`.
  ///
  /// Returns `Ok(false)` without writing anything if no such record exists.
  fn update_favorite(&self, uuid: &str, is_favorite: bool) -> Result<bool, StorageError>;

  /// Provenance records from the most recent population, newest first.
  fn metadata(&self) -> Result<Vec<CacheMetadata>, StorageError>;
}

/// SHA-256 over the ordered uuids of a snapshot, hex encoded.
///
/// Favorite flags are not covered; they change independently of the snapshot.
pub fn snapshot_checksum(users: &[User]) -> String {
  let mut hasher = Sha256::new();
  for user in users {
    hasher.update(user.uuid.as_bytes());
    hasher.update(b"\n");
  }
  hex::encode(hasher.finalize())
}
