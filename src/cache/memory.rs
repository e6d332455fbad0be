//! Process-local cache: survives refreshes and offline toggles within one session only.

use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

use super::traits::PersistentCache;
use crate::error::StorageError;
use crate::models::{CacheMetadata, User};

#[derive(Default)]
struct MemoryState {
  users: Vec<User>,
  metadata: Vec<CacheMetadata>,
  fail_reads: bool,
  fail_writes: bool,
}

#[derive(Default)]
pub struct MemoryCache {
  state: Mutex<MemoryState>,
}

impl MemoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make every subsequent write fail with [`StorageError::Write`].
  #[cfg(test)]
  pub fn fail_writes(&self, fail: bool) {
    if let Ok(mut state) = self.state.lock() {
      state.fail_writes = fail;
    }
  }

  /// Make every subsequent read fail with [`StorageError::Read`].
  #[cfg(test)]
  pub fn fail_reads(&self, fail: bool) {
    if let Ok(mut state) = self.state.lock() {
      state.fail_reads = fail;
    }
  }

  fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
    self
      .state
      .lock()
      .map_err(|e| StorageError::Unavailable(format!("lock poisoned: {}", e)))
  }
}

impl PersistentCache for MemoryCache {
  fn read_all(&self) -> Result<Vec<User>, StorageError> {
    let state = self.lock()?;
    if state.fail_reads {
      return Err(StorageError::Read("reads disabled".to_string()));
    }
    Ok(state.users.clone())
  }

  fn replace_all(&self, users: &[User], key: &str, page: u32) -> Result<(), StorageError> {
    let mut state = self.lock()?;
    if state.fail_writes {
      return Err(StorageError::Write("writes disabled".to_string()));
    }
    state.users = users.to_vec();
    state.metadata = vec![CacheMetadata {
      key: key.to_string(),
      last_fetched: Utc::now(),
      page,
    }];
    Ok(())
  }

  fn update_favorite(&self, uuid: &str, is_favorite: bool) -> Result<bool, StorageError> {
    let mut state = self.lock()?;
    if state.fail_writes {
      return Err(StorageError::Write("writes disabled".to_string()));
    }
    match state.users.iter_mut().find(|u| u.uuid == uuid) {
      Some(user) => {
        user.is_favorite = is_favorite;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  fn metadata(&self) -> Result<Vec<CacheMetadata>, StorageError> {
    Ok(self.lock()?.metadata.clone())
  }
}
