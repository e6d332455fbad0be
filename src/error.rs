use std::time::Duration;

use thiserror::Error;

/// Failures of the remote fetch.
#[derive(Debug, Error)]
pub enum NetworkError {
  #[error("remote returned HTTP {0}")]
  Status(u16),

  #[error("transport failure: {0}")]
  Transport(String),

  #[error("request timed out after {}s", .0.as_secs())]
  Timeout(Duration),

  #[error("invalid response payload: {0}")]
  InvalidPayload(String),
}

impl From<reqwest::Error> for NetworkError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      // reqwest does not expose the configured duration on the error
      NetworkError::Timeout(Duration::ZERO)
    } else if let Some(status) = e.status() {
      NetworkError::Status(status.as_u16())
    } else if e.is_decode() {
      NetworkError::InvalidPayload(e.to_string())
    } else {
      NetworkError::Transport(e.to_string())
    }
  }
}

/// Failures of the durable storage facility.
#[derive(Debug, Error)]
pub enum StorageError {
  /// The store cannot be opened, has an incompatible schema, or is corrupted.
  /// Callers treat this as "cache is empty".
  #[error("storage unavailable: {0}")]
  Unavailable(String),

  /// The store is open but reading from it failed.
  #[error("storage read failed: {0}")]
  Read(String),

  /// A write failed; the previous contents are left intact.
  #[error("storage write failed: {0}")]
  Write(String),
}

/// Rejections of store actions. None of these mutate state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
  #[error("no user with uuid {0}")]
  NotFound(String),

  #[error("page {page} is outside 1..={total_pages}")]
  InvalidNavigation { page: usize, total_pages: usize },

  #[error("cannot navigate while a fetch is in flight")]
  NavigationWhileLoading,
}
