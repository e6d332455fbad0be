use chrono::{DateTime, Utc};

/// Display name of a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
  pub first: String,
  pub last: String,
}

/// Profile images in three resolutions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
  pub large: String,
  pub medium: String,
  pub thumbnail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
  pub city: String,
  pub country: String,
}

/// A user profile as shown in the directory.
///
/// `uuid` is stable across sessions and unique within both the in-memory
/// collection and the durable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
  pub uuid: String,
  pub name: Name,
  pub email: String,
  pub phone: String,
  pub picture: Picture,
  pub location: Location,
  pub is_favorite: bool,
  /// Stamped when the record was normalized from the remote response
  pub cached_at: DateTime<Utc>,
}

impl User {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.name.first, self.name.last)
  }
}

/// Provenance for one cache-population event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMetadata {
  pub key: String,
  pub last_fetched: DateTime<Utc>,
  pub page: u32,
}
