//! SQLite and no-op implementations of the user cache.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::traits::{snapshot_checksum, PersistentCache};
use crate::db;
use crate::error::StorageError;
use crate::models::{CacheMetadata, Location, Name, Picture, User};

/// Storage implementation for hosts without a durable facility.
/// Every operation reports the store as unavailable.
pub struct NoopCache;

impl PersistentCache for NoopCache {
  fn read_all(&self) -> Result<Vec<User>, StorageError> {
    Err(StorageError::Unavailable("caching disabled".to_string()))
  }

  fn replace_all(&self, _users: &[User], _key: &str, _page: u32) -> Result<(), StorageError> {
    Err(StorageError::Unavailable("caching disabled".to_string()))
  }

  fn update_favorite(&self, _uuid: &str, _is_favorite: bool) -> Result<bool, StorageError> {
    Err(StorageError::Unavailable("caching disabled".to_string()))
  }

  fn metadata(&self) -> Result<Vec<CacheMetadata>, StorageError> {
    Err(StorageError::Unavailable("caching disabled".to_string()))
  }
}

/// SQLite-based user cache.
///
/// The connection mutex is the global write lock: `replace_all` runs inside one
/// transaction while holding it, so `update_favorite` can never observe a
/// half-cleared table.
pub struct SqliteCache {
  conn: Mutex<Connection>,
}

impl SqliteCache {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    let conn = db::open(path)?;
    debug!(path = %path.display(), "opened user cache");
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, StorageError> {
    Ok(Self {
      conn: Mutex::new(db::open_in_memory()?),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
    self
      .conn
      .lock()
      .map_err(|e| StorageError::Unavailable(format!("lock poisoned: {}", e)))
  }
}

const SELECT_USERS: &str = "SELECT uuid, first_name, last_name, email, phone, picture_large, \
   picture_medium, picture_thumbnail, city, country, is_favorite, cached_at
   FROM users ORDER BY id";

impl PersistentCache for SqliteCache {
  fn read_all(&self) -> Result<Vec<User>, StorageError> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare(SELECT_USERS)
      .map_err(|e| StorageError::Read(format!("failed to prepare query: {}", e)))?;

    let users: Vec<User> = stmt
      .query_map([], row_to_user)
      .map_err(|e| StorageError::Read(format!("failed to query users: {}", e)))?
      .collect::<Result<_, _>>()
      .map_err(|e| StorageError::Read(format!("failed to decode user row: {}", e)))?;

    let recorded: Option<String> = conn
      .query_row(
        "SELECT checksum FROM cache_metadata ORDER BY id DESC LIMIT 1",
        [],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| StorageError::Read(format!("failed to read cache metadata: {}", e)))?;

    if let Some(recorded) = recorded {
      if recorded != snapshot_checksum(&users) {
        warn!(count = users.len(), "user cache checksum mismatch");
        return Err(StorageError::Unavailable(
          "cached snapshot does not match its checksum".to_string(),
        ));
      }
    }

    Ok(users)
  }

  fn replace_all(&self, users: &[User], key: &str, page: u32) -> Result<(), StorageError> {
    let mut conn = self.lock()?;

    // Dropping the transaction without commit rolls everything back
    let tx = conn
      .transaction()
      .map_err(|e| StorageError::Write(format!("failed to begin transaction: {}", e)))?;

    tx.execute("DELETE FROM users", [])
      .map_err(|e| StorageError::Write(format!("failed to clear users: {}", e)))?;
    tx.execute("DELETE FROM cache_metadata", [])
      .map_err(|e| StorageError::Write(format!("failed to clear cache metadata: {}", e)))?;

    {
      let mut insert = tx
        .prepare(
          "INSERT INTO users (uuid, first_name, last_name, email, phone, picture_large,
             picture_medium, picture_thumbnail, city, country, is_favorite, cached_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .map_err(|e| StorageError::Write(format!("failed to prepare insert: {}", e)))?;

      for user in users {
        insert
          .execute(params![
            user.uuid,
            user.name.first,
            user.name.last,
            user.email,
            user.phone,
            user.picture.large,
            user.picture.medium,
            user.picture.thumbnail,
            user.location.city,
            user.location.country,
            user.is_favorite,
            user.cached_at.to_rfc3339(),
          ])
          .map_err(|e| StorageError::Write(format!("failed to store user {}: {}", user.uuid, e)))?;
      }
    }

    tx.execute(
      "INSERT INTO cache_metadata (key, last_fetched, page, checksum) VALUES (?, ?, ?, ?)",
      params![key, Utc::now().to_rfc3339(), page, snapshot_checksum(users)],
    )
    .map_err(|e| StorageError::Write(format!("failed to store cache metadata: {}", e)))?;

    tx.commit()
      .map_err(|e| StorageError::Write(format!("failed to commit transaction: {}", e)))?;

    debug!(count = users.len(), key, page, "replaced user cache");
    Ok(())
  }

  fn update_favorite(&self, uuid: &str, is_favorite: bool) -> Result<bool, StorageError> {
    let conn = self.lock()?;
    let changed = conn
      .execute(
        "UPDATE users SET is_favorite = ? WHERE uuid = ?",
        params![is_favorite, uuid],
      )
      .map_err(|e| StorageError::Write(format!("failed to update favorite: {}", e)))?;
    Ok(changed > 0)
  }

  fn metadata(&self) -> Result<Vec<CacheMetadata>, StorageError> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT key, last_fetched, page FROM cache_metadata ORDER BY id DESC")
      .map_err(|e| StorageError::Read(format!("failed to prepare query: {}", e)))?;

    let rows = stmt
      .query_map([], |row| {
        Ok(CacheMetadata {
          key: row.get(0)?,
          last_fetched: parse_datetime(row, 1)?,
          page: row.get(2)?,
        })
      })
      .map_err(|e| StorageError::Read(format!("failed to query cache metadata: {}", e)))?
      .collect::<Result<Vec<_>, _>>()
      .map_err(|e| StorageError::Read(format!("failed to decode cache metadata: {}", e)))?;

    Ok(rows)
  }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
  Ok(User {
    uuid: row.get(0)?,
    name: Name {
      first: row.get(1)?,
      last: row.get(2)?,
    },
    email: row.get(3)?,
    phone: row.get(4)?,
    picture: Picture {
      large: row.get(5)?,
      medium: row.get(6)?,
      thumbnail: row.get(7)?,
    },
    location: Location {
      city: row.get(8)?,
      country: row.get(9)?,
    },
    is_favorite: row.get(10)?,
    cached_at: parse_datetime(row, 11)?,
  })
}

/// Parse an RFC 3339 timestamp column.
fn parse_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
  let raw: String = row.get(idx)?;
  DateTime::parse_from_rfc3339(&raw)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}
