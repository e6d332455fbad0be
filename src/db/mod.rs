pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Open or create the cache database at `path` and bring its schema up to date
pub fn open(path: &Path) -> Result<Connection, StorageError> {
  // Ensure parent directory exists
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(|e| {
      StorageError::Unavailable(format!("failed to create cache directory: {}", e))
    })?;
  }

  let conn = Connection::open(path).map_err(|e| {
    StorageError::Unavailable(format!(
      "failed to open cache database at {}: {}",
      path.display(),
      e
    ))
  })?;

  migrate(&conn)?;
  Ok(conn)
}

/// Open a throwaway database, used by tests
#[cfg(test)]
pub fn open_in_memory() -> Result<Connection, StorageError> {
  let conn = Connection::open_in_memory()
    .map_err(|e| StorageError::Unavailable(format!("failed to open in-memory database: {}", e)))?;
  migrate(&conn)?;
  Ok(conn)
}

/// Get the default database path
pub fn default_path() -> Option<PathBuf> {
  let data_dir = dirs::data_dir().or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))?;
  Some(data_dir.join("userdir").join("cache.db"))
}

/// Create the tables on a fresh file, accept the current version, reject anything else.
///
/// A file that is not a SQLite database fails on the first pragma read.
fn migrate(conn: &Connection) -> Result<(), StorageError> {
  let version: i64 = conn
    .query_row("PRAGMA user_version", [], |row| row.get(0))
    .map_err(|e| StorageError::Unavailable(format!("unreadable cache database: {}", e)))?;

  match version {
    0 => {
      conn
        .execute_batch(schema::SCHEMA)
        .map_err(|e| StorageError::Unavailable(format!("failed to run migrations: {}", e)))?;
      conn
        .pragma_update(None, "user_version", schema::SCHEMA_VERSION)
        .map_err(|e| StorageError::Unavailable(format!("failed to stamp schema version: {}", e)))?;
      Ok(())
    }
    v if v == schema::SCHEMA_VERSION => Ok(()),
    v => Err(StorageError::Unavailable(format!(
      "incompatible schema version {} (expected {})",
      v,
      schema::SCHEMA_VERSION
    ))),
  }
}
