/// Version stamped into `PRAGMA user_version` once the tables exist.
pub const SCHEMA_VERSION: i64 = 1;

/// Schema for the durable user cache.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT NOT NULL,
    picture_large TEXT NOT NULL,
    picture_medium TEXT NOT NULL,
    picture_thumbnail TEXT NOT NULL,
    city TEXT NOT NULL,
    country TEXT NOT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    cached_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
CREATE INDEX IF NOT EXISTS idx_users_is_favorite ON users(is_favorite);
CREATE INDEX IF NOT EXISTS idx_users_cached_at ON users(cached_at);

-- One row per cache-population event
CREATE TABLE IF NOT EXISTS cache_metadata (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    last_fetched TEXT NOT NULL,
    page INTEGER NOT NULL,
    checksum TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_metadata_key ON cache_metadata(key);
CREATE INDEX IF NOT EXISTS idx_cache_metadata_last_fetched ON cache_metadata(last_fetched);
CREATE INDEX IF NOT EXISTS idx_cache_metadata_page ON cache_metadata(page);
"#;
