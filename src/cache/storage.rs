//! Cache storage trait with in-memory, no-op and SQLite implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A stored query result.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  /// The cached payload as JSON
  pub data: Value,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
  /// Set by invalidation; stale entries are only served offline
  pub stale: bool,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Get the entry stored under `key`.
  fn get(&self, key: &str) -> Result<Option<CachedEntry>>;

  /// Store a query result, replacing any previous entry for `key`.
  fn put(&self, key: &str, resource: &str, data: &Value, stale: bool) -> Result<()>;

  /// Mark every entry of `resource` stale. Returns how many were marked.
  fn mark_stale(&self, resource: &str) -> Result<usize>;

  /// Drop everything.
  fn clear(&self) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &str) -> Result<Option<CachedEntry>> {
    Ok(None) // Always miss
  }

  fn put(&self, _key: &str, _resource: &str, _data: &Value, _stale: bool) -> Result<()> {
    Ok(()) // Discard
  }

  fn mark_stale(&self, _resource: &str) -> Result<usize> {
    Ok(0)
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// Process-local storage, the default.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, (String, CachedEntry)>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryStorage {
  fn get(&self, key: &str) -> Result<Option<CachedEntry>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).map(|(_, entry)| entry.clone()))
  }

  fn put(&self, key: &str, resource: &str, data: &Value, stale: bool) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(
      key.to_string(),
      (
        resource.to_string(),
        CachedEntry {
          data: data.clone(),
          cached_at: Utc::now(),
          stale,
        },
      ),
    );
    Ok(())
  }

  fn mark_stale(&self, resource: &str) -> Result<usize> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let mut marked = 0;
    for (owner, entry) in entries.values_mut() {
      if owner == resource {
        entry.stale = true;
        marked += 1;
      }
    }
    Ok(marked)
  }

  fn clear(&self) -> Result<()> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .clear();
    Ok(())
  }
}

/// SQLite-based storage, kept across runs for offline use.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the cache database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Purely in-memory database
  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("sce").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash TEXT PRIMARY KEY,
    resource TEXT NOT NULL,
    data BLOB NOT NULL,
    stale INTEGER NOT NULL DEFAULT 0,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_query_cache_resource ON query_cache(resource);
"#;

impl CacheStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<CachedEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, bool, String)> = conn
      .query_row(
        "SELECT data, stale, cached_at FROM query_cache WHERE query_hash = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry: {}", e))?;

    match row {
      Some((data, stale, cached_at)) => {
        let data: Value = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize cache entry: {}", e))?;
        Ok(Some(CachedEntry {
          data,
          cached_at: parse_datetime(&cached_at)?,
          stale,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, key: &str, resource: &str, data: &Value, stale: bool) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data = serde_json::to_vec(data).map_err(|e| eyre!("Failed to serialize entry: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO query_cache (query_hash, resource, data, stale, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![key, resource, data, stale],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn mark_stale(&self, resource: &str) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "UPDATE query_cache SET stale = 1 WHERE resource = ?",
        params![resource],
      )
      .map_err(|e| eyre!("Failed to invalidate {}: {}", resource, e))
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM query_cache", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn exercise(storage: &dyn CacheStorage) {
    assert!(storage.get("k1").unwrap().is_none());

    storage
      .put("k1", "estados", &json!([{"id": 1}]), false)
      .unwrap();
    storage
      .put("k2", "estados", &json!([{"id": 2}]), false)
      .unwrap();
    storage
      .put("k3", "municipios", &json!([]), false)
      .unwrap();

    let entry = storage.get("k1").unwrap().unwrap();
    assert_eq!(entry.data, json!([{"id": 1}]));
    assert!(!entry.stale);

    assert_eq!(storage.mark_stale("estados").unwrap(), 2);
    assert!(storage.get("k1").unwrap().unwrap().stale);
    assert!(storage.get("k2").unwrap().unwrap().stale);
    assert!(!storage.get("k3").unwrap().unwrap().stale);

    // Rewriting an entry makes it fresh again
    storage
      .put("k1", "estados", &json!([{"id": 1}, {"id": 5}]), false)
      .unwrap();
    assert!(!storage.get("k1").unwrap().unwrap().stale);

    storage.clear().unwrap();
    assert!(storage.get("k3").unwrap().is_none());
  }

  #[test]
  fn test_memory_storage() {
    exercise(&MemoryStorage::new());
  }

  #[test]
  fn test_sqlite_storage() {
    exercise(&SqliteStorage::in_memory().unwrap());
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    storage.put("k", "estados", &json!([]), false).unwrap();
    assert!(storage.get("k").unwrap().is_none());
    assert_eq!(storage.mark_stale("estados").unwrap(), 0);
  }

  #[test]
  fn test_parse_sqlite_datetime() {
    let dt = parse_datetime("2024-07-28 18:30:00").unwrap();
    assert_eq!(dt.to_rfc3339(), "2024-07-28T18:30:00+00:00");
    assert!(parse_datetime("yesterday").is_err());
  }
}
