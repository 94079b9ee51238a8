//! Cache storage backends: SQLite on disk and an in-memory map.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::http::Response;

use super::key::RequestKey;
use super::traits::{CacheStorage, CachedResponse, EntrySummary};

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("dashcache").join("cache.db"))
  }

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
-- One row per named store; rowid gives creation order
CREATE TABLE IF NOT EXISTS cache_stores (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Response snapshots keyed by normalized request identity
CREATE TABLE IF NOT EXISTS cache_entries (
    store_name TEXT NOT NULL,
    request_key TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (store_name, request_key)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_key ON cache_entries(request_key);
"#;

type EntryRow = (String, u16, String, String, Vec<u8>, String);

fn row_to_cached(row: EntryRow) -> Result<CachedResponse> {
  let (store, status, status_text, headers, body, cached_at) = row;
  let headers: BTreeMap<String, String> = serde_json::from_str(&headers)
    .map_err(|e| eyre!("Failed to deserialize cached headers: {}", e))?;

  Ok(CachedResponse {
    response: Response {
      status,
      status_text,
      headers,
      body,
    },
    store,
    cached_at: parse_datetime(&cached_at)?,
  })
}

#[async_trait]
impl CacheStorage for SqliteStorage {
  async fn get(&self, store: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<EntryRow> = conn
      .query_row(
        "SELECT store_name, status, status_text, headers, body, cached_at FROM cache_entries
         WHERE store_name = ? AND request_key = ?",
        params![store, key.cache_hash()],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
          ))
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry {}: {}", key, e))?;

    row.map(row_to_cached).transpose()
  }

  async fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<EntryRow> = conn
      .query_row(
        "SELECT ce.store_name, ce.status, ce.status_text, ce.headers, ce.body, ce.cached_at
         FROM cache_entries ce
         INNER JOIN cache_stores cs ON cs.name = ce.store_name
         WHERE ce.request_key = ?
         ORDER BY cs.rowid
         LIMIT 1",
        params![key.cache_hash()],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
          ))
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to match cache entry {}: {}", key, e))?;

    row.map(row_to_cached).transpose()
  }

  async fn put(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?, datetime('now'))",
      params![store],
    )
    .map_err(|e| eyre!("Failed to create store {}: {}", store, e))?;

    tx.execute(
      "INSERT OR REPLACE INTO cache_entries
         (store_name, request_key, method, url, status, status_text, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        store,
        key.cache_hash(),
        key.method(),
        key.url(),
        response.status,
        response.status_text,
        headers,
        response.body,
      ],
    )
    .map_err(|e| eyre!("Failed to store {}: {}", key, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  async fn store_names(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_stores ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list stores: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read store name: {}", e))?;

    Ok(names)
  }

  async fn delete(&self, store: &str, key: &RequestKey) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute(
        "DELETE FROM cache_entries WHERE store_name = ? AND request_key = ?",
        params![store, key.cache_hash()],
      )
      .map_err(|e| eyre!("Failed to delete {} from {}: {}", key, store, e))?;

    Ok(removed > 0)
  }

  async fn delete_store(&self, store: &str) -> Result<bool> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cache_entries WHERE store_name = ?",
      params![store],
    )
    .map_err(|e| eyre!("Failed to delete entries of {}: {}", store, e))?;

    let removed = tx
      .execute("DELETE FROM cache_stores WHERE name = ?", params![store])
      .map_err(|e| eyre!("Failed to delete store {}: {}", store, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  async fn entries(&self, store: &str) -> Result<Vec<EntrySummary>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT method, url, status, cached_at FROM cache_entries
         WHERE store_name = ?
         ORDER BY url",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map(params![store], |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, u16>(2)?,
          row.get::<_, String>(3)?,
        ))
      })
      .map_err(|e| eyre!("Failed to list entries of {}: {}", store, e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read entry: {}", e))?;

    rows
      .into_iter()
      .map(|(method, url, status, cached_at)| {
        Ok(EntrySummary {
          method,
          url,
          status,
          cached_at: parse_datetime(&cached_at)?,
        })
      })
      .collect()
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

struct MemoryEntry {
  method: String,
  url: String,
  response: Response,
  cached_at: DateTime<Utc>,
}

/// In-memory storage. Used for `--ephemeral` runs and in tests.
#[derive(Default)]
pub struct MemoryStorage {
  // Vec keeps creation order
  stores: Mutex<Vec<(String, HashMap<String, MemoryEntry>)>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
  async fn get(&self, store: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      stores
        .iter()
        .find(|(name, _)| name == store)
        .and_then(|(name, entries)| {
          entries.get(&key.cache_hash()).map(|e| CachedResponse {
            response: e.response.clone(),
            store: name.clone(),
            cached_at: e.cached_at,
          })
        }),
    )
  }

  async fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let hash = key.cache_hash();

    Ok(stores.iter().find_map(|(name, entries)| {
      entries.get(&hash).map(|e| CachedResponse {
        response: e.response.clone(),
        store: name.clone(),
        cached_at: e.cached_at,
      })
    }))
  }

  async fn put(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let index = match stores.iter().position(|(name, _)| name == store) {
      Some(i) => i,
      None => {
        stores.push((store.to_string(), HashMap::new()));
        stores.len() - 1
      }
    };

    stores[index].1.insert(
      key.cache_hash(),
      MemoryEntry {
        method: key.method().to_string(),
        url: key.url().to_string(),
        response: response.clone(),
        cached_at: Utc::now(),
      },
    );

    Ok(())
  }

  async fn store_names(&self) -> Result<Vec<String>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.iter().map(|(name, _)| name.clone()).collect())
  }

  async fn delete(&self, store: &str, key: &RequestKey) -> Result<bool> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      stores
        .iter_mut()
        .find(|(name, _)| name == store)
        .is_some_and(|(_, entries)| entries.remove(&key.cache_hash()).is_some()),
    )
  }

  async fn delete_store(&self, store: &str) -> Result<bool> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let before = stores.len();
    stores.retain(|(name, _)| name != store);
    Ok(stores.len() != before)
  }

  async fn entries(&self, store: &str) -> Result<Vec<EntrySummary>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut entries: Vec<EntrySummary> = stores
      .iter()
      .filter(|(name, _)| name == store)
      .flat_map(|(_, entries)| entries.values())
      .map(|e| EntrySummary {
        method: e.method.clone(),
        url: e.url.clone(),
        status: e.response.status,
        cached_at: e.cached_at,
      })
      .collect();
    entries.sort_by(|a, b| a.url.cmp(&b.url));
    Ok(entries)
  }
}
