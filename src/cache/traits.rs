//! Core traits and types for the caching system.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::Result;

use crate::http::Response;

use super::key::RequestKey;

/// A response snapshot read back from a cache store.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: Response,
  /// Name of the store the entry was found in
  pub store: String,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// Listing row for one cached entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
  pub method: String,
  pub url: String,
  pub status: u16,
  pub cached_at: DateTime<Utc>,
}

/// Named, versioned key -> response stores.
///
/// Stores come into existence on their first `put`. At most one entry exists
/// per key per store; `put` replaces silently.
#[async_trait]
pub trait CacheStorage: Send + Sync {
  /// Look up a key in one named store.
  async fn get(&self, store: &str, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Look up a key across every store, oldest store first.
  async fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Write (or replace) an entry, creating the store if needed.
  async fn put(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()>;

  /// Names of all existing stores, in creation order.
  async fn store_names(&self) -> Result<Vec<String>>;

  /// Remove one entry. Returns false if it was not there.
  async fn delete(&self, store: &str, key: &RequestKey) -> Result<bool>;

  /// Delete a store and all its entries. Returns false if it did not exist.
  async fn delete_store(&self, store: &str) -> Result<bool>;

  /// Entries held by one store.
  async fn entries(&self, store: &str) -> Result<Vec<EntrySummary>>;

  /// Delete every store whose name matches `predicate`, returning the
  /// deleted names.
  async fn delete_matching(
    &self,
    predicate: &(dyn for<'p> Fn(&'p str) -> bool + Send + Sync),
  ) -> Result<Vec<String>> {
    let mut deleted = Vec::new();
    for name in self.store_names().await? {
      if predicate(&name) && self.delete_store(&name).await? {
        deleted.push(name);
      }
    }
    Ok(deleted)
  }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Live network response
  Network,
  /// Read from a cache store
  Cache,
  /// Produced by this layer (503/404)
  Synthetic,
}

impl std::fmt::Display for ResponseSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ResponseSource::Network => write!(f, "network"),
      ResponseSource::Cache => write!(f, "cache"),
      ResponseSource::Synthetic => write!(f, "synthetic"),
    }
  }
}

/// Result of handling one request, including metadata about the source.
#[derive(Debug, Clone)]
pub struct Served {
  /// The response handed back to the caller
  pub response: Response,
  /// Where the response came from
  pub source: ResponseSource,
  /// When the response was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl Served {
  pub fn from_network(response: Response) -> Self {
    Self {
      response,
      source: ResponseSource::Network,
      cached_at: None,
    }
  }

  pub fn from_cache(cached: CachedResponse) -> Self {
    Self {
      response: cached.response,
      source: ResponseSource::Cache,
      cached_at: Some(cached.cached_at),
    }
  }

  pub fn synthetic(response: Response) -> Self {
    Self {
      response,
      source: ResponseSource::Synthetic,
      cached_at: None,
    }
  }
}
