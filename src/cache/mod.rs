//! Offline caching layer for the dashboard.
//!
//! This module provides:
//! - Named, version-tagged response stores (SQLite or in-memory)
//! - A pure selector choosing one fetch strategy per request
//! - Network-first, cache-first and stale-while-revalidate strategies
//! - The offline shell fallback for failed page loads

mod fallback;
mod key;
mod layer;
mod names;
mod storage;
mod strategy;
mod traits;

pub use fallback::OfflineFallback;
pub use key::RequestKey;
pub use layer::OfflineLayer;
pub use names::StoreNames;
pub use storage::{MemoryStorage, SqliteStorage};
pub use strategy::StrategySelector;
pub use traits::{CacheStorage, CachedResponse, ResponseSource, Served};

#[cfg(test)]
pub use traits::EntrySummary;
