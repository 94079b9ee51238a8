//! Install and activation handling.

use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use tracing::{info, warn};
use url::Url;

use crate::cache::{CacheStorage, CachedResponse, OfflineLayer, RequestKey, StoreNames};
use crate::http::{Request, Response};

use super::clients::Clients;

/// What activation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
  /// Stores deleted because their version tag is obsolete
  pub deleted: Vec<String>,
  /// Clients newly controlled by this version
  pub claimed: usize,
}

/// Pre-cache `urls` into the static store.
///
/// All-or-nothing: every URL must fetch with an ok status before anything is
/// written, and a failed write rolls back the entries written before it.
pub async fn install(layer: &OfflineLayer, urls: &[Url]) -> Result<usize> {
  let requests: Vec<Request> = urls.iter().cloned().map(Request::get).collect();
  let results = join_all(requests.iter().map(|r| layer.network().fetch(r))).await;

  let mut responses = Vec::with_capacity(results.len());
  for (request, result) in requests.iter().zip(results) {
    let response = result.map_err(|e| eyre!("Failed to pre-cache {}: {}", request.url(), e))?;
    if !response.is_ok() {
      return Err(eyre!(
        "Failed to pre-cache {}: status {}",
        request.url(),
        response.status
      ));
    }
    responses.push((RequestKey::from(request), response));
  }

  let storage = layer.storage().as_ref();
  let store = &layer.names().static_store;
  let existed = storage.store_names().await?.iter().any(|n| n == store);

  let mut written = Vec::with_capacity(responses.len());
  if let Err(e) = write_all(storage, store, &responses, &mut written).await {
    rollback(storage, store, written, existed).await;
    return Err(eyre!("Failed to pre-cache into {}: {}", store, e));
  }

  info!(store = %store, count = responses.len(), "pre-cached shell");
  Ok(responses.len())
}

/// Keys written so far, each with the entry it replaced.
type Written = Vec<(RequestKey, Option<CachedResponse>)>;

async fn write_all(
  storage: &dyn CacheStorage,
  store: &str,
  responses: &[(RequestKey, Response)],
  written: &mut Written,
) -> Result<()> {
  for (key, response) in responses {
    let previous = storage.get(store, key).await?;
    storage.put(store, key, response).await?;
    written.push((key.clone(), previous));
  }
  Ok(())
}

async fn rollback(storage: &dyn CacheStorage, store: &str, written: Written, existed: bool) {
  if !existed {
    if let Err(e) = storage.delete_store(store).await {
      warn!(store, error = %e, "failed to drop partial pre-cache");
    }
    return;
  }

  for (key, previous) in written.into_iter().rev() {
    let restored = match previous {
      Some(cached) => storage.put(store, &key, &cached.response).await,
      None => storage.delete(store, &key).await.map(|_| ()),
    };
    if let Err(e) = restored {
      warn!(store, %key, error = %e, "failed to roll back pre-cache entry");
    }
  }
}

/// Prune obsolete stores and claim open clients, concurrently. Both finish
/// before this returns.
pub async fn activate(layer: &OfflineLayer, clients: &Clients, version: &str) -> ActivationReport {
  let (deleted, claimed) = tokio::join!(
    prune_stale_stores(layer.storage().as_ref(), layer.names()),
    clients.claim(version)
  );

  let deleted = deleted.unwrap_or_else(|e| {
    warn!(error = %e, "failed to prune old caches");
    Vec::new()
  });
  let claimed = claimed.unwrap_or_else(|e| {
    warn!(error = %e, "failed to claim clients");
    0
  });

  info!(deleted = deleted.len(), claimed, version, "activated");
  ActivationReport { deleted, claimed }
}

/// Delete every store that is not one of the current two.
pub async fn prune_stale_stores(
  storage: &dyn CacheStorage,
  names: &StoreNames,
) -> Result<Vec<String>> {
  let deleted = storage
    .delete_matching(&|name: &str| !names.is_current(name))
    .await?;

  for name in &deleted {
    info!(store = %name, "deleted old cache");
  }
  Ok(deleted)
}
