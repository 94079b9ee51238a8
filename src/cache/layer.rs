//! Cache layer that orchestrates caching logic with network fetching.

use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::http::{Network, Request, Response};

use super::fallback::OfflineFallback;
use super::key::RequestKey;
use super::names::StoreNames;
use super::strategy::{Strategy, StrategySelector};
use super::traits::{CacheStorage, CachedResponse, Served};

/// Cache layer that manages caching logic and network fetching.
///
/// Every request handled here terminates in a concrete response: live,
/// cached, or synthetic. Errors from the store or the network are logged and
/// absorbed.
pub struct OfflineLayer {
  storage: Arc<dyn CacheStorage>,
  network: Arc<dyn Network>,
  names: StoreNames,
  selector: StrategySelector,
  fallback: OfflineFallback,
  /// Background revalidations that have not been settled yet
  pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl OfflineLayer {
  pub fn new(
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    names: StoreNames,
    selector: StrategySelector,
    fallback: OfflineFallback,
  ) -> Self {
    Self {
      storage,
      network,
      names,
      selector,
      fallback,
      pending: Arc::new(Mutex::new(Vec::new())),
    }
  }

  pub fn storage(&self) -> &Arc<dyn CacheStorage> {
    &self.storage
  }

  pub fn network(&self) -> &Arc<dyn Network> {
    &self.network
  }

  pub fn names(&self) -> &StoreNames {
    &self.names
  }

  /// Route a request through the strategy chosen for it.
  pub async fn handle(&self, request: &Request) -> Served {
    let strategy = self.selector.select(request);
    debug!(method = request.method(), url = %request.url(), ?strategy, "dispatching request");

    match strategy {
      Strategy::Passthrough => self.passthrough(request).await,
      Strategy::NetworkFirst if request.is_navigation() => self.navigate(request).await,
      Strategy::NetworkFirst => self.network_first(request).await,
      Strategy::CacheFirst { store } => self.cache_first(request, &store).await,
      Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
    }
  }

  /// Network only; transport failure yields 503 "Network unavailable".
  pub async fn passthrough(&self, request: &Request) -> Served {
    match self.network.fetch(request).await {
      Ok(response) => Served::from_network(response),
      Err(e) => {
        warn!(url = %request.url(), error = %e, "network fetch failed");
        Served::synthetic(Response::network_unavailable())
      }
    }
  }

  /// Network-first strategy.
  ///
  /// 1. Fetch from network - any status is returned verbatim
  /// 2. On transport failure, return a match from any store
  /// 3. Otherwise a synthetic 503 "Network unavailable"
  ///
  /// Never writes to the cache.
  pub async fn network_first(&self, request: &Request) -> Served {
    match self.network_or_cached(request).await {
      Some(served) => served,
      None => Served::synthetic(Response::network_unavailable()),
    }
  }

  /// Network-first for page loads, ending in the offline fallback.
  pub async fn navigate(&self, request: &Request) -> Served {
    match self.network_or_cached(request).await {
      Some(served) => served,
      None => self.fallback.respond(self.storage.as_ref(), request).await,
    }
  }

  /// `None` only on a clean cache miss after a transport failure. A failing
  /// store degrades to 503 "Network unavailable".
  async fn network_or_cached(&self, request: &Request) -> Option<Served> {
    match self.network.fetch(request).await {
      Ok(response) => Some(Served::from_network(response)),
      Err(e) => {
        warn!(url = %request.url(), error = %e, "network fetch failed, trying cache");
        match self.lookup_any(&RequestKey::from(request)).await {
          Ok(cached) => cached.map(Served::from_cache),
          Err(()) => Some(Served::synthetic(Response::network_unavailable())),
        }
      }
    }
  }

  /// Cache-first strategy.
  ///
  /// 1. Check the named store - if present, return without touching the network
  /// 2. Otherwise fetch; an ok response is cloned into the store
  /// 3. Transport failure, non-ok status or a failing store yields 404
  ///    "Resource unavailable"
  pub async fn cache_first(&self, request: &Request, store: &str) -> Served {
    let key = RequestKey::from(request);

    // Check cache first
    match self.storage.get(store, &key).await {
      Ok(Some(cached)) => return Served::from_cache(cached),
      Ok(None) => {}
      Err(e) => {
        warn!(store, %key, error = %e, "cache read failed");
        return Served::synthetic(Response::resource_unavailable());
      }
    }

    match self.network.fetch(request).await {
      Ok(response) if response.is_ok() => {
        let snapshot = response.clone();
        match self.storage.put(store, &key, &snapshot).await {
          Ok(()) => Served::from_network(response),
          Err(e) => {
            warn!(store, %key, error = %e, "cache write failed");
            Served::synthetic(Response::resource_unavailable())
          }
        }
      }
      Ok(response) => {
        debug!(%key, status = response.status, "not caching non-ok response");
        Served::synthetic(Response::resource_unavailable())
      }
      Err(e) => {
        warn!(%key, error = %e, "network fetch failed");
        Served::synthetic(Response::resource_unavailable())
      }
    }
  }

  /// Stale-while-revalidate strategy.
  ///
  /// The cached match (if any) is returned without waiting on the network.
  /// A background task fetches the request and stores an ok response in the
  /// runtime store for later requests. With no cached match the caller waits
  /// for that fetch. A failing store yields 503 "Network unavailable".
  pub async fn stale_while_revalidate(&self, request: &Request) -> Served {
    let key = RequestKey::from(request);
    let cached = match self.lookup_any(&key).await {
      Ok(cached) => cached,
      Err(()) => return Served::synthetic(Response::network_unavailable()),
    };

    let (tx, rx) = oneshot::channel();
    let revalidation = revalidate(
      Arc::clone(&self.storage),
      Arc::clone(&self.network),
      self.names.runtime_store.clone(),
      request.clone(),
      cached.clone(),
    );
    self.track(tokio::spawn(async move {
      // Receiver is gone once a cached value was returned
      let _ = tx.send(revalidation.await);
    }));

    if let Some(cached) = cached {
      return Served::from_cache(cached);
    }

    match rx.await {
      Ok(Some(served)) => served,
      _ => Served::synthetic(Response::network_unavailable()),
    }
  }

  /// Wait for every background revalidation started so far.
  pub async fn settle(&self) {
    let handles = match self.pending.lock() {
      Ok(mut pending) => std::mem::take(&mut *pending),
      Err(e) => {
        warn!("revalidation list poisoned: {}", e);
        return;
      }
    };

    for handle in handles {
      if let Err(e) = handle.await {
        warn!(error = %e, "revalidation task failed");
      }
    }
  }

  fn track(&self, handle: JoinHandle<()>) {
    match self.pending.lock() {
      Ok(mut pending) => {
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
      }
      Err(e) => warn!("revalidation list poisoned: {}", e),
    }
  }

  /// Store errors are logged here; callers only see that the read failed.
  async fn lookup_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>, ()> {
    self.storage.match_any(key).await.map_err(|e| {
      warn!(%key, error = %e, "cache read failed");
    })
  }
}

/// Fetch `request`, storing an ok response into `store`.
///
/// Resolves to the network response (any status) or, on transport failure,
/// to the previously cached value. A failed write resolves to 503
/// "Network unavailable".
async fn revalidate(
  storage: Arc<dyn CacheStorage>,
  network: Arc<dyn Network>,
  store: String,
  request: Request,
  previous: Option<CachedResponse>,
) -> Option<Served> {
  let key = RequestKey::from(&request);

  match network.fetch(&request).await {
    Ok(response) => {
      if response.is_ok() {
        let snapshot = response.clone();
        match storage.put(&store, &key, &snapshot).await {
          Ok(()) => debug!(%key, store = %store, "revalidated"),
          Err(e) => {
            warn!(%key, error = %e, "cache write failed");
            return Some(Served::synthetic(Response::network_unavailable()));
          }
        }
      }
      Some(Served::from_network(response))
    }
    Err(e) => {
      debug!(%key, error = %e, "revalidation fetch failed");
      previous.map(Served::from_cache)
    }
  }
}

impl Clone for OfflineLayer {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      network: Arc::clone(&self.network),
      names: self.names.clone(),
      selector: self.selector.clone(),
      fallback: self.fallback.clone(),
      pending: Arc::clone(&self.pending),
    }
  }
}
