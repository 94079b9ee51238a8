//! Substitute responses for requests that failed entirely.

use tracing::{debug, warn};
use url::Url;

use crate::http::{Request, Response};

use super::key::RequestKey;
use super::traits::{CacheStorage, Served};

/// Serves the pre-cached dashboard shell to failed page loads.
#[derive(Debug, Clone)]
pub struct OfflineFallback {
  shell: Url,
}

impl OfflineFallback {
  pub fn new(shell: Url) -> Self {
    Self { shell }
  }

  /// Navigation requests get the cached shell if any store holds it,
  /// everything else gets a plain 503 "Offline".
  pub async fn respond(&self, storage: &dyn CacheStorage, request: &Request) -> Served {
    if !request.is_navigation() {
      return Served::synthetic(Response::offline());
    }

    let key = RequestKey::new("GET", &self.shell);
    match storage.match_any(&key).await {
      Ok(Some(cached)) => {
        debug!(url = %request.url(), shell = %self.shell, "serving cached shell");
        Served::from_cache(cached)
      }
      Ok(None) => Served::synthetic(Response::offline()),
      Err(e) => {
        warn!(error = %e, "shell lookup failed");
        Served::synthetic(Response::offline())
      }
    }
  }
}
