//! Maps an inbound request to exactly one fetch strategy.

use crate::http::Request;

/// File extensions treated as static assets regardless of destination.
const STATIC_EXTENSIONS: &[&str] = &[
  "js", "mjs", "css", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2", "ttf",
  "webmanifest",
];

/// A fetch strategy chosen for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
  /// Non-GET: straight to the network, never cached
  Passthrough,
  /// Page loads: network first, then cache, then the offline shell
  NetworkFirst,
  /// Static assets: serve from the named store if present
  CacheFirst { store: String },
  /// Runtime data: serve cached immediately, refresh in the background
  StaleWhileRevalidate,
}

/// Pure request classifier.
#[derive(Debug, Clone)]
pub struct StrategySelector {
  api_prefixes: Vec<String>,
  static_store: String,
}

impl StrategySelector {
  pub fn new(api_prefixes: Vec<String>, static_store: String) -> Self {
    Self {
      api_prefixes,
      static_store,
    }
  }

  /// First match wins: method, navigation, API path, static asset.
  pub fn select(&self, request: &Request) -> Strategy {
    if request.method() != "GET" {
      return Strategy::Passthrough;
    }

    let path = request.url().path();

    if request.is_navigation() || path.ends_with(".html") {
      return Strategy::NetworkFirst;
    }

    if self.api_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
      return Strategy::StaleWhileRevalidate;
    }

    if request.destination().is_static_asset() || has_static_extension(path) {
      return Strategy::CacheFirst {
        store: self.static_store.clone(),
      };
    }

    Strategy::StaleWhileRevalidate
  }
}

fn has_static_extension(path: &str) -> bool {
  let file = path.rsplit('/').next().unwrap_or_default();
  match file.rsplit_once('.') {
    Some((_, ext)) => STATIC_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
    None => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::Destination;
  use url::Url;

  fn selector() -> StrategySelector {
    StrategySelector::new(vec!["/api/".to_string()], "static-v1".to_string())
  }

  fn get(path: &str) -> Request {
    Request::get(Url::parse("https://app.test").unwrap().join(path).unwrap())
  }

  fn cache_first() -> Strategy {
    Strategy::CacheFirst {
      store: "static-v1".to_string(),
    }
  }

  #[test]
  fn test_navigation_is_network_first() {
    let nav = Request::navigate(Url::parse("https://app.test/properties").unwrap());
    assert_eq!(selector().select(&nav), Strategy::NetworkFirst);
    assert_eq!(selector().select(&get("/dashboard.html")), Strategy::NetworkFirst);
  }

  #[test]
  fn test_static_assets_are_cache_first() {
    assert_eq!(selector().select(&get("/assets/app.js")), cache_first());
    assert_eq!(selector().select(&get("/styles/Main.CSS")), cache_first());
    assert_eq!(
      selector().select(&get("/avatar").with_destination(Destination::Image)),
      cache_first()
    );
  }

  #[test]
  fn test_api_paths_are_stale_while_revalidate() {
    assert_eq!(
      selector().select(&get("/api/units?page=2")),
      Strategy::StaleWhileRevalidate
    );
    // API prefix wins over a static-looking extension
    assert_eq!(
      selector().select(&get("/api/export/report.png")),
      Strategy::StaleWhileRevalidate
    );
  }

  #[test]
  fn test_unclassified_defaults_to_stale_while_revalidate() {
    assert_eq!(selector().select(&get("/feed")), Strategy::StaleWhileRevalidate);
    assert_eq!(selector().select(&get("/v1.0/feed")), Strategy::StaleWhileRevalidate);
  }

  #[test]
  fn test_non_get_passes_through() {
    let url = Url::parse("https://app.test/api/leases").unwrap();
    assert_eq!(
      selector().select(&Request::new("POST", url)),
      Strategy::Passthrough
    );
  }

  #[test]
  fn test_selection_is_deterministic() {
    let req = get("/assets/logo.svg");
    assert_eq!(selector().select(&req), selector().select(&req));
  }
}
