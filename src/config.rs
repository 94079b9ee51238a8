use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

use crate::cache::{StoreNames, StrategySelector};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Origin the dashboard is served from; relative paths resolve against it
  pub origin: String,
  pub cache: CacheConfig,
  /// Paths pre-cached into the static store on install
  pub precache: Vec<String>,
  /// Document served to failed page loads
  pub shell: String,
  /// Path prefixes handled as runtime API data
  pub api_prefixes: Vec<String>,
  pub network: NetworkConfig,
  pub notification: NotificationConfig,
  pub log: LogConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: "http://localhost:8080".to_string(),
      cache: CacheConfig::default(),
      precache: vec![
        "/".to_string(),
        "/dashboard.html".to_string(),
        "/login.html".to_string(),
        "/manifest.json".to_string(),
      ],
      shell: "/dashboard.html".to_string(),
      api_prefixes: vec!["/api/".to_string()],
      network: NetworkConfig::default(),
      notification: NotificationConfig::default(),
      log: LogConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Store name prefix
  pub prefix: String,
  /// Version tag; bumping it makes activation prune the old stores
  pub version: String,
  /// Database location (default: $XDG_DATA_HOME/dashcache/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      prefix: "rental-dashboard".to_string(),
      version: "v1".to_string(),
      path: None,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
  /// HTTP client timeout. The strategies themselves impose none.
  pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
  pub title: String,
  /// Where a notification click sends the user
  pub click_path: String,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      title: "Rental Dashboard".to_string(),
      click_path: "/dashboard.html".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Filter directive, overridden by DASHCACHE_LOG
  pub level: String,
  /// Log directory (default: $XDG_DATA_HOME/dashcache/logs)
  pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dashcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dashcache/config.yaml
  ///
  /// Falls back to built-in defaults when no file exists.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Ok(origin) = std::env::var("DASHCACHE_ORIGIN") {
      config.origin = origin;
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("dashcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dashcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    debug!(path = %path.display(), "loaded config");
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    self.origin_url()?;
    if self.cache.version.trim().is_empty() {
      return Err(eyre!("cache.version must not be empty"));
    }
    if !self.precache.iter().any(|p| p == &self.shell) {
      warn!(shell = %self.shell, "offline shell is not in the precache list");
    }
    Ok(())
  }

  pub fn origin_url(&self) -> Result<Url> {
    Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))
  }

  /// Resolve a path or absolute URL against the origin.
  pub fn resolve(&self, path_or_url: &str) -> Result<Url> {
    self
      .origin_url()?
      .join(path_or_url)
      .map_err(|e| eyre!("Invalid URL '{}': {}", path_or_url, e))
  }

  pub fn store_names(&self) -> StoreNames {
    StoreNames::new(&self.cache.prefix, &self.cache.version)
  }

  pub fn selector(&self) -> StrategySelector {
    StrategySelector::new(self.api_prefixes.clone(), self.store_names().static_store)
  }
}
