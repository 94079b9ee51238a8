//! Open dashboard pages the worker can control and navigate.

use color_eyre::{eyre::eyre, Result};
use std::sync::Mutex;
use tracing::{debug, info};
use url::Url;

/// One open page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
  pub id: u64,
  pub url: Url,
  /// Version tag of the worker controlling this page, if any
  pub controller: Option<String>,
}

#[derive(Debug, Default)]
struct Registry {
  clients: Vec<Client>,
  next_id: u64,
}

impl Registry {
  fn add(&mut self, url: Url) -> u64 {
    self.next_id += 1;
    let id = self.next_id;
    self.clients.push(Client {
      id,
      url,
      controller: None,
    });
    id
  }
}

/// Registry of open clients.
#[derive(Debug, Default)]
pub struct Clients {
  inner: Mutex<Registry>,
}

impl Clients {
  pub fn new() -> Self {
    Self::default()
  }

  /// Track a page that is already open.
  pub fn register(&self, url: Url) -> Result<u64> {
    let mut inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(inner.add(url))
  }

  pub fn list(&self) -> Result<Vec<Client>> {
    let inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(inner.clients.clone())
  }

  /// Take control of every open client without a reload. Returns how many
  /// clients changed controller.
  pub async fn claim(&self, version: &str) -> Result<usize> {
    let mut inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut claimed = 0;
    for client in inner.clients.iter_mut() {
      if client.controller.as_deref() != Some(version) {
        client.controller = Some(version.to_string());
        claimed += 1;
      }
    }

    info!(claimed, version, "claimed clients");
    Ok(claimed)
  }

  /// Navigate the first open client to `url`, or open a new one.
  pub async fn navigate_or_open(&self, url: Url) -> Result<u64> {
    let mut inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    if let Some(client) = inner.clients.first_mut() {
      debug!(client = client.id, url = %url, "navigating client");
      client.url = url;
      return Ok(client.id);
    }

    let id = inner.add(url.clone());
    debug!(client = id, url = %url, "opened client");
    Ok(id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::url;

  #[tokio::test]
  async fn test_claim_sets_controller() {
    let clients = Clients::new();
    clients.register(url("/dashboard.html")).unwrap();
    clients.register(url("/investors")).unwrap();

    assert_eq!(clients.claim("v2").await.unwrap(), 2);
    assert!(clients
      .list()
      .unwrap()
      .iter()
      .all(|c| c.controller.as_deref() == Some("v2")));

    // Already controlled by v2
    assert_eq!(clients.claim("v2").await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_navigate_existing_client() {
    let clients = Clients::new();
    let id = clients.register(url("/investors")).unwrap();

    let navigated = clients.navigate_or_open(url("/dashboard.html")).await.unwrap();
    assert_eq!(navigated, id);
    assert_eq!(clients.list().unwrap()[0].url, url("/dashboard.html"));
  }

  #[tokio::test]
  async fn test_open_when_no_clients() {
    let clients = Clients::new();
    clients.navigate_or_open(url("/dashboard.html")).await.unwrap();

    let list = clients.list().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].url, url("/dashboard.html"));
  }
}
