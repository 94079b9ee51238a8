//! Fakes shared by unit tests.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use crate::cache::{CacheStorage, CachedResponse, EntrySummary, MemoryStorage, RequestKey};
use crate::http::{Network, Request, Response};

/// Scripted network: per-URL responses, everything else fails at the
/// transport level.
#[derive(Default)]
pub struct FakeNetwork {
  routes: Mutex<HashMap<String, Response>>,
  delay: Option<Duration>,
  calls: AtomicUsize,
}

impl FakeNetwork {
  /// A network where every fetch fails.
  pub fn offline() -> Self {
    Self::default()
  }

  pub fn with_route(self, path: &str, response: Response) -> Self {
    self.route(path, response);
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn route(&self, path: &str, response: Response) {
    self
      .routes
      .lock()
      .unwrap()
      .insert(url(path).to_string(), response);
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Network for FakeNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    let routes = self.routes.lock().unwrap();
    routes
      .get(request.url().as_str())
      .cloned()
      .ok_or_else(|| eyre!("connection refused: {}", request.url()))
  }
}

/// Memory store whose reads and writes can be made to fail.
///
/// Deletes always go through, so rollbacks can be checked against `inner`.
pub struct FailingStorage {
  inner: Arc<MemoryStorage>,
  fail_reads: bool,
  fail_writes: WriteFailure,
}

enum WriteFailure {
  Never,
  Always,
  For(RequestKey),
}

impl FailingStorage {
  pub fn new(inner: Arc<MemoryStorage>) -> Self {
    Self {
      inner,
      fail_reads: false,
      fail_writes: WriteFailure::Never,
    }
  }

  pub fn failing_reads(mut self) -> Self {
    self.fail_reads = true;
    self
  }

  pub fn failing_writes(mut self) -> Self {
    self.fail_writes = WriteFailure::Always;
    self
  }

  /// Fail puts of this one path only.
  pub fn failing_writes_for(mut self, path: &str) -> Self {
    self.fail_writes = WriteFailure::For(RequestKey::new("GET", &url(path)));
    self
  }

  fn check_read(&self) -> Result<()> {
    if self.fail_reads {
      return Err(eyre!("disk I/O error"));
    }
    Ok(())
  }
}

#[async_trait]
impl CacheStorage for FailingStorage {
  async fn get(&self, store: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    self.check_read()?;
    self.inner.get(store, key).await
  }

  async fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    self.check_read()?;
    self.inner.match_any(key).await
  }

  async fn put(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let fails = match &self.fail_writes {
      WriteFailure::Never => false,
      WriteFailure::Always => true,
      WriteFailure::For(failing) => failing == key,
    };
    if fails {
      return Err(eyre!("quota exceeded writing {}", key));
    }
    self.inner.put(store, key, response).await
  }

  async fn store_names(&self) -> Result<Vec<String>> {
    self.inner.store_names().await
  }

  async fn delete(&self, store: &str, key: &RequestKey) -> Result<bool> {
    self.inner.delete(store, key).await
  }

  async fn delete_store(&self, store: &str) -> Result<bool> {
    self.inner.delete_store(store).await
  }

  async fn entries(&self, store: &str) -> Result<Vec<EntrySummary>> {
    self.inner.entries(store).await
  }
}

/// Absolute URL on the test origin.
pub fn url(path: &str) -> Url {
  Url::parse("https://app.test").unwrap().join(path).unwrap()
}
