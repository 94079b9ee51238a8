//! The worker: typed events dispatched to explicit handlers.

pub mod clients;
pub mod lifecycle;
pub mod notification;

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::cache::{OfflineLayer, Served};
use crate::config::Config;
use crate::event::{EventOutcome, WorkerEvent, BACKGROUND_SYNC_TAG};
use crate::http::Request;

pub use clients::Clients;
pub use lifecycle::ActivationReport;
pub use notification::{Notification, Notifier};

/// Settings the handlers need, resolved from config once.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
  pub version: String,
  pub precache: Vec<Url>,
  pub notification_title: String,
  pub click_url: Url,
}

impl WorkerSettings {
  pub fn from_config(config: &Config) -> Result<Self> {
    let precache = config
      .precache
      .iter()
      .map(|p| config.resolve(p))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      version: config.cache.version.clone(),
      precache,
      notification_title: config.notification.title.clone(),
      click_url: config.resolve(&config.notification.click_path)?,
    })
  }
}

pub struct ServiceWorker {
  layer: OfflineLayer,
  clients: Arc<Clients>,
  notifier: Arc<dyn Notifier>,
  settings: WorkerSettings,
}

impl ServiceWorker {
  pub fn new(
    layer: OfflineLayer,
    clients: Arc<Clients>,
    notifier: Arc<dyn Notifier>,
    settings: WorkerSettings,
  ) -> Self {
    Self {
      layer,
      clients,
      notifier,
      settings,
    }
  }

  pub fn layer(&self) -> &OfflineLayer {
    &self.layer
  }

  /// Route an event to its handler.
  pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome> {
    match event {
      WorkerEvent::Install => {
        let cached = self.on_install().await?;
        Ok(EventOutcome::Installed { cached })
      }
      WorkerEvent::Activate => Ok(EventOutcome::Activated(self.on_activate().await)),
      WorkerEvent::Fetch(request) => Ok(EventOutcome::Responded(self.on_fetch(&request).await)),
      WorkerEvent::Sync { tag } => Ok(EventOutcome::Synced {
        handled: self.on_sync(&tag),
      }),
      WorkerEvent::Push { payload } => {
        let notification = self.on_push(payload.as_deref()).await?;
        Ok(EventOutcome::Notified(notification))
      }
      WorkerEvent::NotificationClick => {
        let client = self.on_notification_click().await?;
        Ok(EventOutcome::Navigated {
          client,
          url: self.settings.click_url.clone(),
        })
      }
    }
  }

  async fn on_install(&self) -> Result<usize> {
    lifecycle::install(&self.layer, &self.settings.precache).await
  }

  async fn on_activate(&self) -> ActivationReport {
    lifecycle::activate(&self.layer, &self.clients, &self.settings.version).await
  }

  async fn on_fetch(&self, request: &Request) -> Served {
    self.layer.handle(request).await
  }

  fn on_sync(&self, tag: &str) -> bool {
    if tag == BACKGROUND_SYNC_TAG {
      // Queued writes are flushed by the dashboard itself
      info!(tag, "background sync triggered");
      true
    } else {
      debug!(tag, "ignoring unknown sync tag");
      false
    }
  }

  async fn on_push(&self, payload: Option<&str>) -> Result<Notification> {
    let notification = Notification::for_push(
      &self.settings.notification_title,
      payload,
      self.settings.click_url.path(),
    );
    self.notifier.show(&notification).await?;
    Ok(notification)
  }

  async fn on_notification_click(&self) -> Result<u64> {
    self
      .clients
      .navigate_or_open(self.settings.click_url.clone())
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{
    CacheStorage, MemoryStorage, OfflineFallback, ResponseSource, StoreNames, StrategySelector,
  };
  use crate::http::Response;
  use crate::testing::{url, FakeNetwork};
  use async_trait::async_trait;
  use std::sync::Mutex;

  #[derive(Default)]
  struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
  }

  #[async_trait]
  impl Notifier for RecordingNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
      self.shown.lock().unwrap().push(notification.clone());
      Ok(())
    }
  }

  struct Harness {
    worker: ServiceWorker,
    storage: Arc<MemoryStorage>,
    clients: Arc<Clients>,
    notifier: Arc<RecordingNotifier>,
  }

  fn harness(network: FakeNetwork) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let clients = Arc::new(Clients::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let names = StoreNames::new("rental-dashboard", "v3");
    let selector = StrategySelector::new(vec!["/api/".to_string()], names.static_store.clone());
    let layer = OfflineLayer::new(
      storage.clone(),
      Arc::new(network),
      names,
      selector,
      OfflineFallback::new(url("/dashboard.html")),
    );
    let settings = WorkerSettings {
      version: "v3".to_string(),
      precache: vec![url("/dashboard.html")],
      notification_title: "Rental Dashboard".to_string(),
      click_url: url("/dashboard.html"),
    };

    Harness {
      worker: ServiceWorker::new(layer, clients.clone(), notifier.clone(), settings),
      storage,
      clients,
      notifier,
    }
  }

  #[tokio::test]
  async fn test_install_then_offline_navigation_serves_shell() {
    let network = FakeNetwork::default().with_route("/dashboard.html", Response::new(200, "<shell>"));
    let h = harness(network);

    let outcome = h.worker.dispatch(WorkerEvent::Install).await.unwrap();
    assert!(matches!(outcome, EventOutcome::Installed { cached: 1 }));

    // Page that was never cached, network down for it
    let outcome = h
      .worker
      .dispatch(WorkerEvent::Fetch(Request::navigate(url("/properties/12"))))
      .await
      .unwrap();

    match outcome {
      EventOutcome::Responded(served) => {
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.response.text(), "<shell>");
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_activate_claims_and_prunes() {
    let h = harness(FakeNetwork::offline());
    h.storage
      .put(
        "rental-dashboard-static-v2",
        &crate::cache::RequestKey::new("GET", &url("/")),
        &Response::new(200, ""),
      )
      .await
      .unwrap();
    h.clients.register(url("/dashboard.html")).unwrap();

    let outcome = h.worker.dispatch(WorkerEvent::Activate).await.unwrap();
    match outcome {
      EventOutcome::Activated(report) => {
        assert_eq!(report.deleted, vec!["rental-dashboard-static-v2".to_string()]);
        assert_eq!(report.claimed, 1);
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_sync_tags() {
    let h = harness(FakeNetwork::offline());
    let known = h
      .worker
      .dispatch(WorkerEvent::Sync {
        tag: BACKGROUND_SYNC_TAG.to_string(),
      })
      .await
      .unwrap();
    assert!(matches!(known, EventOutcome::Synced { handled: true }));

    let unknown = h
      .worker
      .dispatch(WorkerEvent::Sync {
        tag: "other".to_string(),
      })
      .await
      .unwrap();
    assert!(matches!(unknown, EventOutcome::Synced { handled: false }));
  }

  #[tokio::test]
  async fn test_push_shows_notification() {
    let h = harness(FakeNetwork::offline());
    h.worker
      .dispatch(WorkerEvent::Push {
        payload: Some("Lease renewal due".to_string()),
      })
      .await
      .unwrap();

    let shown = h.notifier.shown.lock().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Rental Dashboard");
    assert_eq!(shown[0].body, "Lease renewal due");
    assert_eq!(shown[0].vibrate, vec![100, 50, 100]);
  }

  #[tokio::test]
  async fn test_notification_click_navigates() {
    let h = harness(FakeNetwork::offline());
    let id = h.clients.register(url("/investors")).unwrap();

    let outcome = h.worker.dispatch(WorkerEvent::NotificationClick).await.unwrap();
    match outcome {
      EventOutcome::Navigated { client, url: target } => {
        assert_eq!(client, id);
        assert_eq!(target, url("/dashboard.html"));
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(h.clients.list().unwrap()[0].url, url("/dashboard.html"));
  }
}
