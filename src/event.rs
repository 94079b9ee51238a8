use crate::cache::Served;
use crate::http::Request;
use crate::worker::{ActivationReport, Notification};
use url::Url;

/// Tag the dashboard registers for deferred writes.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

/// Worker lifecycle and functional events
#[derive(Debug, Clone)]
pub enum WorkerEvent {
  /// New version installed: pre-cache the shell
  Install,
  /// New version took over: prune old caches, claim clients
  Activate,
  /// A request issued by a controlled page
  Fetch(Request),
  /// Background sync trigger
  Sync { tag: String },
  /// Push message with optional text payload
  Push { payload: Option<String> },
  /// User clicked a notification
  NotificationClick,
}

/// What handling an event produced
#[derive(Debug, Clone)]
pub enum EventOutcome {
  Installed { cached: usize },
  Activated(ActivationReport),
  Responded(Served),
  /// Whether the tag was recognized
  Synced { handled: bool },
  Notified(Notification),
  Navigated { client: u64, url: Url },
}
