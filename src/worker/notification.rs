//! System notifications raised by push messages.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;

/// Vibration pattern in milliseconds: buzz, pause, buzz.
pub const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// Body used when a push arrives without a payload.
pub const DEFAULT_BODY: &str = "You have a new update in your rental dashboard";

/// Inline house glyph used as both icon and badge.
const ICON_SVG: &str = concat!(
  "data:image/svg+xml,",
  "%3Csvg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 96 96'%3E",
  "%3Crect width='96' height='96' rx='18' fill='%232563eb'/%3E",
  "%3Cpath d='M48 20 18 46h8v30h18V58h8v18h18V46h8z' fill='white'/%3E",
  "%3C/svg%3E"
);

const BADGE_SVG: &str = concat!(
  "data:image/svg+xml,",
  "%3Csvg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 72 72'%3E",
  "%3Cpath d='M36 10 8 34h8v28h16V46h8v16h16V34h8z' fill='black'/%3E",
  "%3C/svg%3E"
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationData {
  /// Path opened when the notification is clicked
  pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  pub data: NotificationData,
}

impl Notification {
  /// Build the notification for a push message.
  pub fn for_push(title: &str, payload: Option<&str>, click_path: &str) -> Self {
    let body = match payload.map(str::trim) {
      Some(text) if !text.is_empty() => text.to_string(),
      _ => DEFAULT_BODY.to_string(),
    };

    Self {
      title: title.to_string(),
      body,
      icon: ICON_SVG.to_string(),
      badge: BADGE_SVG.to_string(),
      vibrate: VIBRATE_PATTERN.to_vec(),
      data: NotificationData {
        url: click_path.to_string(),
      },
    }
  }
}

/// The system notification surface.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn show(&self, notification: &Notification) -> Result<()>;
}

/// Writes each notification to stdout as one JSON line.
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
  async fn show(&self, notification: &Notification) -> Result<()> {
    let line = serde_json::to_string(notification)
      .map_err(|e| eyre!("Failed to serialize notification: {}", e))?;
    println!("{}", line);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_payload_becomes_body() {
    let n = Notification::for_push("Rental Dashboard", Some("Rent received for Unit 4B"), "/dashboard.html");
    assert_eq!(n.title, "Rental Dashboard");
    assert_eq!(n.body, "Rent received for Unit 4B");
    assert_eq!(n.vibrate, vec![100, 50, 100]);
    assert_eq!(n.data.url, "/dashboard.html");
  }

  #[test]
  fn test_missing_or_blank_payload_uses_default() {
    assert_eq!(Notification::for_push("t", None, "/").body, DEFAULT_BODY);
    assert_eq!(Notification::for_push("t", Some("  "), "/").body, DEFAULT_BODY);
  }

  #[test]
  fn test_icons_are_inline_svg() {
    let n = Notification::for_push("t", None, "/");
    assert!(n.icon.starts_with("data:image/svg+xml,"));
    assert!(n.badge.starts_with("data:image/svg+xml,"));
  }

  #[test]
  fn test_serializes_to_json() {
    let n = Notification::for_push("t", Some("hi"), "/dashboard.html");
    let value = serde_json::to_value(&n).unwrap();
    assert_eq!(value["vibrate"], serde_json::json!([100, 50, 100]));
    assert_eq!(value["data"]["url"], "/dashboard.html");
  }
}
