//! Request and response types seen by the offline layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// What kind of resource a request is fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
  Document,
  Script,
  Style,
  Image,
  Font,
  Manifest,
  /// fetch()/XHR style requests with no specific destination
  #[default]
  Empty,
}

impl Destination {
  /// Destinations that are served from the static store.
  pub fn is_static_asset(self) -> bool {
    matches!(
      self,
      Destination::Script
        | Destination::Style
        | Destination::Image
        | Destination::Font
        | Destination::Manifest
    )
  }
}

impl std::str::FromStr for Destination {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "document" => Ok(Destination::Document),
      "script" => Ok(Destination::Script),
      "style" => Ok(Destination::Style),
      "image" => Ok(Destination::Image),
      "font" => Ok(Destination::Font),
      "manifest" => Ok(Destination::Manifest),
      "" | "empty" => Ok(Destination::Empty),
      other => Err(format!("unknown destination: {}", other)),
    }
  }
}

/// An inbound fetch descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  method: String,
  url: Url,
  destination: Destination,
  navigate: bool,
  headers: BTreeMap<String, String>,
}

impl Request {
  /// A GET request with no destination.
  pub fn get(url: Url) -> Self {
    Self::new("GET", url)
  }

  pub fn new(method: &str, url: Url) -> Self {
    Self {
      method: method.to_uppercase(),
      url,
      destination: Destination::Empty,
      navigate: false,
      headers: BTreeMap::new(),
    }
  }

  /// A top-level page load.
  pub fn navigate(url: Url) -> Self {
    Self {
      destination: Destination::Document,
      navigate: true,
      ..Self::get(url)
    }
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.insert(name.to_lowercase(), value.to_string());
    self
  }

  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn url(&self) -> &Url {
    &self.url
  }

  pub fn destination(&self) -> Destination {
    self.destination
  }

  pub fn headers(&self) -> &BTreeMap<String, String> {
    &self.headers
  }

  /// Whether this request loads a full document.
  pub fn is_navigation(&self) -> bool {
    self.navigate || self.destination == Destination::Document
  }
}

/// A response snapshot. Cloning yields an independent readable copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub status_text: String,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      status_text: String::new(),
      headers: BTreeMap::new(),
      body: body.into(),
    }
  }

  /// A plain-text response produced by this layer rather than the network.
  pub fn synthetic(status: u16, status_text: &str, body: &str) -> Self {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "text/plain".to_string());
    Self {
      status,
      status_text: status_text.to_string(),
      headers,
      body: body.as_bytes().to_vec(),
    }
  }

  /// 503 returned when neither the network nor any cache can answer.
  pub fn network_unavailable() -> Self {
    Self::synthetic(503, "Service Unavailable", "Network unavailable")
  }

  /// 503 returned by the offline fallback.
  pub fn offline() -> Self {
    Self::synthetic(503, "Service Unavailable", "Offline")
  }

  /// 404 returned when a cache-first asset cannot be obtained.
  pub fn resource_unavailable() -> Self {
    Self::synthetic(404, "Not Found", "Resource unavailable")
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.insert(name.to_lowercase(), value.to_string());
    self
  }

  /// 2xx
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}
