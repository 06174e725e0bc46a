//! Internal upgrade request/response representation.
//!
//! The translation between the host server's raw request and these types is
//! owned by an external collaborator; the gateway core only reads headers,
//! attaches attributes, and assembles the upgrade response. Header names are
//! normalized to lowercase on insert and lookup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Well-known header names ─────────────────────────────────────────

/// Client handshake security key header.
pub const SEC_WEBSOCKET_KEY: &str = "sec-websocket-key";
/// Optional subprotocol negotiation header, echoed back when present.
pub const SEC_WEBSOCKET_PROTOCOL: &str = "sec-websocket-protocol";
/// Connection upgrade marker header.
pub const UPGRADE: &str = "upgrade";

/// An upgrade request as seen by the handshake path.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpgradeRequest {
    /// Request path, used for route resolution.
    pub path: String,
    /// Request headers, lowercase names.
    headers: BTreeMap<String, String>,
    /// Attributes attached while the request moves through the pipeline
    /// (resolved route, bound handler name).
    attributes: BTreeMap<String, Value>,
}

impl UpgradeRequest {
    /// Create a request for the given path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            headers: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set a header, normalizing the name to lowercase.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let _ = self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Builder-style [`set_header`](Self::set_header).
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Attach an attribute.
    pub fn set_attribute(&mut self, name: &str, value: Value) {
        let _ = self.attributes.insert(name.to_owned(), value);
    }

    /// Read an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// The response assembled while a handshake moves through the pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpgradeResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, lowercase names.
    headers: BTreeMap<String, String>,
    /// Response body, empty for a successful upgrade.
    pub body: String,
}

impl Default for UpgradeResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }
}

impl UpgradeResponse {
    /// Create an empty response with the given status.
    #[must_use]
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Set a header, normalizing the name to lowercase.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let _ = self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Iterate over `(name, value)` header pairs.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
