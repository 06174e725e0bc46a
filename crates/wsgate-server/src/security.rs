//! Handshake security validation contract.
//!
//! Key validity and accept-header derivation are owned by the host server's
//! security component; the gateway only consults this trait. Header name
//! constants live in [`wsgate_core::http`].

use std::collections::BTreeMap;

/// Validates the client's handshake key and derives the accept headers.
pub trait SecurityValidator: Send + Sync {
    /// Whether the presented `sec-websocket-key` is missing or invalid.
    fn is_invalid_security_key(&self, key: Option<&str>) -> bool;

    /// Headers completing the upgrade for a valid key
    /// (`upgrade`, `connection`, `sec-websocket-accept`).
    fn handshake_headers(&self, key: &str) -> BTreeMap<String, String>;
}
