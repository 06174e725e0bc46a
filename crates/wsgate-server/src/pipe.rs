//! Cross-worker pipe protocol.
//!
//! A [`SenderProxyMessage`] is created once per failed-local-attempt and
//! consumed once by each receiving worker. The operation set is closed:
//! anything but `push`/`disconnect` fails decoding with
//! [`SenderError::InvalidOperation`] and never reaches a network primitive.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use wsgate_core::{ConnectionId, SenderError};

use crate::sender::Sender;

/// Envelope for one proxied sender operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SenderProxyMessage {
    /// Proxied `push`.
    Push {
        /// Target connection.
        fd: ConnectionId,
        /// Payload to deliver.
        data: String,
        /// Optional frame opcode override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        opcode: Option<u8>,
        /// Optional finish-bit override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish: Option<bool>,
    },
    /// Proxied `disconnect`.
    Disconnect {
        /// Target connection.
        fd: ConnectionId,
        /// Optional close code.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<u16>,
        /// Optional close reason.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl SenderProxyMessage {
    /// The target connection. Always the first argument of the operation.
    #[must_use]
    pub fn fd(&self) -> ConnectionId {
        match self {
            Self::Push { fd, .. } | Self::Disconnect { fd, .. } => *fd,
        }
    }

    /// Wire name of the operation.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Push { .. } => "push",
            Self::Disconnect { .. } => "disconnect",
        }
    }

    /// Serialize for the pipe.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            error!(error = %err, "failed to encode pipe message");
            String::new()
        })
    }

    /// Parse a pipe payload, enforcing the closed operation set.
    pub fn decode(raw: &str) -> Result<Self, SenderError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| SenderError::MalformedMessage {
                reason: err.to_string(),
            })?;
        match value.get("op").and_then(Value::as_str) {
            Some("push" | "disconnect") => {
                serde_json::from_value(value).map_err(|err| SenderError::MalformedMessage {
                    reason: err.to_string(),
                })
            }
            Some(other) => Err(SenderError::InvalidOperation {
                operation: other.to_owned(),
            }),
            None => Err(SenderError::MalformedMessage {
                reason: "missing op field".to_owned(),
            }),
        }
    }
}

/// Receives pipe envelopes and re-runs the sender locally.
///
/// Runs inside the host's pipe-message callback: there is no caller to
/// receive a result, so every fault is caught, formatted, and logged.
pub struct PipeMessageListener {
    sender: Arc<Sender>,
}

impl PipeMessageListener {
    /// Create a listener driving the given sender.
    #[must_use]
    pub fn new(sender: Arc<Sender>) -> Self {
        Self { sender }
    }

    /// Handle one raw pipe payload.
    pub fn on_pipe_message(&self, raw: &str) {
        match SenderProxyMessage::decode(raw) {
            Ok(message) => {
                // Ownership discovery: delivery simply means our check
                // succeeded; false is the expected outcome on every
                // non-owning worker.
                let delivered = self.sender.proxy(&message);
                debug!(
                    fd = %message.fd(),
                    op = message.operation(),
                    delivered,
                    "pipe message handled"
                );
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "dropping pipe message");
            }
        }
    }
}
