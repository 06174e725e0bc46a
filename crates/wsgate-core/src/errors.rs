//! Error hierarchy for the gateway core.
//!
//! Two domains, each its own [`thiserror`] enum:
//!
//! - [`HandshakeError`]: fatal to a single upgrade negotiation — converted
//!   to a client-visible error response, never to a worker fault
//! - [`SenderError`]: raised by the cross-worker dispatch surface
//!
//! Machine-readable code constants mirror the wire-format convention.

use thiserror::Error;

// ── Error code constants ────────────────────────────────────────────

/// Security key missing or failed validation.
pub const INVALID_SECURITY_KEY: &str = "INVALID_SECURITY_KEY";
/// Route table missing or no route matched the request.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Route matched but its handler descriptor does not exist.
pub const HANDLER_MISSING: &str = "HANDLER_MISSING";
/// Sender operation outside the allowed set.
pub const INVALID_OPERATION: &str = "INVALID_OPERATION";
/// Pipe envelope named an allowed operation but did not parse.
pub const MALFORMED_MESSAGE: &str = "MALFORMED_MESSAGE";

/// Failure of one upgrade negotiation.
///
/// Every variant is fatal to its handshake only: the coordinator releases
/// the connection's context, guarantees no directory entry survives, and
/// renders a non-101 response. The worker is unaffected.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// `sec-websocket-key` absent or rejected by the security validator.
    #[error("sec-websocket-key is invalid")]
    InvalidSecurityKey,

    /// No route table for this server, or no route matched the path.
    #[error("no route matched '{path}'")]
    RouteNotFound {
        /// Request path that failed to match.
        path: String,
    },

    /// The matched route names a handler that does not exist.
    #[error("route handler does not exist")]
    HandlerMissing,
}

impl HandshakeError {
    /// Machine-readable error code for this variant.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSecurityKey => INVALID_SECURITY_KEY,
            Self::RouteNotFound { .. } => NOT_FOUND,
            Self::HandlerMissing => HANDLER_MISSING,
        }
    }

    /// HTTP status surfaced to the client when this error aborts a
    /// handshake and the application renderer does not override it.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::RouteNotFound { .. } => 404,
            Self::InvalidSecurityKey | Self::HandlerMissing => 400,
        }
    }
}

/// Failure of a sender operation.
#[derive(Debug, Error)]
pub enum SenderError {
    /// Operation name outside the closed `{push, disconnect}` set.
    ///
    /// Raised synchronously to the initiating caller; when decoded off the
    /// pipe it is caught and logged by the listener, never re-raised.
    #[error("operation [{operation}] is not allowed")]
    InvalidOperation {
        /// The rejected operation name.
        operation: String,
    },

    /// Pipe envelope with an allowed operation but unusable arguments.
    #[error("malformed pipe message: {reason}")]
    MalformedMessage {
        /// What failed to parse.
        reason: String,
    },
}

impl SenderError {
    /// Machine-readable error code for this variant.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidOperation { .. } => INVALID_OPERATION,
            Self::MalformedMessage { .. } => MALFORMED_MESSAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn invalid_key_code_and_status() {
        let err = HandshakeError::InvalidSecurityKey;
        assert_eq!(err.code(), INVALID_SECURITY_KEY);
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn route_not_found_is_404() {
        let err = HandshakeError::RouteNotFound {
            path: "/chat".into(),
        };
        assert_eq!(err.code(), NOT_FOUND);
        assert_eq!(err.status(), 404);
        assert!(err.to_string().contains("/chat"));
    }

    #[test]
    fn handler_missing_is_400() {
        let err = HandshakeError::HandlerMissing;
        assert_eq!(err.code(), HANDLER_MISSING);
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn sender_invalid_operation_message_names_op() {
        let err = SenderError::InvalidOperation {
            operation: "broadcast".into(),
        };
        assert_eq!(err.code(), INVALID_OPERATION);
        assert_matches!(err, SenderError::InvalidOperation { ref operation } if operation == "broadcast");
        assert_eq!(err.to_string(), "operation [broadcast] is not allowed");
    }
}
