//! Application handler seam.
//!
//! One [`WsHandler`] is bound per connection at handshake time. Lifecycle
//! hooks are optional: the defaults are no-ops, and the capability probes
//! let the coordinator warn (rather than fault) when a frame arrives for a
//! handler that never opted into message handling.

use async_trait::async_trait;

use wsgate_core::{ConnectionId, UpgradeRequest};

use crate::socket::Frame;

/// Fault raised by a lifecycle hook. Always caught and logged by the
/// coordinator; one connection's fault must not reach the worker.
pub type HandlerFault = Box<dyn std::error::Error + Send + Sync>;

/// Result of a lifecycle hook invocation.
pub type HandlerResult = Result<(), HandlerFault>;

/// Per-connection application handler, bound via the route table.
#[async_trait]
pub trait WsHandler: Send + Sync {
    /// Whether this handler consumes message frames.
    fn handles_messages(&self) -> bool {
        false
    }

    /// Whether this handler observes connection close.
    fn handles_close(&self) -> bool {
        false
    }

    /// Called after a successful handshake, from a deferred task.
    async fn on_open(&self, fd: ConnectionId, request: &UpgradeRequest) -> HandlerResult {
        let _ = (fd, request);
        Ok(())
    }

    /// Called for each inbound frame, when [`handles_messages`](Self::handles_messages).
    async fn on_message(&self, frame: Frame) -> HandlerResult {
        let _ = frame;
        Ok(())
    }

    /// Called on connection close, when [`handles_close`](Self::handles_close).
    async fn on_close(&self, fd: ConnectionId) -> HandlerResult {
        let _ = fd;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    #[async_trait]
    impl WsHandler for Bare {}

    #[tokio::test]
    async fn defaults_are_noop_and_unsupported() {
        let h = Bare;
        assert!(!h.handles_messages());
        assert!(!h.handles_close());
        let req = UpgradeRequest::new("/ws");
        assert!(h.on_open(ConnectionId::new(1), &req).await.is_ok());
        assert!(
            h.on_message(Frame {
                fd: ConnectionId::new(1),
                data: "x".into(),
            })
            .await
            .is_ok()
        );
        assert!(h.on_close(ConnectionId::new(1)).await.is_ok());
    }
}
