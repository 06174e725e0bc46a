//! Host network server primitives.
//!
//! The gateway never owns sockets: framing, timeouts, and delivery belong to
//! the host server and are reached through [`SocketServer`]. Everything here
//! is fire-and-forget — the host offers no acknowledgement for pushes or
//! pipe messages.

use wsgate_core::{ConnectionId, WorkerId};

/// Lifecycle status of one accepted connection, as reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Accepted but the upgrade has not completed.
    Accepted,
    /// Established, active WebSocket.
    ActiveWebSocket,
    /// Close initiated or completed.
    Closed,
}

/// One inbound message frame, already decoded by the host server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Originating connection.
    pub fd: ConnectionId,
    /// Frame payload.
    pub data: String,
}

/// Worker-local view of the host network server.
#[cfg_attr(test, mockall::automock)]
pub trait SocketServer: Send + Sync {
    /// Status of `fd`, or `None` for an unknown connection.
    fn connection_info(&self, fd: ConnectionId) -> Option<ConnectionStatus>;

    /// Push a payload to a locally-owned connection.
    fn push(&self, fd: ConnectionId, data: String, opcode: Option<u8>, finish: Option<bool>);

    /// Close a locally-owned connection.
    fn disconnect(&self, fd: ConnectionId, code: Option<u16>, reason: Option<String>);

    /// Deliver a pipe payload to another worker. Fire-and-forget: FIFO to a
    /// single worker, no ordering across workers.
    fn send_to_worker(&self, payload: String, worker: WorkerId);

    /// Number of workers in the process group.
    fn worker_count(&self) -> usize;
}

/// The raw connection handle a handshake response is written to.
pub trait RawConnection: Send + Sync {
    /// The fd assigned to this connection by the host.
    fn fd(&self) -> ConnectionId;

    /// A header already staged on this connection's response, if any. An
    /// `upgrade: websocket` staging marks the connection as an active
    /// WebSocket whose response path is owned by the handshake.
    fn staged_header(&self, name: &str) -> Option<String>;

    /// Stage the response status line.
    fn set_status(&self, status: u16);

    /// Stage one response header.
    fn set_header(&self, name: &str, value: &str);

    /// Flush the response, optionally with a body. Returns `false` when the
    /// peer is already gone.
    fn end(&self, body: Option<&str>) -> bool;
}
