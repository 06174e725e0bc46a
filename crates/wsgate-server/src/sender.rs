//! Push/disconnect against a connection regardless of owning worker.
//!
//! `push` and `disconnect` first try the local worker; when the connection
//! is not active here, the operation fans out blind as a
//! [`SenderProxyMessage`] to every other worker. Each receiver re-runs
//! [`check`](Sender::check) — at most one owns the fd and acts, the rest
//! no-op. Operating on an fd active nowhere resolves silently: by the time
//! a remote worker acts, ownership information may already be stale, so
//! "not found" and "stale ownership" deliberately look the same.

use std::sync::Arc;

use metrics::counter;
use parking_lot::Mutex;
use tracing::debug;

use wsgate_core::{ConnectionId, WorkerId};

use crate::pipe::SenderProxyMessage;
use crate::socket::{ConnectionStatus, SocketServer};

/// Cross-worker push/disconnect dispatcher.
pub struct Sender {
    server: Arc<dyn SocketServer>,
    worker_id: Mutex<Option<WorkerId>>,
}

impl Sender {
    /// Create a sender over the host server.
    #[must_use]
    pub fn new(server: Arc<dyn SocketServer>) -> Self {
        Self {
            server,
            worker_id: Mutex::new(None),
        }
    }

    /// Bind the worker index, signalled at worker boot.
    pub fn set_worker_id(&self, worker: WorkerId) {
        *self.worker_id.lock() = Some(worker);
    }

    /// The bound worker index, if boot has signalled it.
    #[must_use]
    pub fn worker_id(&self) -> Option<WorkerId> {
        *self.worker_id.lock()
    }

    /// Push a payload to `fd`, wherever it lives.
    pub fn push(&self, fd: ConnectionId, data: impl Into<String>, opcode: Option<u8>, finish: Option<bool>) {
        self.dispatch(&SenderProxyMessage::Push {
            fd,
            data: data.into(),
            opcode,
            finish,
        });
    }

    /// Disconnect `fd`, wherever it lives.
    pub fn disconnect(&self, fd: ConnectionId, code: Option<u16>, reason: Option<String>) {
        self.dispatch(&SenderProxyMessage::Disconnect { fd, code, reason });
    }

    /// Whether `fd` is an established, active WebSocket on this worker.
    ///
    /// Merely-accepted and closed connections both fail the check.
    #[must_use]
    pub fn check(&self, fd: ConnectionId) -> bool {
        self.server.connection_info(fd) == Some(ConnectionStatus::ActiveWebSocket)
    }

    /// Run the operation against the local server when this worker owns the
    /// connection.
    ///
    /// `false` means "not owned or not active here" — not an error.
    pub fn proxy(&self, message: &SenderProxyMessage) -> bool {
        if !self.check(message.fd()) {
            return false;
        }
        match message {
            SenderProxyMessage::Push {
                fd,
                data,
                opcode,
                finish,
            } => self.server.push(*fd, data.clone(), *opcode, *finish),
            SenderProxyMessage::Disconnect { fd, code, reason } => {
                self.server.disconnect(*fd, *code, reason.clone());
            }
        }
        counter!("sender_local_ops_total", "op" => message.operation()).increment(1);
        debug!(worker = ?self.worker_id(), fd = %message.fd(), op = message.operation(), "sent to local connection");
        true
    }

    fn dispatch(&self, message: &SenderProxyMessage) {
        if !self.proxy(message) {
            self.send_pipe_message(message);
        }
    }

    /// Fan the envelope out to every worker except this one.
    fn send_pipe_message(&self, message: &SenderProxyMessage) {
        let payload = message.encode();
        let current = self.worker_id();
        for index in 0..self.server.worker_count() {
            let worker = WorkerId::new(index);
            if Some(worker) == current {
                continue;
            }
            self.server.send_to_worker(payload.clone(), worker);
            counter!("sender_pipe_fanout_total", "op" => message.operation()).increment(1);
            debug!(target_worker = %worker, op = message.operation(), "let worker try the operation");
        }
    }
}
