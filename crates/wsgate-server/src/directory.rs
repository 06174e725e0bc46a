//! Directory mapping a connection fd to its bound handler.
//!
//! The coordinator consumes this only through get/set/del. An entry is
//! created on successful handshake (only then is the connection eligible
//! for messages) and deleted on close or handshake failure; deletion is
//! idempotent.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use wsgate_core::ConnectionId;

use crate::handler::WsHandler;

/// One bound connection: fd plus handler descriptor.
#[derive(Clone)]
pub struct ConnectionRecord {
    /// The bound connection.
    pub fd: ConnectionId,
    /// Name the route table knows the handler by.
    pub handler_name: String,
    /// The handler itself.
    pub handler: Arc<dyn WsHandler>,
}

/// fd → handler directory contract.
pub trait FdDirectory: Send + Sync {
    /// Bind a record under its fd, replacing any previous binding.
    fn set(&self, record: ConnectionRecord);
    /// Fetch the record bound to `fd`.
    fn get(&self, fd: ConnectionId) -> Option<ConnectionRecord>;
    /// Remove the binding for `fd`. No-op when absent.
    fn del(&self, fd: ConnectionId);
}

/// Process-local in-memory directory.
pub struct InMemoryFdDirectory {
    records: RwLock<HashMap<ConnectionId, ConnectionRecord>>,
}

impl InMemoryFdDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of bound connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no connection is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for InMemoryFdDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl FdDirectory for InMemoryFdDirectory {
    fn set(&self, record: ConnectionRecord) {
        let _ = self.records.write().insert(record.fd, record);
    }

    fn get(&self, fd: ConnectionId) -> Option<ConnectionRecord> {
        self.records.read().get(&fd).cloned()
    }

    fn del(&self, fd: ConnectionId) {
        let _ = self.records.write().remove(&fd);
    }
}
