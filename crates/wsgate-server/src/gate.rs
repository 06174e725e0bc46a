//! Worker startup gate.
//!
//! Handshake tasks can be spawned before the worker finishes booting; they
//! suspend on the gate and resume once the worker signals readiness. The
//! gate latches: signalling is one-shot per worker and idempotent, and
//! waiters arriving after the signal pass straight through.

use tokio::sync::watch;

/// One-shot readiness latch, one per worker.
pub struct StartupGate {
    tx: watch::Sender<bool>,
}

impl StartupGate {
    /// Create a gate in the not-ready state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Signal boot-complete. Idempotent.
    pub fn ready(&self) {
        let _ = self.tx.send_replace(true);
    }

    /// Whether the worker has signalled boot-complete.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Suspend until the worker signals boot-complete.
    pub async fn until_ready(&self) {
        let mut rx = self.tx.subscribe();
        // The gate owns the sender, so wait_for cannot observe a closed
        // channel while self is alive.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for StartupGate {
    fn default() -> Self {
        Self::new()
    }
}
