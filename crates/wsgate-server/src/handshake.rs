//! Handshake coordination and connection lifecycle.
//!
//! [`HandshakeCoordinator`] owns the per-connection event flow: upgrade
//! negotiation through the middleware pipeline, handler binding, deferred
//! `on_open`, inbound frame routing, and close cleanup. Every entry point
//! rebinds a [`ContextScope`] for the event's fd before doing anything else;
//! no state flows through ambient globals.
//!
//! Failure discipline differs by phase. A failed handshake is client-visible:
//! the error is rendered (through [`safe_call`], so a faulting renderer still
//! yields a response) and emitted, and any partial state for the fd is torn
//! down. After the upgrade there is no response channel left, so message and
//! close faults are caught and logged — one misbehaving connection never
//! takes the worker down.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error, instrument, warn};

use wsgate_core::http::SEC_WEBSOCKET_KEY;
use wsgate_core::{ConnectionId, HandshakeError, UpgradeRequest, UpgradeResponse};

use crate::config::GatewayConfig;
use crate::context::{ConnectionContextStore, ContextScope, HANDLER_KEY, REQUEST_KEY, RESPONSE_KEY};
use crate::defer::DeferScheduler;
use crate::directory::{ConnectionRecord, FdDirectory};
use crate::emitter::ResponseEmitter;
use crate::gate::StartupGate;
use crate::handler::WsHandler;
use crate::middleware::{CoreMiddleware, RouteTable};
use crate::pipeline::{Middleware, Pipeline};
use crate::safe_call::safe_call;
use crate::security::SecurityValidator;
use crate::socket::{Frame, RawConnection};

/// Renders a failed handshake into the response sent to the client.
///
/// The renderer itself may fault; the coordinator falls back to a bare
/// status response when it does.
pub trait ErrorRenderer: Send + Sync {
    /// Render `error` for the client. `request` is the original upgrade
    /// request when it survived far enough to be recorded.
    fn render(
        &self,
        request: Option<&UpgradeRequest>,
        error: &HandshakeError,
    ) -> Result<UpgradeResponse, Box<dyn std::error::Error + Send + Sync>>;
}

/// Renderer producing a plain-text body with the error's own status.
pub struct DefaultErrorRenderer;

impl ErrorRenderer for DefaultErrorRenderer {
    fn render(
        &self,
        _request: Option<&UpgradeRequest>,
        error: &HandshakeError,
    ) -> Result<UpgradeResponse, Box<dyn std::error::Error + Send + Sync>> {
        let mut response = UpgradeResponse::with_status(error.status());
        response.body = error.to_string();
        Ok(response)
    }
}

/// Drives the connection lifecycle for one gateway server.
pub struct HandshakeCoordinator {
    /// Server configuration.
    pub config: GatewayConfig,
    /// Per-connection context store for this worker.
    pub context: Arc<ConnectionContextStore>,
    /// Security key validation and accept-header derivation.
    pub security: Arc<dyn SecurityValidator>,
    /// Route table, absent when no routes were registered for this server.
    pub routes: Option<Arc<RouteTable>>,
    /// Middleware run after the core link on every handshake.
    pub route_middlewares: Vec<Arc<dyn Middleware>>,
    /// fd → handler directory.
    pub directory: Arc<dyn FdDirectory>,
    /// Worker startup gate; handshakes suspend until boot completes.
    pub gate: Arc<StartupGate>,
    /// Follow-up task scheduler.
    pub scheduler: Arc<dyn DeferScheduler>,
    /// Renderer for client-visible handshake failures.
    pub renderer: Arc<dyn ErrorRenderer>,
}

impl HandshakeCoordinator {
    /// Handle one upgrade request end to end.
    ///
    /// Suspends on the startup gate first: the host may deliver handshakes
    /// before the worker finished booting. A response is always emitted,
    /// success or failure.
    #[instrument(skip_all, fields(fd = %connection.fd(), path = %request.path))]
    pub async fn on_handshake(&self, request: UpgradeRequest, connection: &dyn RawConnection) {
        self.gate.until_ready().await;

        let fd = connection.fd();
        let scope = self.context.scope(fd);

        let response = match self.negotiate(&scope, fd, request).await {
            Ok(response) => {
                counter!("ws_handshakes_total").increment(1);
                response
            }
            Err(err) => {
                counter!("ws_handshakes_failed_total", "code" => err.code()).increment(1);
                warn!(%fd, code = err.code(), error = %err, "handshake failed");
                let request: Option<UpgradeRequest> = scope
                    .get(REQUEST_KEY)
                    .and_then(|v| serde_json::from_value(v).ok());
                let fallback = self.config.fallback_status;
                let response = safe_call(
                    || self.renderer.render(request.as_ref(), &err),
                    || UpgradeResponse::with_status(fallback),
                );
                // The fd may be reused by the host; leave nothing behind.
                self.directory.del(fd);
                self.context.release(fd);
                response
            }
        };

        ResponseEmitter.emit(&response, connection, true);
    }

    /// Route one inbound frame to the bound handler.
    ///
    /// A frame for an unbound fd is dropped with a warning: close events and
    /// in-flight frames race legitimately, so this is not a fault. The drop
    /// leaves no trace — no directory entry, no context scope.
    #[instrument(skip_all, fields(fd = %frame.fd))]
    pub async fn on_message(&self, frame: Frame) {
        let fd = frame.fd;
        let _scope = self.context.scope(fd);
        let Some(record) = self.directory.get(fd) else {
            warn!(%fd, "fd does not exist");
            return;
        };
        if !record.handler.handles_messages() {
            warn!(%fd, handler = %record.handler_name, "handler does not accept messages");
            return;
        }
        if let Err(err) = record.handler.on_message(frame).await {
            error!(%fd, handler = %record.handler_name, error = %err, "message handler faulted");
        }
    }

    /// Handle a connection close.
    ///
    /// Cleanup is deferred so it runs even when the close hook faults, and
    /// it runs unconditionally: an fd that failed its handshake still gets
    /// its (empty) state torn down.
    #[instrument(skip_all, fields(fd = %fd))]
    pub async fn on_close(&self, fd: ConnectionId) {
        debug!(%fd, "connection closed");
        let _scope = self.context.scope(fd);
        let record = self.directory.get(fd);

        let store = Arc::clone(&self.context);
        let directory = Arc::clone(&self.directory);
        self.scheduler.defer(Box::pin(async move {
            directory.del(fd);
            store.release(fd);
        }));

        if let Some(record) = record {
            if record.handler.handles_close() {
                if let Err(err) = record.handler.on_close(fd).await {
                    error!(%fd, handler = %record.handler_name, error = %err, "close handler faulted");
                }
            }
        }
    }

    /// Validate, route, and bind one handshake.
    ///
    /// Ordering is load-bearing: the security key is checked before any
    /// route resolution, and the directory entry is written only after the
    /// pipeline produced a response and the handler was re-asserted — a
    /// rejected handshake never becomes eligible for messages.
    async fn negotiate(
        &self,
        scope: &ContextScope,
        fd: ConnectionId,
        request: UpgradeRequest,
    ) -> Result<UpgradeResponse, HandshakeError> {
        self.seed(scope, RESPONSE_KEY, &UpgradeResponse::default());
        self.seed(scope, REQUEST_KEY, &request);

        if self
            .security
            .is_invalid_security_key(request.header(SEC_WEBSOCKET_KEY))
        {
            return Err(HandshakeError::InvalidSecurityKey);
        }
        debug!(%fd, path = %request.path, "starting websocket negotiation");

        let core = Arc::new(CoreMiddleware::new(
            self.routes.clone(),
            Arc::clone(&self.security),
            scope.clone(),
            self.config.echo_subprotocol,
        ));
        let request = core.dispatch(request)?;

        // Core link first, then the registered route middleware.
        let mut chain: Vec<Arc<dyn Middleware>> =
            Vec::with_capacity(self.route_middlewares.len() + 1);
        chain.push(core);
        chain.extend(self.route_middlewares.iter().map(Arc::clone));

        let terminal_scope = scope.clone();
        let response = Pipeline::send(request)
            .through(chain)
            .then(move |_| {
                Ok(terminal_scope
                    .get(RESPONSE_KEY)
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or_default())
            })
            .await?;

        let handler_name = scope
            .get(HANDLER_KEY)
            .and_then(|v| v.as_str().map(ToOwned::to_owned))
            .ok_or(HandshakeError::HandlerMissing)?;
        let handler = self
            .routes
            .as_ref()
            .and_then(|table| table.handler(&handler_name))
            .ok_or(HandshakeError::HandlerMissing)?;

        self.directory.set(ConnectionRecord {
            fd,
            handler_name: handler_name.clone(),
            handler: Arc::clone(&handler),
        });
        debug!(%fd, handler = %handler_name, "connection bound");

        let open_request: UpgradeRequest = scope
            .get(REQUEST_KEY)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        self.defer_on_open(fd, handler, open_request);

        Ok(response)
    }

    /// Schedule the `on_open` hook as a follow-up task capturing the fd.
    fn defer_on_open(&self, fd: ConnectionId, handler: Arc<dyn WsHandler>, request: UpgradeRequest) {
        let store = Arc::clone(&self.context);
        self.scheduler.defer(Box::pin(async move {
            // Fresh task, no inherited scope: rebind explicitly.
            let _scope = store.scope(fd);
            if let Err(err) = handler.on_open(fd, &request).await {
                error!(%fd, error = %err, "open handler faulted");
            }
        }));
    }

    fn seed(&self, scope: &ContextScope, key: &str, value: &impl serde::Serialize) {
        match serde_json::to_value(value) {
            Ok(value) => {
                let _ = scope.set(key, value);
            }
            Err(err) => error!(key, error = %err, "failed to seed context"),
        }
    }
}
