//! Core middleware — the terminal application link of the handshake
//! pipeline.
//!
//! `dispatch` resolves a route from this server's route table and attaches
//! it to the request; `handle` asserts the route's handler exists and
//! assembles the 101 response skeleton into the connection's context.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::error;

use wsgate_core::http::{SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_PROTOCOL};
use wsgate_core::{HandshakeError, UpgradeRequest, UpgradeResponse};

use crate::context::{ContextScope, HANDLER_KEY, RESPONSE_KEY};
use crate::handler::WsHandler;
use crate::pipeline::{Middleware, Next};
use crate::security::SecurityValidator;

/// Request attribute holding the bound handler name.
pub const HANDLER_ATTRIBUTE: &str = "class";
/// Request attribute holding the resolved route.
pub const ROUTE_ATTRIBUTE: &str = "route";

/// One routable upgrade target.
#[derive(Clone)]
pub struct Route {
    /// Exact request path this route serves.
    pub path: String,
    /// Name the handler is registered under.
    pub handler_name: String,
    /// The handler bound to connections upgraded through this route.
    pub handler: Arc<dyn WsHandler>,
}

/// Route table for one named server.
pub struct RouteTable {
    server_name: String,
    routes: HashMap<String, Route>,
}

impl RouteTable {
    /// Create an empty table for `server_name`.
    #[must_use]
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            routes: HashMap::new(),
        }
    }

    /// Name of the server this table belongs to.
    #[must_use]
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Register a route, replacing any existing route on the same path.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        handler_name: impl Into<String>,
        handler: Arc<dyn WsHandler>,
    ) {
        let path = path.into();
        let _ = self.routes.insert(
            path.clone(),
            Route {
                path,
                handler_name: handler_name.into(),
                handler,
            },
        );
    }

    /// Resolve a route by exact path match.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    /// Look up a handler by registered name.
    #[must_use]
    pub fn handler(&self, name: &str) -> Option<Arc<dyn WsHandler>> {
        self.routes
            .values()
            .find(|route| route.handler_name == name)
            .map(|route| Arc::clone(&route.handler))
    }
}

/// Terminal link of the handshake pipeline.
pub struct CoreMiddleware {
    routes: Option<Arc<RouteTable>>,
    security: Arc<dyn SecurityValidator>,
    scope: ContextScope,
    echo_subprotocol: bool,
}

impl CoreMiddleware {
    /// Create the middleware for one handshake.
    #[must_use]
    pub fn new(
        routes: Option<Arc<RouteTable>>,
        security: Arc<dyn SecurityValidator>,
        scope: ContextScope,
        echo_subprotocol: bool,
    ) -> Self {
        Self {
            routes,
            security,
            scope,
            echo_subprotocol,
        }
    }

    /// Resolve a route for the request and attach it.
    ///
    /// Fails with NotFound when this server has no route table or no route
    /// matches the request path.
    pub fn dispatch(&self, mut request: UpgradeRequest) -> Result<UpgradeRequest, HandshakeError> {
        let route = self
            .routes
            .as_ref()
            .and_then(|table| table.matches(&request.path))
            .ok_or_else(|| HandshakeError::RouteNotFound {
                path: request.path.clone(),
            })?;
        request.set_attribute(
            ROUTE_ATTRIBUTE,
            json!({ "path": route.path, "handler": route.handler_name }),
        );
        Ok(request)
    }

    fn route_handler_name(&self, request: &UpgradeRequest) -> Result<String, HandshakeError> {
        let name = request
            .attribute(ROUTE_ATTRIBUTE)
            .and_then(|route| route.get("handler"))
            .and_then(|name| name.as_str())
            .ok_or(HandshakeError::HandlerMissing)?;
        // The route must point at a handler the table still knows.
        if self
            .routes
            .as_ref()
            .and_then(|table| table.handler(name))
            .is_none()
        {
            return Err(HandshakeError::HandlerMissing);
        }
        Ok(name.to_owned())
    }
}

#[async_trait]
impl Middleware for CoreMiddleware {
    /// Assemble the 101 response skeleton and record the bound handler.
    async fn handle(
        &self,
        mut request: UpgradeRequest,
        next: Next<'_>,
    ) -> Result<UpgradeResponse, HandshakeError> {
        let handler_name = self.route_handler_name(&request)?;

        let mut response: UpgradeResponse = self
            .scope
            .get(RESPONSE_KEY)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        response.status = 101;
        let key = request.header(SEC_WEBSOCKET_KEY).unwrap_or_default();
        for (name, value) in self.security.handshake_headers(key) {
            response.set_header(&name, value);
        }
        if self.echo_subprotocol {
            if let Some(protocol) = request.header(SEC_WEBSOCKET_PROTOCOL) {
                let protocol = protocol.to_owned();
                response.set_header(SEC_WEBSOCKET_PROTOCOL, protocol);
            }
        }
        match serde_json::to_value(&response) {
            Ok(value) => {
                let _ = self.scope.set(RESPONSE_KEY, value);
            }
            Err(err) => error!(error = %err, "failed to store assembled response"),
        }

        request.set_attribute(HANDLER_ATTRIBUTE, json!(handler_name));
        let _ = self.scope.set(HANDLER_KEY, json!(handler_name));

        next.run(request).await
    }
}
