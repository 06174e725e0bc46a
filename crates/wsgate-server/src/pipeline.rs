//! Generic middleware pipeline.
//!
//! `Pipeline::send(request).through(links).then(terminal)` runs the chain
//! sequentially; the terminal producer reads the response assembled along
//! the way (by convention, out of the connection's context scope). Any link
//! may short-circuit with a [`HandshakeError`].

use std::sync::Arc;

use async_trait::async_trait;

use wsgate_core::{HandshakeError, UpgradeRequest, UpgradeResponse};

/// Terminal producer invoked once the chain is exhausted.
pub type Terminal<'a> =
    &'a (dyn Fn(&UpgradeRequest) -> Result<UpgradeResponse, HandshakeError> + Send + Sync);

/// One link of the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request and delegate to the rest of the chain.
    async fn handle(
        &self,
        request: UpgradeRequest,
        next: Next<'_>,
    ) -> Result<UpgradeResponse, HandshakeError>;
}

/// The remainder of the chain, handed to each link.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    terminal: Terminal<'a>,
}

impl Next<'_> {
    /// Run the remaining links, then the terminal producer.
    pub async fn run(self, request: UpgradeRequest) -> Result<UpgradeResponse, HandshakeError> {
        match self.chain.split_first() {
            Some((link, rest)) => {
                link.handle(
                    request,
                    Next {
                        chain: rest,
                        terminal: self.terminal,
                    },
                )
                .await
            }
            None => (self.terminal)(&request),
        }
    }
}

/// Fluent entry point for one pipeline run.
pub struct Pipeline {
    request: UpgradeRequest,
    chain: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Start a pipeline carrying `request`.
    #[must_use]
    pub fn send(request: UpgradeRequest) -> Self {
        Self {
            request,
            chain: Vec::new(),
        }
    }

    /// Set the middleware chain.
    #[must_use]
    pub fn through(mut self, middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        self.chain = middlewares;
        self
    }

    /// Run the chain, finishing with `terminal`.
    pub async fn then(
        self,
        terminal: impl Fn(&UpgradeRequest) -> Result<UpgradeResponse, HandshakeError> + Send + Sync,
    ) -> Result<UpgradeResponse, HandshakeError> {
        Next {
            chain: &self.chain,
            terminal: &terminal,
        }
        .run(self.request)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Appends its tag to a request attribute, recording execution order.
    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(
            &self,
            mut request: UpgradeRequest,
            next: Next<'_>,
        ) -> Result<UpgradeResponse, HandshakeError> {
            let trace = request
                .attribute("trace")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned();
            request.set_attribute("trace", json!(format!("{trace}{}", self.0)));
            next.run(request).await
        }
    }

    struct Abort;

    #[async_trait]
    impl Middleware for Abort {
        async fn handle(
            &self,
            _request: UpgradeRequest,
            _next: Next<'_>,
        ) -> Result<UpgradeResponse, HandshakeError> {
            Err(HandshakeError::HandlerMissing)
        }
    }

    #[tokio::test]
    async fn empty_chain_runs_terminal() {
        let resp = Pipeline::send(UpgradeRequest::new("/ws"))
            .then(|_| Ok(UpgradeResponse::with_status(101)))
            .await
            .unwrap();
        assert_eq!(resp.status, 101);
    }

    #[tokio::test]
    async fn links_run_in_order_before_terminal() {
        let resp = Pipeline::send(UpgradeRequest::new("/ws"))
            .through(vec![Arc::new(Tag("a")), Arc::new(Tag("b")), Arc::new(Tag("c"))])
            .then(|req| {
                assert_eq!(req.attribute("trace"), Some(&json!("abc")));
                Ok(UpgradeResponse::with_status(101))
            })
            .await
            .unwrap();
        assert_eq!(resp.status, 101);
    }

    #[tokio::test]
    async fn aborting_link_short_circuits() {
        let result = Pipeline::send(UpgradeRequest::new("/ws"))
            .through(vec![Arc::new(Tag("a")), Arc::new(Abort), Arc::new(Tag("never"))])
            .then(|_| panic!("terminal must not run"))
            .await;
        assert!(matches!(result, Err(HandshakeError::HandlerMissing)));
    }

    #[tokio::test]
    async fn terminal_error_propagates() {
        let result = Pipeline::send(UpgradeRequest::new("/missing"))
            .then(|req| {
                Err(HandshakeError::RouteNotFound {
                    path: req.path.clone(),
                })
            })
            .await;
        assert!(matches!(result, Err(HandshakeError::RouteNotFound { path }) if path == "/missing"));
    }
}
