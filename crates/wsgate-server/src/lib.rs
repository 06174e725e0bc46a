//! # wsgate-server
//!
//! Worker-side runtime of the wsgate WebSocket gateway.
//!
//! - Handshake coordination: security validation, route dispatch, middleware
//!   pipeline, 101 assembly, handler binding
//! - Per-connection context scopes with explicit fd binding
//! - Cross-worker push/disconnect via blind pipe fan-out
//! - Deferred `on_open`/cleanup tasks and a worker startup gate

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod defer;
pub mod directory;
pub mod emitter;
pub mod gate;
pub mod handler;
pub mod handshake;
pub mod logging;
pub mod middleware;
pub mod pipe;
pub mod pipeline;
pub mod safe_call;
pub mod security;
pub mod sender;
pub mod socket;

pub use config::GatewayConfig;
pub use context::{ConnectionContextStore, ContextScope};
pub use directory::{ConnectionRecord, FdDirectory, InMemoryFdDirectory};
pub use gate::StartupGate;
pub use handler::{HandlerResult, WsHandler};
pub use handshake::{DefaultErrorRenderer, ErrorRenderer, HandshakeCoordinator};
pub use middleware::{CoreMiddleware, Route, RouteTable};
pub use pipe::{PipeMessageListener, SenderProxyMessage};
pub use sender::Sender;
pub use socket::{ConnectionStatus, Frame, RawConnection, SocketServer};
