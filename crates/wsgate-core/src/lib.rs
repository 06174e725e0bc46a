//! # wsgate-core
//!
//! Foundation types for the wsgate WebSocket gateway.
//!
//! - Integer ID newtypes for connections and workers
//! - Error hierarchy for handshake and sender failures
//! - Internal upgrade request/response representation
//! - Well-known header and context-key constants

#![deny(unsafe_code)]

pub mod errors;
pub mod http;
pub mod ids;

pub use errors::{HandshakeError, SenderError};
pub use http::{UpgradeRequest, UpgradeResponse};
pub use ids::{ConnectionId, WorkerId};
