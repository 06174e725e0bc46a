//! Gateway configuration.

use serde::{Deserialize, Serialize};

/// Configuration for one gateway server instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Name of this server, keys its route table (default `"websocket"`).
    pub server_name: String,
    /// Status emitted when the error renderer itself fails.
    pub fallback_status: u16,
    /// Echo the client's `sec-websocket-protocol` header on the 101 response.
    pub echo_subprotocol: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_name: "websocket".into(),
            fallback_status: 400,
            echo_subprotocol: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_name() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.server_name, "websocket");
    }

    #[test]
    fn default_fallback_status() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.fallback_status, 400);
    }

    #[test]
    fn default_echoes_subprotocol() {
        assert!(GatewayConfig::default().echo_subprotocol);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = GatewayConfig {
            server_name: "ws-internal".into(),
            fallback_status: 500,
            echo_subprotocol: false,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: GatewayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server_name, cfg.server_name);
        assert_eq!(back.fallback_status, cfg.fallback_status);
        assert_eq!(back.echo_subprotocol, cfg.echo_subprotocol);
    }

    #[test]
    fn deserialize_from_json_string() {
        let json = r#"{"server_name":"chat","fallback_status":400,"echo_subprotocol":true}"#;
        let cfg: GatewayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.server_name, "chat");
    }
}
