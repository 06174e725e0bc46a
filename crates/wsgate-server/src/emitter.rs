//! Response emission boundary.
//!
//! Writes an assembled [`UpgradeResponse`] back through the raw connection.
//! A connection whose staged `Upgrade` header marks it an active WebSocket
//! is skipped: the 101 response is written separately by the handshake path,
//! and nothing else may touch the socket afterwards.

use tracing::debug;

use wsgate_core::UpgradeResponse;
use wsgate_core::http::UPGRADE;

use crate::socket::RawConnection;

/// Writes responses to raw connections.
pub struct ResponseEmitter;

impl ResponseEmitter {
    /// Emit `response` over `connection`.
    ///
    /// Best-effort: the peer may already be gone, so write failures are
    /// logged and swallowed.
    pub fn emit(&self, response: &UpgradeResponse, connection: &dyn RawConnection, with_content: bool) {
        let upgraded = connection
            .staged_header(UPGRADE)
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
        if upgraded {
            return;
        }

        for (name, value) in response.headers() {
            connection.set_header(name, value);
        }
        connection.set_status(response.status);
        let body = with_content.then_some(response.body.as_str());
        if !connection.end(body) {
            debug!(fd = %connection.fd(), "peer gone before response emission");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use wsgate_core::ConnectionId;

    #[derive(Default)]
    struct FakeConnection {
        upgrade: Option<String>,
        status: Mutex<Option<u16>>,
        headers: Mutex<Vec<(String, String)>>,
        body: Mutex<Option<Option<String>>>,
        peer_gone: bool,
    }

    impl RawConnection for FakeConnection {
        fn fd(&self) -> ConnectionId {
            ConnectionId::new(1)
        }

        fn staged_header(&self, name: &str) -> Option<String> {
            (name == UPGRADE).then(|| self.upgrade.clone()).flatten()
        }

        fn set_status(&self, status: u16) {
            *self.status.lock() = Some(status);
        }

        fn set_header(&self, name: &str, value: &str) {
            self.headers.lock().push((name.to_owned(), value.to_owned()));
        }

        fn end(&self, body: Option<&str>) -> bool {
            *self.body.lock() = Some(body.map(ToOwned::to_owned));
            !self.peer_gone
        }
    }

    fn response() -> UpgradeResponse {
        let mut resp = UpgradeResponse::with_status(400);
        resp.body = "handshake failed".into();
        resp.set_header("content-type", "text/plain");
        resp
    }

    #[test]
    fn emits_status_headers_and_body() {
        let conn = FakeConnection::default();
        ResponseEmitter.emit(&response(), &conn, true);
        assert_eq!(*conn.status.lock(), Some(400));
        assert_eq!(
            conn.headers.lock().as_slice(),
            &[("content-type".to_owned(), "text/plain".to_owned())]
        );
        assert_eq!(
            conn.body.lock().clone(),
            Some(Some("handshake failed".to_owned()))
        );
    }

    #[test]
    fn without_content_ends_with_empty_body() {
        let conn = FakeConnection::default();
        ResponseEmitter.emit(&response(), &conn, false);
        assert_eq!(conn.body.lock().clone(), Some(None));
    }

    #[test]
    fn skips_upgraded_websocket_connection() {
        let conn = FakeConnection {
            upgrade: Some("websocket".into()),
            ..FakeConnection::default()
        };
        ResponseEmitter.emit(&response(), &conn, true);
        assert!(conn.status.lock().is_none());
        assert!(conn.body.lock().is_none());
    }

    #[test]
    fn upgrade_header_match_is_case_insensitive() {
        let conn = FakeConnection {
            upgrade: Some("WebSocket".into()),
            ..FakeConnection::default()
        };
        ResponseEmitter.emit(&response(), &conn, true);
        assert!(conn.status.lock().is_none());
    }

    #[test]
    fn non_websocket_upgrade_header_still_emits() {
        let conn = FakeConnection {
            upgrade: Some("h2c".into()),
            ..FakeConnection::default()
        };
        ResponseEmitter.emit(&response(), &conn, true);
        assert_eq!(*conn.status.lock(), Some(400));
    }

    #[test]
    fn peer_gone_is_swallowed() {
        let conn = FakeConnection {
            peer_gone: true,
            ..FakeConnection::default()
        };
        // Must not panic or propagate.
        ResponseEmitter.emit(&response(), &conn, true);
    }
}
