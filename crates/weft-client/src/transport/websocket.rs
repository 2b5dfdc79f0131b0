//! WebSocket connector over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;
use weft_core::SyncError;
use weft_core::errors::Result;

use super::{Connector, Duplex};

/// Connects to `ws://` / `wss://` endpoints.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, endpoint: &str) -> Result<Duplex> {
        check_scheme(endpoint)?;
        let (ws, response) = connect_async(endpoint)
            .await
            .map_err(|e| classify(endpoint, e))?;
        debug!(endpoint, status = %response.status(), "websocket handshake complete");

        let (sink, stream) = ws.split();
        let sink = sink
            .sink_map_err(|e| SyncError::ConnectionLost(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, SyncError>(Message::Text(text.into()))));
        let stream = stream.filter_map(|msg| future::ready(inbound_frame(msg)));

        Ok(Duplex::new(sink, stream))
    }
}

fn check_scheme(endpoint: &str) -> Result<()> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        Ok(())
    } else {
        Err(SyncError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: "expected a ws:// or wss:// URL".into(),
        })
    }
}

/// Map a tungstenite message to a text frame. Control frames are dropped;
/// tungstenite answers pings itself.
fn inbound_frame(msg: std::result::Result<Message, WsError>) -> Option<Result<String>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
        Ok(Message::Binary(bytes)) => Some(
            String::from_utf8(bytes.to_vec())
                .map_err(|e| SyncError::MalformedMessage(format!("binary frame is not UTF-8: {e}"))),
        ),
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_)) => None,
        Err(e) => Some(Err(SyncError::ConnectionLost(e.to_string()))),
    }
}

fn classify(endpoint: &str, err: WsError) -> SyncError {
    match err {
        WsError::Url(e) => SyncError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        },
        WsError::Io(e) => SyncError::Connectivity(e.to_string()),
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            SyncError::Connectivity("connection closed during handshake".into())
        }
        WsError::Http(response) => {
            SyncError::Transport(format!("handshake rejected with status {}", response.status()))
        }
        other => SyncError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn rejects_non_websocket_scheme() {
        let err = check_scheme("https://example.com").unwrap_err();
        assert_matches!(err, SyncError::InvalidEndpoint { .. });
        assert!(err.is_fatal());
        check_scheme("wss://example.com/socket").unwrap();
    }

    #[test]
    fn io_errors_are_connectivity() {
        let err = classify(
            "ws://127.0.0.1:1",
            WsError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused")),
        );
        assert!(err.is_connectivity());
    }

    #[test]
    fn text_and_binary_frames_pass_through() {
        assert_eq!(
            inbound_frame(Ok(Message::Text("{}".into()))),
            Some(Ok("{}".to_string()))
        );
        assert_eq!(
            inbound_frame(Ok(Message::Binary(b"[1]".to_vec().into()))),
            Some(Ok("[1]".to_string()))
        );
        assert_eq!(inbound_frame(Ok(Message::Ping(Vec::new().into()))), None);
    }

    #[test]
    fn invalid_utf8_binary_is_malformed() {
        let frame = inbound_frame(Ok(Message::Binary(vec![0xff, 0xfe].into())));
        assert_matches!(frame, Some(Err(SyncError::MalformedMessage(_))));
    }

    #[tokio::test]
    async fn unreachable_host_is_connectivity() {
        // Port 1 on loopback is reserved and refuses connections.
        let result = WebSocketConnector.connect("ws://127.0.0.1:1/socket").await;
        let Err(err) = result else {
            panic!("connect should fail");
        };
        assert!(err.is_connectivity(), "unexpected error: {err:?}");
    }
}
