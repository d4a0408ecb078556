//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries room frames over one WebSocket connection.
//! [`WebSocketConnector`] opens such a connection to the room of a given
//! stake, building the URL from the configured server address and token.
//! Both `ws://` and `wss://` are supported; TLS is handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), stake_bingo_client::BingoError> {
//! use stake_bingo_client::{Transport, WebSocketTransport};
//!
//! let mut transport =
//!     WebSocketTransport::connect("ws://localhost:8000/bingo/ws?token=abc&stake=10").await?;
//!
//! if let Some(Ok(frame)) = transport.recv().await {
//!     println!("room said: {frame}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::client::BingoConfig;
use crate::error::BingoError;
use crate::transport::{Connector, Transport};

/// Type alias for the underlying WebSocket stream.
///
/// Public so callers can wrap a stream they built themselves via
/// [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by a WebSocket connection.
///
/// For custom TLS, proxies or headers, build the stream yourself and use
/// [`WebSocketTransport::from_stream`].
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe. Dropping its future before it
/// completes does not lose a frame.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::Io`] if the URL is invalid or the connection
    /// cannot be established. An underlying I/O error keeps its
    /// [`ErrorKind`](std::io::ErrorKind); anything else maps to
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, BingoError> {
        tracing::debug!(url = %redact_token(url), "connecting to room");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            BingoError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %redact_token(url), "room connection established");

        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established WebSocket stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Like [`connect`](Self::connect), but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::Timeout`] if the deadline elapses, or any error
    /// [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self, BingoError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| BingoError::Timeout)?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), BingoError> {
        if self.closed {
            return Err(BingoError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| BingoError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, BingoError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(BingoError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "room sent close frame");
                    return None;
                }
                // tungstenite queues the pong itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(_) => {
                    tracing::warn!("unexpected binary frame from room, skipping");
                }
                Message::Frame(_) => {
                    tracing::debug!("raw frame from room, skipping");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), BingoError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| BingoError::TransportSend(e.to_string()))
    }
}

/// Opens [`WebSocketTransport`]s to stake rooms on one server.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    config: BingoConfig,
}

impl WebSocketConnector {
    /// Connector for the server and token in `config`.
    pub fn new(config: &BingoConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// URL of the room for `stake`.
    pub fn room_url(&self, stake: u32) -> String {
        self.config.room_url(stake)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&mut self, stake: u32) -> Result<WebSocketTransport, BingoError> {
        WebSocketTransport::connect(&self.room_url(stake)).await
    }
}

/// Strip the token from a room URL before it is logged.
fn redact_token(url: &str) -> String {
    match url.split_once('?') {
        Some((base, query)) => {
            let query: Vec<&str> = query
                .split('&')
                .map(|pair| {
                    if pair.starts_with("token=") {
                        "token=***"
                    } else {
                        pair
                    }
                })
                .collect();
            format!("{base}?{}", query.join("&"))
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
        assert_send::<WebSocketConnector>();
    }

    #[test]
    fn token_is_redacted() {
        assert_eq!(
            redact_token("wss://h/bingo/ws?token=secret&stake=10"),
            "wss://h/bingo/ws?token=***&stake=10"
        );
        assert_eq!(redact_token("ws://h/x"), "ws://h/x");
    }

    #[test]
    fn connector_builds_room_url_from_config() {
        let config = BingoConfig::new("https://bingo.example.com/").with_token("t0k");
        let connector = WebSocketConnector::new(&config);
        assert_eq!(
            connector.room_url(20),
            "wss://bingo.example.com/bingo/ws?token=t0k&stake=20"
        );
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url")
            .await
            .unwrap_err();
        assert!(matches!(err, BingoError::Io(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1")
            .await
            .unwrap_err();
        assert!(matches!(err, BingoError::Io(_)));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // Non-routable address.
        let err = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:1",
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BingoError::Timeout));
    }

    // ── Mock room ────────────────────────────────────────────────────

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection. Returns the bound address.
    async fn start_mock_room<F, Fut>(handler: F) -> std::net::SocketAddr
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>, String) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut path = String::new();
            let ws = tokio_tungstenite::accept_hdr_async(
                tcp,
                |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    path = req.uri().to_string();
                    Ok(resp)
                },
            )
            .await
            .unwrap();
            handler(ws, path).await;
        });

        addr
    }

    #[tokio::test]
    async fn recv_skips_control_and_binary_frames() {
        let addr = start_mock_room(|mut ws, _| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Ping(vec![1].into())).await.unwrap();
            ws.send(Message::Text(r#"{"type":"winner_announcement"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&format!("ws://{addr}"))
            .await
            .unwrap();
        let frame = transport.recv().await.unwrap().unwrap();
        assert_eq!(frame, r#"{"type":"winner_announcement"}"#);
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn connector_dials_the_stake_room() {
        let addr = start_mock_room(|mut ws, path| async move {
            ws.send(Message::Text(path.into())).await.unwrap();
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let config = BingoConfig::new(format!("http://{addr}")).with_token("abc");
        let mut connector = WebSocketConnector::new(&config);
        let mut transport = connector.connect(50).await.unwrap();

        let path = transport.recv().await.unwrap().unwrap();
        assert_eq!(path, "/bingo/ws?token=abc&stake=50");

        transport
            .send(r#"{"type":"bingo"}"#.to_string())
            .await
            .unwrap();
        let echoed = transport.recv().await.unwrap().unwrap();
        assert_eq!(echoed, r#"{"type":"bingo"}"#);
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let addr = start_mock_room(|mut ws, _| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&format!("ws://{addr}"))
            .await
            .unwrap();
        transport.close().await.unwrap();
        // Second close is a no-op.
        transport.close().await.unwrap();

        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, BingoError::TransportClosed));
    }
}
