//! Transport abstraction for stake room connections.
//!
//! A [`Transport`] is one open, bidirectional text channel to a stake room.
//! Every frame is a single JSON document, so implementations handle framing
//! internally (WebSocket frames, length-prefixed TCP, in-process channels).
//!
//! Because the client reconnects on its own and moves between rooms, it does
//! not take a transport directly. It takes a [`Connector`] that opens a fresh
//! transport for a given stake whenever one is needed.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use stake_bingo_client::error::BingoError;
//! use stake_bingo_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), BingoError> {
//!         // Send the JSON text frame
//!         # let _ = message;
//!         Ok(())
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, BingoError>> {
//!         // Next JSON text frame, or None once the room closed the link
//!         None
//!     }
//!
//!     async fn close(&mut self) -> Result<(), BingoError> {
//!         Ok(())
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&mut self, stake: u32) -> Result<MyTransport, BingoError> {
//!         # let _ = stake;
//!         Ok(MyTransport {})
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::BingoError;

/// A bidirectional text frame channel to one stake room.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the session loop
/// polls it inside `tokio::select!`. Cancelling a pending `recv` and calling
/// it again must not lose a frame. Channel-based implementations are
/// naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::TransportSend`] if the frame could not be sent.
    async fn send(&mut self, message: String) -> Result<(), BingoError>;

    /// Receive the next JSON text frame.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame
    /// - `Some(Err(e))`: the link failed
    /// - `None`: the room closed the link cleanly
    async fn recv(&mut self) -> Option<Result<String, BingoError>>;

    /// Close the link. Must release resources even if the close handshake fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful close fails.
    async fn close(&mut self) -> Result<(), BingoError>;
}

/// Opens transports to stake rooms.
///
/// Called once per join and once per reconnection attempt. The session loop
/// applies its own connect timeout around [`connect`](Connector::connect).
#[async_trait]
pub trait Connector: Send + 'static {
    type Transport: Transport;

    /// Open a link to the room for `stake`.
    ///
    /// # Errors
    ///
    /// Returns an error if the room could not be reached.
    async fn connect(&mut self, stake: u32) -> Result<Self::Transport, BingoError>;
}
