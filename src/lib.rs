//! # Stake Bingo Client
//!
//! Round-synchronization client for stake-partitioned multiplayer number
//! bingo.
//!
//! Each stake has its own room on the server. The client joins one room at a
//! time, reconciles the room's event stream into a single [`RoundView`],
//! drives a local one-second countdown between server deadlines, and
//! pre-checks player intents (number selection, marking, bingo claims)
//! before forwarding them.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any backend
//! - **WebSocket built-in**: the default `transport-websocket` feature provides
//!   `WebSocketTransport` and `WebSocketConnector`
//! - **Self-healing**: automatic reconnection with a fixed backoff; the snapshot
//!   the room sends after reconnecting overrides local guesses
//! - **Event-driven**: typed [`BingoEvent`]s on a channel plus the latest
//!   [`RoundView`] on a watch channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), stake_bingo_client::BingoError> {
//! use stake_bingo_client::{BingoClient, BingoConfig, BingoEvent, WebSocketConnector};
//!
//! let config = BingoConfig::new("https://bingo.example.com").with_token("session-token");
//! let (mut client, mut events) = BingoClient::start(WebSocketConnector::new(&config), config);
//! client.join_stake(10)?;
//!
//! while let Some(event) = events.recv().await {
//!     if let BingoEvent::RoundUpdated(view) = event {
//!         println!("{:?}: {}s left", view.phase, view.seconds_remaining);
//!     }
//! }
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod card;
pub mod client;
pub mod countdown;
pub mod error;
pub mod event;
pub mod notice;
pub mod protocol;
pub mod round;
pub mod transport;
pub mod transports;
pub mod validator;

// Re-export primary types for ergonomic imports.
pub use card::{Card, CellPos};
pub use client::{BingoClient, BingoConfig};
pub use error::{BingoError, IntentRejection};
pub use event::{BingoEvent, ConnectionStatus, IntentKind};
pub use notice::{Notice, NoticeKind};
pub use protocol::{ClientIntent, InboundFrame, ServerEvent, StakeStatus};
pub use round::{Phase, RoundSynchronizer, RoundTiming, RoundView};
pub use transport::{Connector, Transport};
pub use validator::RejectReason;

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
