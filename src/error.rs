//! Error types for the stake bingo client.

use thiserror::Error;

use crate::validator::RejectReason;

/// Why an intent was refused locally before reaching the server.
///
/// These are pre-checks only. The server remains authoritative and may still
/// refuse an intent that passed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentRejection {
    /// Numbers can only be picked while the reservation window is open.
    ReservationClosed,
    /// Called and selectable numbers are limited to `1..=75`.
    OutOfRange(u8),
    /// No card has been assigned to this session yet.
    NoCard,
    /// The session was disqualified earlier in this round.
    Disqualified,
    /// A mark that was refused without costing the round, and not sent.
    Mark(RejectReason),
}

impl std::fmt::Display for IntentRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReservationClosed => f.write_str("reservation window is closed"),
            Self::OutOfRange(n) => write!(f, "number {n} is outside 1..=75"),
            Self::NoCard => f.write_str("no card assigned"),
            Self::Disqualified => f.write_str("session is disqualified for this round"),
            Self::Mark(reason) => write!(f, "mark not sent: {reason}"),
        }
    }
}

/// Errors that can occur when using the stake bingo client.
#[derive(Debug, Error)]
pub enum BingoError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An intent was issued while no room connection is open.
    #[error("not connected to a stake room")]
    NotConnected,

    /// A room operation was issued before any stake was joined.
    #[error("not in a stake room")]
    NotInRoom,

    /// The requested stake is not in the configured allow-list.
    #[error("unknown stake: {0}")]
    UnknownStake(u32),

    /// A local pre-check refused the intent.
    #[error("intent rejected: {0}")]
    IntentRejected(IntentRejection),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for stake bingo client operations.
pub type Result<T> = std::result::Result<T, BingoError>;
