//! Events emitted by the bingo client.
//!
//! [`BingoEvent`] is delivered on the bounded channel returned by
//! [`BingoClient::start`](crate::client::BingoClient::start). The full round
//! state is also published as a [`RoundView`] on a watch channel, so
//! consumers that only render the latest state can ignore most events.

use std::fmt;
use std::time::Duration;

use crate::error::BingoError;
use crate::notice::Notice;
use crate::protocol::ClientIntent;
use crate::round::RoundView;

/// Link status of the room connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No stake joined.
    #[default]
    Idle,
    /// First connection attempt to a stake room is in flight.
    Connecting,
    Connected,
    /// The link dropped; waiting to retry.
    Reconnecting { attempt: u32 },
    /// Retries exhausted or the room was left.
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Which player intent an [`BingoEvent::IntentFailed`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Select,
    Mark,
    Claim,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => f.write_str("select_number"),
            Self::Mark => f.write_str("mark_number"),
            Self::Claim => f.write_str("bingo_claim"),
        }
    }
}

impl From<&ClientIntent> for IntentKind {
    fn from(intent: &ClientIntent) -> Self {
        match intent {
            ClientIntent::SelectNumber { .. } => Self::Select,
            ClientIntent::MarkNumber { .. } => Self::Mark,
            ClientIntent::BingoClaim => Self::Claim,
        }
    }
}

/// Everything the session loop reports to the consumer.
#[derive(Debug)]
pub enum BingoEvent {
    /// A room connection was established.
    Connected {
        /// Stake of the room.
        stake: u32,
    },

    /// The room connection was lost or closed.
    Disconnected {
        /// Why the connection ended, if known.
        reason: Option<String>,
    },

    /// A reconnection attempt is scheduled.
    Reconnecting {
        /// One-based attempt counter.
        attempt: u32,
        /// Delay before the attempt.
        next_in: Duration,
    },

    /// The configured retry budget ran out. No further attempts are made
    /// until the consumer joins a stake again.
    GaveUp {
        /// Attempts made.
        attempts: u32,
    },

    /// Round state changed. Carries the latest view.
    RoundUpdated(Box<RoundView>),

    /// A new notice was posted. It disappears from the view after its TTL.
    Notice(Notice),

    /// An intent could not be carried out.
    IntentFailed {
        intent: IntentKind,
        error: BingoError,
    },
}
