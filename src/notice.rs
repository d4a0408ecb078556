//! Short-lived messages for the player.
//!
//! Notices never change round state. Each one carries its own lifetime and is
//! removed when its expiry comes back through the session queue.

use std::time::Duration;

use crate::protocol::ResetReason;

/// Shown when a wrong mark disqualifies the session.
pub const WRONG_MARK_MESSAGE: &str = "Wrong number! You are out of the game.";

/// Shown when a `winner_announcement` frame arrives.
pub const WINNER_ANNOUNCEMENT: &str = "Player won Bingo!";

/// Fallback text for an `error` frame without a message.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

/// How a notice should be styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// A transient, self-expiring message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
    pub ttl: Duration,
}

/// Announcement kind and text for a round reset.
pub fn reset_announcement(reason: ResetReason, message: Option<&str>) -> (NoticeKind, String) {
    match reason {
        ResetReason::NewRound | ResetReason::NoPlayers => {
            (NoticeKind::Info, "New round started".to_string())
        }
        ResetReason::Refund => (
            NoticeKind::Info,
            message
                .unwrap_or("Game canceled. Stake refunded.")
                .to_string(),
        ),
        ResetReason::Cancelled => (
            NoticeKind::Error,
            message
                .unwrap_or("Round cancelled: not enough players")
                .to_string(),
        ),
    }
}

/// Active notices, oldest first.
#[derive(Debug, Default)]
pub(crate) struct NoticeBoard {
    next_id: u64,
    active: Vec<Notice>,
}

impl NoticeBoard {
    pub(crate) fn post(&mut self, kind: NoticeKind, message: String, ttl: Duration) -> Notice {
        self.next_id += 1;
        let notice = Notice {
            id: self.next_id,
            kind,
            message,
            ttl,
        };
        self.active.push(notice.clone());
        notice
    }

    /// Drop the notice with `id`. Returns `false` if it was already gone.
    pub(crate) fn expire(&mut self, id: u64) -> bool {
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        self.active.len() != before
    }

    pub(crate) fn active(&self) -> &[Notice] {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_reasons_map_to_kinds() {
        assert_eq!(
            reset_announcement(ResetReason::NoPlayers, Some("ignored")).0,
            NoticeKind::Info
        );
        assert_eq!(
            reset_announcement(ResetReason::Refund, None),
            (NoticeKind::Info, "Game canceled. Stake refunded.".to_string())
        );
        assert_eq!(
            reset_announcement(ResetReason::Cancelled, Some("too few")),
            (NoticeKind::Error, "too few".to_string())
        );
    }

    #[test]
    fn board_expires_by_id() {
        let mut board = NoticeBoard::default();
        let a = board.post(NoticeKind::Info, "a".into(), Duration::from_secs(5));
        let b = board.post(NoticeKind::Error, "b".into(), Duration::from_secs(3));
        assert_ne!(a.id, b.id);
        assert!(board.expire(a.id));
        assert!(!board.expire(a.id));
        assert_eq!(board.active(), std::slice::from_ref(&b));
    }
}
