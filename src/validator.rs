//! Local pre-checks for player intents.
//!
//! [`validate_mark`] decides whether a mark would be legal before it is sent.
//! It never mutates marks itself: an accepted mark only becomes real when the
//! server confirms it with a `marked_numbers` frame.

use std::collections::BTreeSet;

use crate::card::{Card, FREE_CELL};
use crate::error::IntentRejection;
use crate::protocol::is_valid_number;
use crate::round::Phase;

/// Outcome of [`validate_mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkVerdict {
    Accepted,
    Rejected(RejectReason),
}

impl MarkVerdict {
    /// Report a mark that never reached the wire.
    ///
    /// Accepted marks and disqualifying rejections are both sent, so only a
    /// non-disqualifying rejection comes back as an error.
    pub fn into_send_result(self) -> Result<(), IntentRejection> {
        match self {
            Self::Rejected(reason) if !reason.is_disqualifying() => {
                Err(IntentRejection::Mark(reason))
            }
            _ => Ok(()),
        }
    }
}

/// Why a mark was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The free cell has no number to mark.
    FreeCell,
    /// Nothing has been called this round.
    NothingCalled,
    /// No card has been assigned yet.
    NoCard,
    /// The candidate is not the most recently called number.
    NotLastCalled,
    /// The candidate was already marked.
    AlreadyMarked,
    /// The candidate does not appear on the card.
    NotOnCard,
}

impl RejectReason {
    /// Whether this rejection costs the player the round.
    ///
    /// Disqualifying rejections are still forwarded to the server, which
    /// makes the binding ruling. The others are simply not sent.
    pub fn is_disqualifying(self) -> bool {
        matches!(
            self,
            Self::NotLastCalled | Self::AlreadyMarked | Self::NotOnCard
        )
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FreeCell => f.write_str("the free cell cannot be marked"),
            Self::NothingCalled => f.write_str("no number has been called yet"),
            Self::NoCard => f.write_str("no card assigned"),
            Self::NotLastCalled => f.write_str("not the latest called number"),
            Self::AlreadyMarked => f.write_str("already marked"),
            Self::NotOnCard => f.write_str("not on the card"),
        }
    }
}

/// Check a candidate mark against the card and the draw so far.
pub fn validate_mark(
    card: Option<&Card>,
    called: &[u8],
    marked: &BTreeSet<u8>,
    candidate: u8,
) -> MarkVerdict {
    use MarkVerdict::Rejected;

    if candidate == FREE_CELL {
        return Rejected(RejectReason::FreeCell);
    }
    let Some(&last) = called.last() else {
        return Rejected(RejectReason::NothingCalled);
    };
    let Some(card) = card else {
        return Rejected(RejectReason::NoCard);
    };
    if candidate != last {
        return Rejected(RejectReason::NotLastCalled);
    }
    if marked.contains(&candidate) {
        return Rejected(RejectReason::AlreadyMarked);
    }
    if !card.contains(candidate) {
        return Rejected(RejectReason::NotOnCard);
    }
    MarkVerdict::Accepted
}

/// Check a number pick. Picking the number already held is a release, which
/// the server also accepts, so it passes here.
pub fn validate_selection(phase: Phase, number: u8) -> Result<(), IntentRejection> {
    if phase != Phase::Reservation {
        return Err(IntentRejection::ReservationClosed);
    }
    if !is_valid_number(number) {
        return Err(IntentRejection::OutOfRange(number));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::card::tests::sample_cells;

    fn card() -> Card {
        Card::from_cells(&sample_cells()).unwrap()
    }

    #[test]
    fn last_called_number_on_card_is_accepted() {
        let card = card();
        let verdict = validate_mark(Some(&card), &[7, 1], &BTreeSet::new(), 1);
        assert_eq!(verdict, MarkVerdict::Accepted);
    }

    #[test]
    fn earlier_call_is_wrong_number() {
        // Card holding both 7 and 13 so only the ordering rule can fail.
        let mut cells = sample_cells();
        cells[0] = 7;
        cells[1] = 13;
        let card = Card::from_cells(&cells).unwrap();
        let marked = BTreeSet::new();
        assert_eq!(
            validate_mark(Some(&card), &[7], &marked, 7),
            MarkVerdict::Accepted
        );
        assert_eq!(
            validate_mark(Some(&card), &[7], &marked, 13),
            MarkVerdict::Rejected(RejectReason::NotLastCalled)
        );
    }

    #[test]
    fn rule_order() {
        let card = card();
        let marked: BTreeSet<u8> = [1].into_iter().collect();
        assert_eq!(
            validate_mark(Some(&card), &[1], &marked, 0),
            MarkVerdict::Rejected(RejectReason::FreeCell)
        );
        assert_eq!(
            validate_mark(Some(&card), &[], &marked, 1),
            MarkVerdict::Rejected(RejectReason::NothingCalled)
        );
        assert_eq!(
            validate_mark(None, &[1], &marked, 1),
            MarkVerdict::Rejected(RejectReason::NoCard)
        );
        assert_eq!(
            validate_mark(Some(&card), &[1], &marked, 1),
            MarkVerdict::Rejected(RejectReason::AlreadyMarked)
        );
        assert_eq!(
            validate_mark(Some(&card), &[75], &marked, 75),
            MarkVerdict::Rejected(RejectReason::NotOnCard)
        );
    }

    #[test]
    fn rejection_is_stable() {
        let card = card();
        let marked = BTreeSet::new();
        let first = validate_mark(Some(&card), &[2, 9], &marked, 2);
        let second = validate_mark(Some(&card), &[2, 9], &marked, 2);
        assert_eq!(first, second);
        assert_eq!(first, MarkVerdict::Rejected(RejectReason::NotLastCalled));
    }

    #[test]
    fn only_wrong_marks_disqualify() {
        assert!(RejectReason::NotLastCalled.is_disqualifying());
        assert!(RejectReason::AlreadyMarked.is_disqualifying());
        assert!(RejectReason::NotOnCard.is_disqualifying());
        assert!(!RejectReason::FreeCell.is_disqualifying());
        assert!(!RejectReason::NothingCalled.is_disqualifying());
        assert!(!RejectReason::NoCard.is_disqualifying());
    }

    #[test]
    fn only_unsent_marks_report_an_error() {
        assert_eq!(MarkVerdict::Accepted.into_send_result(), Ok(()));
        assert_eq!(
            MarkVerdict::Rejected(RejectReason::NotOnCard).into_send_result(),
            Ok(())
        );
        assert_eq!(
            MarkVerdict::Rejected(RejectReason::NothingCalled).into_send_result(),
            Err(IntentRejection::Mark(RejectReason::NothingCalled))
        );
        assert_eq!(
            IntentRejection::Mark(RejectReason::FreeCell).to_string(),
            "mark not sent: the free cell cannot be marked"
        );
    }

    #[test]
    fn selection_prechecks() {
        assert_eq!(validate_selection(Phase::Reservation, 12), Ok(()));
        assert_eq!(
            validate_selection(Phase::Drawing, 12),
            Err(IntentRejection::ReservationClosed)
        );
        assert_eq!(
            validate_selection(Phase::Reservation, 76),
            Err(IntentRejection::OutOfRange(76))
        );
        assert_eq!(
            validate_selection(Phase::Reservation, 0),
            Err(IntentRejection::OutOfRange(0))
        );
    }
}
