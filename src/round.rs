//! Round synchronization state machine.
//!
//! [`RoundSynchronizer`] owns everything the client knows about one stake
//! room: the server-authoritative [`RoundState`], this session's
//! [`PlayerState`], the [`Countdown`] and the active notices. It is mutated
//! only through its `handle_*` and intent methods, which the session loop
//! calls one at a time, so no locking is involved.
//!
//! Side effects (intents to send, notices to schedule) are queued in an
//! outbox and drained by the owner with [`RoundSynchronizer::take_effects`].
//!
//! Fields set locally ahead of the server (`pending_selection`,
//! `pending_mark`) are provisional. The next authoritative frame overwrites
//! them rather than merging into them.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::card::{Card, CellPos};
use crate::countdown::{Countdown, Tick};
use crate::error::IntentRejection;
use crate::event::ConnectionStatus;
use crate::notice::{
    reset_announcement, Notice, NoticeBoard, NoticeKind, DEFAULT_ERROR_MESSAGE,
    WINNER_ANNOUNCEMENT, WRONG_MARK_MESSAGE,
};
use crate::protocol::{
    is_valid_number, AssignmentPayload, ClientIntent, InboundFrame, ResetReason, RoomCounters,
    ServerEvent, SnapshotPayload, WinPayload,
};
use crate::validator::{validate_mark, validate_selection, MarkVerdict};

/// Round phase. Moves forward only, except for a reset back to `Reservation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No snapshot received yet.
    #[default]
    Idle,
    Reservation,
    Drawing,
    RoundEnd,
}

/// Fallback durations for frames that omit `seconds_left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTiming {
    /// Length of a fresh reservation window.
    pub reservation_window_secs: u32,
    /// Gap between two calls.
    pub call_interval_secs: u32,
}

impl Default for RoundTiming {
    fn default() -> Self {
        Self {
            reservation_window_secs: 60,
            call_interval_secs: 3,
        }
    }
}

/// Tunables for one synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub timing: RoundTiming,
    /// Lifetime of error notices.
    pub error_notice_ttl: Duration,
    /// Lifetime of announcements.
    pub announcement_ttl: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            timing: RoundTiming::default(),
            error_notice_ttl: Duration::from_secs(3),
            announcement_ttl: Duration::from_secs(5),
        }
    }
}

/// Server-authoritative state of the current round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundState {
    pub game_number: Option<String>,
    pub phase: Phase,
    pub player_count: u32,
    pub pot_total: f64,
    /// Append-only within a round, no duplicates.
    pub called_numbers: Vec<u8>,
    pub reserved_numbers: BTreeSet<u8>,
    pub winners: Vec<String>,
    pub winning_number: Option<u8>,
    /// This session's winning cells. Empty unless this session won.
    pub winning_cells: Vec<CellPos>,
}

impl RoundState {
    pub fn last_called_number(&self) -> Option<u8> {
        self.called_numbers.last().copied()
    }
}

/// What this session holds in the current round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerState {
    pub session_id: Option<String>,
    /// Confirmed by the server.
    pub selected_number: Option<u8>,
    /// Sent but not yet confirmed.
    pub pending_selection: Option<u8>,
    /// Present only while `selected_number` is.
    pub card: Option<Card>,
    /// Confirmed by the server.
    pub marked_numbers: BTreeSet<u8>,
    /// Sent but not yet confirmed.
    pub pending_mark: Option<u8>,
    pub disqualified: bool,
}

impl PlayerState {
    fn fresh(session_id: Option<String>) -> Self {
        Self {
            session_id,
            ..Self::default()
        }
    }

    /// Confirmed or provisionally marked.
    pub fn is_marked(&self, number: u8) -> bool {
        self.marked_numbers.contains(&number) || self.pending_mark == Some(number)
    }

    fn hydrate(&mut self, selected: Option<u8>, playboard: &[u8], marked: &[u8]) {
        self.pending_selection = None;
        self.pending_mark = None;
        match selected.filter(|n| is_valid_number(*n)) {
            Some(number) => {
                self.selected_number = Some(number);
                self.card = Card::from_cells(playboard);
                if self.card.is_none() {
                    warn!(
                        cells = playboard.len(),
                        "selection confirmed with a malformed card; card left empty"
                    );
                }
                self.marked_numbers = marked.iter().copied().collect();
            }
            None => {
                self.selected_number = None;
                self.card = None;
                self.marked_numbers.clear();
            }
        }
    }
}

/// Side effects produced while handling frames and intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Forward an intent to the server.
    Send(ClientIntent),
    /// Show a notice and schedule its expiry.
    Notice(Notice),
}

/// Read-only snapshot handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundView {
    pub stake: Option<u32>,
    pub connection: ConnectionStatus,
    pub phase: Phase,
    pub game_number: Option<String>,
    pub seconds_remaining: u32,
    pub player_count: u32,
    pub pot_total: f64,
    pub called_numbers: Vec<u8>,
    pub last_called_number: Option<u8>,
    pub reserved_numbers: BTreeSet<u8>,
    pub winners: Vec<String>,
    pub winning_number: Option<u8>,
    pub winning_cells: Vec<CellPos>,
    pub is_winner: bool,
    pub session_id: Option<String>,
    pub selected_number: Option<u8>,
    pub pending_selection: Option<u8>,
    pub card: Option<Card>,
    pub marked_numbers: BTreeSet<u8>,
    pub pending_mark: Option<u8>,
    pub disqualified: bool,
    pub auto_play: bool,
    /// A line on the card is fully marked. Display hint only.
    pub claim_ready: bool,
    pub notices: Vec<Notice>,
}

/// State machine for one stake room.
#[derive(Debug)]
pub struct RoundSynchronizer {
    stake: u32,
    settings: SyncSettings,
    round: RoundState,
    player: PlayerState,
    countdown: Countdown,
    notices: NoticeBoard,
    auto_play: bool,
    outbox: Vec<Effect>,
}

impl RoundSynchronizer {
    pub fn new(stake: u32, settings: SyncSettings, countdown: Countdown) -> Self {
        Self {
            stake,
            settings,
            round: RoundState::default(),
            player: PlayerState::default(),
            countdown,
            notices: NoticeBoard::default(),
            auto_play: false,
            outbox: Vec::new(),
        }
    }

    pub fn stake(&self) -> u32 {
        self.stake
    }

    pub fn phase(&self) -> Phase {
        self.round.phase
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.countdown.remaining()
    }

    pub fn auto_play(&self) -> bool {
        self.auto_play
    }

    /// Drain queued side effects in the order they were produced.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.outbox)
    }

    // ── Inbound ─────────────────────────────────────────────────────

    /// Apply one server frame.
    pub fn handle_frame(&mut self, frame: InboundFrame) {
        let InboundFrame { event, counters } = frame;
        debug!(stake = self.stake, kind = event.kind(), phase = ?self.round.phase, "applying frame");

        match event {
            ServerEvent::Init(snapshot) => self.apply_snapshot(snapshot),
            ServerEvent::Reservation {
                reservation_active,
                reserved_numbers,
                seconds_left,
            } => self.apply_reservation(reservation_active, &reserved_numbers, seconds_left),
            ServerEvent::ReservationEnd { seconds_left } => self.close_reservation(seconds_left),
            ServerEvent::NumberCalled {
                number,
                seconds_left,
                ..
            } => self.apply_call(number, seconds_left),
            ServerEvent::NumberReserved(assignment) => self.apply_assignment(assignment),
            ServerEvent::MarkedNumbers { marked_numbers } => {
                self.player.marked_numbers = marked_numbers.into_iter().collect();
                self.player.pending_mark = None;
            }
            ServerEvent::Winner(win) => self.apply_win(win),
            ServerEvent::WinnerAnnouncement => {
                self.post(
                    NoticeKind::Success,
                    WINNER_ANNOUNCEMENT.to_string(),
                    self.settings.announcement_ttl,
                );
            }
            reset @ (ServerEvent::NewRound { .. }
            | ServerEvent::NoPlayers { .. }
            | ServerEvent::Refund { .. }
            | ServerEvent::RoundCancelled { .. }) => {
                if let Some((reason, message)) = reset.reset_reason() {
                    self.reset_round(reason, message);
                }
            }
            ServerEvent::Error { message } => {
                self.player.pending_selection = None;
                self.post(
                    NoticeKind::Error,
                    message.unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
                    self.settings.error_notice_ttl,
                );
            }
            ServerEvent::Unknown => {
                warn!(stake = self.stake, "ignoring frame of unknown type");
            }
        }

        self.apply_counters(counters);
    }

    /// Apply a countdown tick. Returns `true` if the displayed value changed.
    pub fn handle_tick(&mut self, tick: Tick) -> bool {
        self.countdown.on_tick(tick)
    }

    /// Remove an expired notice. Returns `false` if it was already gone.
    pub fn expire_notice(&mut self, id: u64) -> bool {
        self.notices.expire(id)
    }

    fn apply_snapshot(&mut self, snapshot: SnapshotPayload) {
        let reservation = snapshot.reservation_active.unwrap_or(true);
        let same_session =
            snapshot.user_id.is_some() && snapshot.user_id == self.player.session_id;

        let mut called = Vec::with_capacity(snapshot.called_numbers.len());
        for n in snapshot.called_numbers {
            if is_valid_number(n) && !called.contains(&n) {
                called.push(n);
            }
        }

        self.round = RoundState {
            game_number: self.round.game_number.take(),
            phase: if reservation {
                Phase::Reservation
            } else {
                Phase::Drawing
            },
            player_count: self.round.player_count,
            pot_total: self.round.pot_total,
            called_numbers: called,
            reserved_numbers: snapshot.reserved_numbers.into_iter().collect(),
            ..RoundState::default()
        };

        let was_disqualified = same_session && self.player.disqualified;
        if !same_session {
            debug!(stake = self.stake, session = ?snapshot.user_id, "new session identity");
            self.player = PlayerState::fresh(snapshot.user_id);
        }
        self.player.hydrate(
            snapshot.selected_number,
            &snapshot.playboard,
            &snapshot.marked_numbers,
        );
        self.player.disqualified = was_disqualified && self.player.selected_number.is_some();

        let fallback = if reservation {
            self.settings.timing.reservation_window_secs
        } else {
            self.settings.timing.call_interval_secs
        };
        self.countdown
            .restart(snapshot.seconds_left.unwrap_or(i64::from(fallback)));
        info!(
            stake = self.stake,
            phase = ?self.round.phase,
            called = self.round.called_numbers.len(),
            selected = ?self.player.selected_number,
            "snapshot applied"
        );
    }

    fn apply_reservation(&mut self, active: Option<bool>, reserved: &[u8], seconds: Option<i64>) {
        if self.round.phase == Phase::RoundEnd {
            debug!(stake = self.stake, "reservation update after round end ignored");
            return;
        }
        self.round.reserved_numbers = reserved.iter().copied().collect();
        match (self.round.phase, active.unwrap_or(true)) {
            (Phase::Idle, true) => self.round.phase = Phase::Reservation,
            (Phase::Idle | Phase::Reservation, false) => self.round.phase = Phase::Drawing,
            _ => {}
        }
        self.countdown.restart(
            seconds.unwrap_or(i64::from(self.settings.timing.reservation_window_secs)),
        );
    }

    fn close_reservation(&mut self, seconds: Option<i64>) {
        if self.round.phase != Phase::Reservation {
            warn!(stake = self.stake, phase = ?self.round.phase, "reservation_end outside reservation ignored");
            return;
        }
        self.round.phase = Phase::Drawing;
        self.countdown
            .restart(seconds.unwrap_or(i64::from(self.settings.timing.call_interval_secs)));
    }

    fn apply_call(&mut self, number: Option<u8>, seconds: Option<i64>) {
        if self.round.phase != Phase::Drawing {
            warn!(stake = self.stake, phase = ?self.round.phase, ?number, "number called outside drawing ignored");
            return;
        }
        let Some(number) = number.filter(|n| is_valid_number(*n)) else {
            warn!(stake = self.stake, ?number, "number_called without a valid number ignored");
            return;
        };
        if self.round.called_numbers.contains(&number) {
            warn!(stake = self.stake, number, "duplicate call ignored");
            return;
        }
        self.round.called_numbers.push(number);
        self.countdown
            .restart(seconds.unwrap_or(i64::from(self.settings.timing.call_interval_secs)));
        if self.auto_play {
            self.auto_mark();
        }
    }

    fn apply_assignment(&mut self, assignment: AssignmentPayload) {
        self.round.reserved_numbers = assignment.reserved_numbers.into_iter().collect();
        let ours = assignment.user_id.is_some() && assignment.user_id == self.player.session_id;
        if ours {
            self.player.hydrate(
                assignment.selected_number,
                &assignment.playboard,
                &assignment.marked_numbers,
            );
            debug!(stake = self.stake, selected = ?self.player.selected_number, "own assignment updated");
        }
    }

    fn apply_win(&mut self, win: WinPayload) {
        if self.round.phase != Phase::Drawing {
            warn!(stake = self.stake, phase = ?self.round.phase, "winner outside drawing ignored");
            return;
        }
        self.round.phase = Phase::RoundEnd;
        self.round.winning_number = win.winning_number;

        let own_index = self
            .player
            .session_id
            .as_ref()
            .and_then(|id| win.winner_ids.iter().position(|w| w == id));
        self.round.winning_cells = match (own_index, &self.player.card) {
            (Some(idx), Some(_)) => win
                .winning_cells
                .get(idx)
                .map(|cells| {
                    cells
                        .iter()
                        .filter_map(|[row, col]| CellPos::new(*row, *col))
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        self.round.winners = win.winner_ids;
        info!(
            stake = self.stake,
            winners = self.round.winners.len(),
            own = own_index.is_some(),
            "round won"
        );
    }

    fn reset_round(&mut self, reason: ResetReason, message: Option<&str>) {
        self.round = RoundState {
            game_number: self.round.game_number.take(),
            phase: Phase::Reservation,
            ..RoundState::default()
        };
        self.player = PlayerState::fresh(self.player.session_id.take());
        self.countdown
            .restart(i64::from(self.settings.timing.reservation_window_secs));

        let (kind, text) = reset_announcement(reason, message);
        info!(stake = self.stake, ?reason, "round reset");
        self.post(kind, text, self.settings.announcement_ttl);
    }

    fn apply_counters(&mut self, counters: RoomCounters) {
        if let Some(game_no) = counters.game_no {
            self.round.game_number = Some(game_no);
        }
        if let Some(players) = counters.players {
            self.round.player_count = players;
        }
        if let Some(derash) = counters.derash {
            self.round.pot_total = derash;
        }
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Pick (or release) a number during the reservation window.
    pub fn select_number(&mut self, number: u8) -> Result<(), IntentRejection> {
        validate_selection(self.round.phase, number)?;
        self.player.pending_selection =
            (self.player.selected_number != Some(number)).then_some(number);
        self.outbox
            .push(Effect::Send(ClientIntent::SelectNumber { number }));
        Ok(())
    }

    /// Try to mark `number`, manually or from auto-play.
    ///
    /// Accepted marks are sent and held as `pending_mark` until confirmed.
    /// A disqualifying rejection is still sent, since the server rules on it,
    /// and flags the session locally. Other rejections are not sent.
    pub fn mark_number(&mut self, number: u8) -> Result<MarkVerdict, IntentRejection> {
        if self.player.disqualified {
            return Err(IntentRejection::Disqualified);
        }

        let mut marked = self.player.marked_numbers.clone();
        marked.extend(self.player.pending_mark);
        let verdict = validate_mark(
            self.player.card.as_ref(),
            &self.round.called_numbers,
            &marked,
            number,
        );

        match verdict {
            MarkVerdict::Accepted => {
                self.player.pending_mark = Some(number);
                self.outbox
                    .push(Effect::Send(ClientIntent::MarkNumber { number }));
            }
            MarkVerdict::Rejected(reason) if reason.is_disqualifying() => {
                warn!(stake = self.stake, number, ?reason, "wrong mark, session disqualified");
                self.player.disqualified = true;
                self.post(
                    NoticeKind::Error,
                    WRONG_MARK_MESSAGE.to_string(),
                    self.settings.error_notice_ttl,
                );
                self.outbox
                    .push(Effect::Send(ClientIntent::MarkNumber { number }));
            }
            MarkVerdict::Rejected(reason) => {
                debug!(stake = self.stake, number, ?reason, "mark not sent");
            }
        }
        Ok(verdict)
    }

    /// Claim bingo. The server checks the card.
    pub fn claim_bingo(&mut self) -> Result<(), IntentRejection> {
        if self.player.card.is_none() {
            return Err(IntentRejection::NoCard);
        }
        if self.player.disqualified {
            return Err(IntentRejection::Disqualified);
        }
        self.outbox.push(Effect::Send(ClientIntent::BingoClaim));
        Ok(())
    }

    /// Toggle auto-play. Switching it on checks the current last call at once.
    pub fn set_auto_play(&mut self, enabled: bool) {
        self.auto_play = enabled;
        if enabled {
            self.auto_mark();
        }
    }

    /// Mark the last call if it is on the card and unmarked, through the same
    /// path as a manual mark.
    fn auto_mark(&mut self) {
        if self.player.disqualified {
            return;
        }
        let Some(last) = self.round.last_called_number() else {
            return;
        };
        let on_card = self.player.card.as_ref().is_some_and(|c| c.contains(last));
        if on_card && !self.player.is_marked(last) {
            match self.mark_number(last) {
                Ok(verdict) => debug!(stake = self.stake, number = last, ?verdict, "auto-play mark"),
                Err(e) => debug!(stake = self.stake, number = last, "auto-play mark skipped: {e}"),
            }
        }
    }

    fn post(&mut self, kind: NoticeKind, message: String, ttl: Duration) {
        let notice = self.notices.post(kind, message, ttl);
        self.outbox.push(Effect::Notice(notice));
    }

    // ── View ────────────────────────────────────────────────────────

    /// Snapshot for the presentation layer. Connection status is left at its
    /// default for the owner to fill in.
    pub fn view(&self) -> RoundView {
        let round = &self.round;
        let player = &self.player;
        let is_winner = player
            .session_id
            .as_ref()
            .is_some_and(|id| round.winners.contains(id));
        let claim_ready = !player.disqualified
            && player
                .card
                .as_ref()
                .is_some_and(|c| !c.completed_lines(&player.marked_numbers).is_empty());

        RoundView {
            stake: Some(self.stake),
            connection: ConnectionStatus::default(),
            phase: round.phase,
            game_number: round.game_number.clone(),
            seconds_remaining: self.countdown.remaining(),
            player_count: round.player_count,
            pot_total: round.pot_total,
            called_numbers: round.called_numbers.clone(),
            last_called_number: round.last_called_number(),
            reserved_numbers: round.reserved_numbers.clone(),
            winners: round.winners.clone(),
            winning_number: round.winning_number,
            winning_cells: round.winning_cells.clone(),
            is_winner,
            session_id: player.session_id.clone(),
            selected_number: player.selected_number,
            pending_selection: player.pending_selection,
            card: player.card.clone(),
            marked_numbers: player.marked_numbers.clone(),
            pending_mark: player.pending_mark,
            disqualified: player.disqualified,
            auto_play: self.auto_play,
            claim_ready,
            notices: self.notices.active().to_vec(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::card::tests::sample_cells;
    use crate::validator::RejectReason;

    const SESSION: &str = "b";

    fn sync() -> RoundSynchronizer {
        RoundSynchronizer::new(20, SyncSettings::default(), Countdown::manual())
    }

    fn frame(event: ServerEvent) -> InboundFrame {
        InboundFrame::new(event)
    }

    fn snapshot(reservation: bool, seconds: i64) -> ServerEvent {
        ServerEvent::Init(SnapshotPayload {
            reservation_active: Some(reservation),
            seconds_left: Some(seconds),
            user_id: Some(SESSION.into()),
            ..Default::default()
        })
    }

    fn assigned(number: u8) -> ServerEvent {
        ServerEvent::NumberReserved(AssignmentPayload {
            reserved_numbers: vec![number],
            user_id: Some(SESSION.into()),
            selected_number: Some(number),
            playboard: sample_cells(),
            marked_numbers: vec![],
        })
    }

    fn call(number: u8) -> ServerEvent {
        ServerEvent::NumberCalled {
            number: Some(number),
            called_numbers: vec![],
            seconds_left: Some(4),
        }
    }

    /// Joined, holding a card, drawing started.
    fn drawing_with_card() -> RoundSynchronizer {
        let mut s = sync();
        s.handle_frame(frame(snapshot(true, 30)));
        s.handle_frame(frame(assigned(12)));
        s.handle_frame(frame(ServerEvent::ReservationEnd { seconds_left: None }));
        assert_eq!(s.phase(), Phase::Drawing);
        s.take_effects();
        s
    }

    fn sent(effects: &[Effect]) -> Vec<ClientIntent> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send(intent) => Some(*intent),
                Effect::Notice(_) => None,
            })
            .collect()
    }

    #[test]
    fn snapshot_sets_phase_and_countdown() {
        let mut s = sync();
        assert_eq!(s.phase(), Phase::Idle);
        s.handle_frame(frame(snapshot(true, 42)));
        assert_eq!(s.phase(), Phase::Reservation);
        assert_eq!(s.seconds_remaining(), 42);
        assert_eq!(s.player().session_id.as_deref(), Some(SESSION));

        s.handle_frame(frame(snapshot(false, 0)));
        assert_eq!(s.phase(), Phase::Drawing);
        assert_eq!(s.seconds_remaining(), 0);
    }

    #[test]
    fn zero_snapshot_holds_at_zero() {
        let mut s = sync();
        s.handle_frame(frame(snapshot(false, 0)));
        for _ in 0..3 {
            let t = s.countdown.current_tick();
            assert!(!s.handle_tick(t));
        }
        assert_eq!(s.seconds_remaining(), 0);
    }

    #[test]
    fn snapshot_hydrates_own_selection() {
        let mut s = sync();
        s.handle_frame(frame(ServerEvent::Init(SnapshotPayload {
            reservation_active: Some(false),
            seconds_left: Some(2),
            called_numbers: vec![5, 9, 5, 200],
            user_id: Some(SESSION.into()),
            selected_number: Some(12),
            playboard: sample_cells(),
            marked_numbers: vec![5],
            ..Default::default()
        })));
        assert_eq!(s.round().called_numbers, vec![5, 9]);
        assert_eq!(s.player().selected_number, Some(12));
        assert!(s.player().card.is_some());
        assert!(s.player().marked_numbers.contains(&5));
    }

    #[test]
    fn snapshot_for_other_session_rebuilds_player() {
        let mut s = drawing_with_card();
        s.player.disqualified = true;
        s.handle_frame(frame(ServerEvent::Init(SnapshotPayload {
            reservation_active: Some(false),
            user_id: Some("someone-else".into()),
            ..Default::default()
        })));
        assert_eq!(s.player().session_id.as_deref(), Some("someone-else"));
        assert!(s.player().card.is_none());
        assert!(!s.player().disqualified);
    }

    #[test]
    fn reconnect_snapshot_keeps_disqualification_for_same_session() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(call(40)));
        s.mark_number(40).unwrap();
        assert!(s.player().disqualified);

        s.handle_frame(frame(ServerEvent::Init(SnapshotPayload {
            reservation_active: Some(false),
            user_id: Some(SESSION.into()),
            selected_number: Some(12),
            playboard: sample_cells(),
            called_numbers: vec![40],
            ..Default::default()
        })));
        assert!(s.player().disqualified);
    }

    #[test]
    fn snapshot_overrides_provisional_selection() {
        let mut s = sync();
        s.handle_frame(frame(snapshot(true, 30)));
        s.select_number(9).unwrap();
        assert_eq!(s.player().pending_selection, Some(9));
        s.handle_frame(frame(snapshot(true, 28)));
        assert_eq!(s.player().pending_selection, None);
        assert_eq!(s.player().selected_number, None);
    }

    #[test]
    fn called_numbers_stay_append_only() {
        let mut s = drawing_with_card();
        let sequence = [7, 13, 7, 0, 76, 44, 13, 2];
        let mut seen = Vec::new();
        for n in sequence {
            s.handle_frame(frame(call(n)));
            if (1..=75).contains(&n) && !seen.contains(&n) {
                seen.push(n);
            }
            assert_eq!(s.round().called_numbers, seen);
            assert_eq!(s.round().last_called_number(), seen.last().copied());
        }
        assert_eq!(s.round().called_numbers, vec![7, 13, 44, 2]);
    }

    #[test]
    fn duplicate_call_does_not_restart_countdown() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(call(7)));
        let t = s.countdown.current_tick();
        s.handle_tick(t);
        assert_eq!(s.seconds_remaining(), 3);
        s.handle_frame(frame(call(7)));
        assert_eq!(s.seconds_remaining(), 3);
    }

    #[test]
    fn call_interval_comes_from_the_frame() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(ServerEvent::NumberCalled {
            number: Some(8),
            called_numbers: vec![8],
            seconds_left: Some(9),
        }));
        assert_eq!(s.seconds_remaining(), 9);
        s.handle_frame(frame(ServerEvent::NumberCalled {
            number: Some(10),
            called_numbers: vec![8, 10],
            seconds_left: Some(-3),
        }));
        assert_eq!(s.seconds_remaining(), 0);
    }

    #[test]
    fn calls_before_drawing_are_ignored() {
        let mut s = sync();
        s.handle_frame(frame(snapshot(true, 10)));
        s.handle_frame(frame(call(5)));
        assert!(s.round().called_numbers.is_empty());
    }

    #[test]
    fn reservation_close_only_from_reservation() {
        let mut s = sync();
        s.handle_frame(frame(ServerEvent::ReservationEnd {
            seconds_left: Some(3),
        }));
        assert_eq!(s.phase(), Phase::Idle);

        s.handle_frame(frame(snapshot(true, 10)));
        s.handle_frame(frame(ServerEvent::ReservationEnd { seconds_left: None }));
        assert_eq!(s.phase(), Phase::Drawing);
        assert_eq!(s.seconds_remaining(), 3);
    }

    #[test]
    fn reservation_update_merges_and_restarts() {
        let mut s = sync();
        s.handle_frame(frame(snapshot(true, 60)));
        s.handle_frame(frame(ServerEvent::Reservation {
            reservation_active: Some(true),
            reserved_numbers: vec![3, 9],
            seconds_left: Some(51),
        }));
        assert_eq!(s.seconds_remaining(), 51);
        assert_eq!(
            s.round().reserved_numbers,
            [3, 9].into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn reservation_update_after_round_end_is_ignored() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(ServerEvent::Winner(WinPayload {
            winner_ids: vec!["x".into()],
            winning_number: Some(4),
            winning_cells: vec![vec![[0, 0]]],
        })));
        assert_eq!(s.phase(), Phase::RoundEnd);
        s.handle_frame(frame(ServerEvent::Reservation {
            reservation_active: Some(true),
            reserved_numbers: vec![1, 2, 3],
            seconds_left: Some(50),
        }));
        assert_eq!(s.phase(), Phase::RoundEnd);
        assert_eq!(
            s.round().reserved_numbers,
            [12u8].into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn own_assignment_hydrates_and_release_clears() {
        let mut s = sync();
        s.handle_frame(frame(snapshot(true, 60)));
        s.select_number(12).unwrap();
        s.handle_frame(frame(assigned(12)));
        assert_eq!(s.player().selected_number, Some(12));
        assert_eq!(s.player().pending_selection, None);
        assert!(s.player().card.is_some());

        s.handle_frame(frame(ServerEvent::NumberReserved(AssignmentPayload {
            reserved_numbers: vec![],
            user_id: Some(SESSION.into()),
            selected_number: None,
            playboard: vec![],
            marked_numbers: vec![],
        })));
        assert_eq!(s.player().selected_number, None);
        assert!(s.player().card.is_none());
    }

    #[test]
    fn foreign_assignment_only_updates_reservations() {
        let mut s = sync();
        s.handle_frame(frame(snapshot(true, 60)));
        s.handle_frame(frame(ServerEvent::NumberReserved(AssignmentPayload {
            reserved_numbers: vec![33],
            user_id: Some("other".into()),
            selected_number: Some(33),
            playboard: sample_cells(),
            marked_numbers: vec![],
        })));
        assert!(s.round().reserved_numbers.contains(&33));
        assert_eq!(s.player().selected_number, None);
        assert!(s.player().card.is_none());
    }

    #[test]
    fn malformed_card_leaves_card_empty() {
        let mut s = sync();
        s.handle_frame(frame(snapshot(true, 60)));
        s.handle_frame(frame(ServerEvent::NumberReserved(AssignmentPayload {
            reserved_numbers: vec![12],
            user_id: Some(SESSION.into()),
            selected_number: Some(12),
            playboard: vec![1, 2, 3],
            marked_numbers: vec![],
        })));
        assert_eq!(s.player().selected_number, Some(12));
        assert!(s.player().card.is_none());
    }

    #[test]
    fn accepted_mark_is_provisional_until_confirmed() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(call(1)));
        assert_eq!(s.mark_number(1), Ok(MarkVerdict::Accepted));
        assert_eq!(s.player().pending_mark, Some(1));
        assert!(s.player().marked_numbers.is_empty());
        assert_eq!(
            sent(&s.take_effects()),
            vec![ClientIntent::MarkNumber { number: 1 }]
        );

        s.handle_frame(frame(ServerEvent::MarkedNumbers {
            marked_numbers: vec![1],
        }));
        assert_eq!(s.player().pending_mark, None);
        assert!(s.player().marked_numbers.contains(&1));
    }

    #[test]
    fn marks_update_overrides_optimistic_mark() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(call(1)));
        s.mark_number(1).unwrap();
        s.handle_frame(frame(ServerEvent::MarkedNumbers {
            marked_numbers: vec![],
        }));
        assert!(!s.player().is_marked(1));
    }

    #[test]
    fn wrong_mark_disqualifies_and_is_still_forwarded() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(call(1)));
        assert_eq!(
            s.mark_number(2),
            Ok(MarkVerdict::Rejected(RejectReason::NotLastCalled))
        );
        assert!(s.player().disqualified);
        let effects = s.take_effects();
        assert_eq!(sent(&effects), vec![ClientIntent::MarkNumber { number: 2 }]);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Notice(Notice { kind: NoticeKind::Error, message, .. }) if message == WRONG_MARK_MESSAGE
        )));

        assert_eq!(s.mark_number(1), Err(IntentRejection::Disqualified));
        assert!(s.take_effects().is_empty());
    }

    #[test]
    fn harmless_rejections_are_not_sent() {
        let mut s = drawing_with_card();
        assert_eq!(
            s.mark_number(1),
            Ok(MarkVerdict::Rejected(RejectReason::NothingCalled))
        );
        s.handle_frame(frame(call(1)));
        assert_eq!(
            s.mark_number(0),
            Ok(MarkVerdict::Rejected(RejectReason::FreeCell))
        );
        assert!(s.take_effects().is_empty());
        assert!(!s.player().disqualified);
    }

    #[test]
    fn auto_play_matches_manual_click() {
        let mut manual = drawing_with_card();
        manual.handle_frame(frame(call(17)));
        manual.mark_number(17).unwrap();
        let manual_sent = sent(&manual.take_effects());

        let mut auto = drawing_with_card();
        auto.set_auto_play(true);
        auto.handle_frame(frame(call(17)));
        let auto_sent = sent(&auto.take_effects());

        assert_eq!(manual_sent, auto_sent);
        assert_eq!(auto_sent, vec![ClientIntent::MarkNumber { number: 17 }]);
    }

    #[test]
    fn auto_play_skips_numbers_not_on_card() {
        let mut s = drawing_with_card();
        s.set_auto_play(true);
        s.handle_frame(frame(call(75)));
        assert!(s.take_effects().is_empty());
        assert!(!s.player().disqualified);
    }

    #[test]
    fn enabling_auto_play_marks_current_call() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(call(2)));
        s.set_auto_play(true);
        assert_eq!(
            sent(&s.take_effects()),
            vec![ClientIntent::MarkNumber { number: 2 }]
        );
        // Already pending: toggling again does not resend.
        s.set_auto_play(true);
        assert!(s.take_effects().is_empty());
    }

    #[test]
    fn winning_cells_are_looked_up_by_session() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(ServerEvent::Winner(WinPayload {
            winner_ids: vec!["a".into(), "b".into()],
            winning_number: Some(12),
            winning_cells: vec![vec![[0, 0]], vec![[4, 4]]],
        })));
        assert_eq!(s.phase(), Phase::RoundEnd);
        assert_eq!(s.round().winning_cells, vec![CellPos::new(4, 4).unwrap()]);
        assert!(s.view().is_winner);
    }

    #[test]
    fn win_before_card_records_winners_without_cells() {
        let mut s = sync();
        s.handle_frame(frame(snapshot(false, 3)));
        s.handle_frame(frame(ServerEvent::Winner(WinPayload {
            winner_ids: vec![SESSION.into()],
            winning_number: Some(5),
            winning_cells: vec![vec![[1, 1]]],
        })));
        assert_eq!(s.round().winners, vec![SESSION.to_string()]);
        assert!(s.round().winning_cells.is_empty());
    }

    #[test]
    fn win_with_short_cell_list_does_not_panic() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(ServerEvent::Winner(WinPayload {
            winner_ids: vec!["a".into(), SESSION.into()],
            winning_number: None,
            winning_cells: vec![vec![[0, 0]]],
        })));
        assert!(s.round().winning_cells.is_empty());
        assert_eq!(s.phase(), Phase::RoundEnd);
    }

    #[test]
    fn single_winner_form_ends_the_round() {
        let mut s = drawing_with_card();
        let win = InboundFrame::parse(
            r#"{"type":"winner","winner_id":"b","winning_number":12,
                "winning_cells":[[2,0],[2,1],[2,2],[2,3],[2,4]],"game_no":"000031"}"#,
        )
        .unwrap();
        s.handle_frame(win);
        assert_eq!(s.phase(), Phase::RoundEnd);
        assert_eq!(s.round().winners, vec![SESSION.to_string()]);
        assert_eq!(s.round().winning_cells.len(), 5);
        assert_eq!(s.round().winning_cells[4], CellPos::new(2, 4).unwrap());
        assert!(s.view().is_winner);
    }

    #[test]
    fn mis_shaped_win_is_recorded_without_cells() {
        let mut s = drawing_with_card();
        let win = InboundFrame::parse(
            r#"{"type":"winner","winner_ids":["b"],"winning_number":300,"winning_cells":"row 3"}"#,
        )
        .unwrap();
        s.handle_frame(win);
        assert_eq!(s.phase(), Phase::RoundEnd);
        assert_eq!(s.round().winners, vec![SESSION.to_string()]);
        assert_eq!(s.round().winning_number, None);
        assert!(s.round().winning_cells.is_empty());
    }

    #[test]
    fn every_reset_reason_clears_the_round() {
        let resets = [
            ServerEvent::NewRound { message: None },
            ServerEvent::NoPlayers { message: None },
            ServerEvent::Refund {
                message: Some("refunded".into()),
            },
            ServerEvent::RoundCancelled { message: None },
        ];
        for reset in resets {
            let mut s = drawing_with_card();
            s.handle_frame(frame(call(1)));
            s.handle_frame(frame(call(2)));
            s.handle_frame(frame(ServerEvent::MarkedNumbers {
                marked_numbers: vec![2],
            }));
            s.mark_number(1).unwrap();
            s.handle_frame(frame(ServerEvent::Winner(WinPayload {
                winner_ids: vec!["a".into()],
                winning_number: Some(1),
                winning_cells: vec![],
            })));
            assert!(s.player().disqualified);

            s.handle_frame(frame(reset));
            let view = s.view();
            assert_eq!(view.phase, Phase::Reservation);
            assert!(view.called_numbers.is_empty());
            assert!(view.marked_numbers.is_empty());
            assert!(view.winners.is_empty());
            assert!(view.reserved_numbers.is_empty());
            assert!(!view.disqualified);
            assert_eq!(view.selected_number, None);
            assert_eq!(view.session_id.as_deref(), Some(SESSION));
            assert_eq!(view.seconds_remaining, 60);
        }
    }

    #[test]
    fn reset_announcement_kinds() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(ServerEvent::RoundCancelled { message: None }));
        let notices: Vec<_> = s
            .take_effects()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Notice(n) => Some(n),
                Effect::Send(_) => None,
            })
            .collect();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Error);
        assert_eq!(notices[0].ttl, Duration::from_secs(5));
    }

    #[test]
    fn reset_frames_carry_their_server_message() {
        let cases = [
            (
                ServerEvent::Refund {
                    message: Some("Stake returned".into()),
                },
                NoticeKind::Info,
                "Stake returned",
            ),
            (
                ServerEvent::RoundCancelled {
                    message: Some("Too few players".into()),
                },
                NoticeKind::Error,
                "Too few players",
            ),
            (
                ServerEvent::NoPlayers {
                    message: Some("ignored".into()),
                },
                NoticeKind::Info,
                "New round started",
            ),
        ];
        for (reset, kind, text) in cases {
            let mut s = drawing_with_card();
            s.handle_frame(frame(reset));
            let view = s.view();
            assert_eq!(view.phase, Phase::Reservation);
            assert_eq!(view.notices.len(), 1);
            assert_eq!(view.notices[0].kind, kind);
            assert_eq!(view.notices[0].message, text);
        }
    }

    #[test]
    fn error_frame_posts_transient_notice_without_touching_round() {
        let mut s = drawing_with_card();
        s.handle_frame(frame(call(3)));
        let before = s.round().clone();
        s.handle_frame(frame(ServerEvent::Error {
            message: Some("Number already reserved".into()),
        }));
        assert_eq!(s.round(), &before);
        let view = s.view();
        assert_eq!(view.notices.len(), 1);
        assert_eq!(view.notices[0].message, "Number already reserved");
        assert_eq!(view.notices[0].ttl, Duration::from_secs(3));

        assert!(s.expire_notice(view.notices[0].id));
        assert!(s.view().notices.is_empty());
    }

    #[test]
    fn counters_update_on_any_frame() {
        let mut s = sync();
        s.handle_frame(
            frame(ServerEvent::NewRound { message: None }).with_counters(RoomCounters {
                game_no: Some("000009".into()),
                players: Some(4),
                derash: Some(80.0),
            }),
        );
        let view = s.view();
        assert_eq!(view.game_number.as_deref(), Some("000009"));
        assert_eq!(view.player_count, 4);
        assert_eq!(view.pot_total, 80.0);
    }

    #[test]
    fn selection_prechecks_and_release() {
        let mut s = drawing_with_card();
        assert_eq!(s.select_number(5), Err(IntentRejection::ReservationClosed));

        let mut s = sync();
        s.handle_frame(frame(snapshot(true, 60)));
        s.handle_frame(frame(assigned(12)));
        s.take_effects();
        s.select_number(12).unwrap();
        assert_eq!(s.player().pending_selection, None);
        assert_eq!(
            sent(&s.take_effects()),
            vec![ClientIntent::SelectNumber { number: 12 }]
        );
    }

    #[test]
    fn claim_requires_card() {
        let mut s = sync();
        s.handle_frame(frame(snapshot(false, 3)));
        assert_eq!(s.claim_bingo(), Err(IntentRejection::NoCard));
        let mut s = drawing_with_card();
        s.claim_bingo().unwrap();
        assert_eq!(sent(&s.take_effects()), vec![ClientIntent::BingoClaim]);
    }

    #[test]
    fn claim_ready_hint_follows_confirmed_marks() {
        let mut s = drawing_with_card();
        assert!(!s.view().claim_ready);
        s.handle_frame(frame(ServerEvent::MarkedNumbers {
            marked_numbers: vec![3, 18, 48, 63],
        }));
        assert!(s.view().claim_ready);
    }
}
