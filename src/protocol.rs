//! Wire types for the stake bingo room protocol.
//!
//! Every frame is one JSON object discriminated by a snake_case `type` field.
//! The server is loose about optional data: fields are routinely omitted or
//! sent as `null`, so every payload field here decodes to a default instead of
//! failing the whole frame.
//!
//! Any inbound frame may also carry the room counters (`game_no`, `players`,
//! `derash`). They are decoded separately into [`RoomCounters`] and paired
//! with the event in an [`InboundFrame`].

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::Result;

/// Lowest number that can be called or reserved.
pub const MIN_NUMBER: u8 = 1;

/// Highest number that can be called or reserved.
pub const MAX_NUMBER: u8 = 75;

/// Returns `true` if `n` is a callable bingo number.
pub fn is_valid_number(n: u8) -> bool {
    (MIN_NUMBER..=MAX_NUMBER).contains(&n)
}

// Payload fields decode leniently: a value of the wrong shape becomes the
// field's empty value instead of failing the frame it rides on.

fn as_u8(value: &Value) -> Option<u8> {
    value.as_u64().and_then(|n| u8::try_from(n).ok())
}

/// A list of numbers. Entries that are not a `u8` are dropped.
fn numbers<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_array()
        .map(|items| items.iter().filter_map(as_u8).collect())
        .unwrap_or_default())
}

fn number<'de, D>(deserializer: D) -> std::result::Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(as_u8(&Value::deserialize(deserializer)?))
}

/// Whole seconds. Fractions are truncated.
fn seconds<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs as i64)))
}

/// Winner ids, from either the `winner_ids` list or a single `winner_id`.
fn winner_ids<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    fn id(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(id).collect(),
        single => id(single).into_iter().collect(),
    })
}

fn cell(value: &Value) -> Option<[u8; 2]> {
    match value.as_array()?.as_slice() {
        [row, col] => Some([as_u8(row)?, as_u8(col)?]),
        _ => None,
    }
}

/// Winning cells, one list per winner. A flat list of `[row, col]` pairs is
/// the single-winner form and belongs to the first winner. A malformed
/// per-winner entry becomes an empty list so the rest stay index-aligned.
fn winning_cells<'de, D>(deserializer: D) -> std::result::Result<Vec<Vec<[u8; 2]>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Some(items) = value.as_array() else {
        return Ok(Vec::new());
    };
    if items.iter().any(|item| cell(item).is_some()) {
        return Ok(vec![items.iter().filter_map(cell).collect()]);
    }
    Ok(items
        .iter()
        .map(|cells| {
            cells
                .as_array()
                .map(|cells| cells.iter().filter_map(cell).collect())
                .unwrap_or_default()
        })
        .collect())
}

/// `game_no` is a zero-padded string on room frames but a bare integer on the
/// lobby status endpoint.
fn game_no<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => format!("{n:06}"),
    }))
}

// ── Room counters ───────────────────────────────────────────────────

/// Informational counters that may ride along on any inbound frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomCounters {
    /// Display-only round identifier.
    #[serde(
        default,
        deserialize_with = "game_no",
        skip_serializing_if = "Option::is_none"
    )]
    pub game_no: Option<String>,
    /// Number of players holding a reservation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<u32>,
    /// Pot total for the round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derash: Option<f64>,
}

impl RoomCounters {
    /// Returns `true` if the frame carried none of the counters.
    pub fn is_empty(&self) -> bool {
        self.game_no.is_none() && self.players.is_none() && self.derash.is_none()
    }
}

// ── Payloads ────────────────────────────────────────────────────────

/// Full room state, sent on every (re)connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_active: Option<bool>,
    #[serde(
        default,
        deserialize_with = "seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub seconds_left: Option<i64>,
    #[serde(default, deserialize_with = "numbers")]
    pub called_numbers: Vec<u8>,
    #[serde(default, deserialize_with = "numbers")]
    pub reserved_numbers: Vec<u8>,
    /// Session identity assigned by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "number")]
    pub selected_number: Option<u8>,
    /// Flat row-major 5×5 card, `0` marking the free cell.
    #[serde(default, deserialize_with = "numbers")]
    pub playboard: Vec<u8>,
    #[serde(default, deserialize_with = "numbers")]
    pub marked_numbers: Vec<u8>,
}

/// A reservation changed; names the session whose selection changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentPayload {
    #[serde(default, deserialize_with = "numbers")]
    pub reserved_numbers: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "number")]
    pub selected_number: Option<u8>,
    #[serde(default, deserialize_with = "numbers")]
    pub playboard: Vec<u8>,
    #[serde(default, deserialize_with = "numbers")]
    pub marked_numbers: Vec<u8>,
}

/// The round was won.
///
/// `winning_cells` is index-aligned with `winner_ids`: entry `i` holds the
/// `[row, col]` pairs of winner `i`'s own card. Rooms that announce a single
/// `winner_id` with a flat cell list decode to the same one-winner shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WinPayload {
    #[serde(default, alias = "winner_id", deserialize_with = "winner_ids")]
    pub winner_ids: Vec<String>,
    #[serde(
        default,
        deserialize_with = "number",
        skip_serializing_if = "Option::is_none"
    )]
    pub winning_number: Option<u8>,
    #[serde(default, deserialize_with = "winning_cells")]
    pub winning_cells: Vec<Vec<[u8; 2]>>,
}

// ── Server events ───────────────────────────────────────────────────

/// Frames sent from the room server to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full snapshot of the room.
    Init(SnapshotPayload),
    /// Reservation window tick with the current reservations.
    Reservation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reservation_active: Option<bool>,
        #[serde(default, deserialize_with = "numbers")]
        reserved_numbers: Vec<u8>,
        #[serde(
            default,
            deserialize_with = "seconds",
            skip_serializing_if = "Option::is_none"
        )]
        seconds_left: Option<i64>,
    },
    /// The reservation window closed; drawing begins.
    ReservationEnd {
        #[serde(
            default,
            deserialize_with = "seconds",
            skip_serializing_if = "Option::is_none"
        )]
        seconds_left: Option<i64>,
    },
    /// A number was drawn.
    NumberCalled {
        #[serde(
            default,
            deserialize_with = "number",
            skip_serializing_if = "Option::is_none"
        )]
        number: Option<u8>,
        #[serde(default, deserialize_with = "numbers")]
        called_numbers: Vec<u8>,
        #[serde(
            default,
            deserialize_with = "seconds",
            skip_serializing_if = "Option::is_none"
        )]
        seconds_left: Option<i64>,
    },
    /// Some player's reservation changed.
    NumberReserved(AssignmentPayload),
    /// Server-confirmed marks for this session.
    MarkedNumbers {
        #[serde(default, deserialize_with = "numbers")]
        marked_numbers: Vec<u8>,
    },
    /// The round was won.
    Winner(WinPayload),
    /// Someone won; sent ahead of or alongside [`ServerEvent::Winner`].
    WinnerAnnouncement,
    /// A new round started.
    NewRound {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The reservation window closed with nobody playing.
    NoPlayers {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The round was cancelled and stakes returned.
    Refund {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The round was cancelled.
    RoundCancelled {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Server-declared error text.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Any frame type this client does not understand.
    #[serde(other)]
    Unknown,
}

/// Classification of a round-reset frame.
///
/// Used for messaging only; it says nothing about whether money moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    NewRound,
    NoPlayers,
    Refund,
    Cancelled,
}

impl ServerEvent {
    /// Returns the reset classification if this frame resets the round.
    pub fn reset_reason(&self) -> Option<(ResetReason, Option<&str>)> {
        match self {
            Self::NewRound { message } => Some((ResetReason::NewRound, message.as_deref())),
            Self::NoPlayers { message } => Some((ResetReason::NoPlayers, message.as_deref())),
            Self::Refund { message } => Some((ResetReason::Refund, message.as_deref())),
            Self::RoundCancelled { message } => {
                Some((ResetReason::Cancelled, message.as_deref()))
            }
            _ => None,
        }
    }

    /// Wire name of the frame, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Reservation { .. } => "reservation",
            Self::ReservationEnd { .. } => "reservation_end",
            Self::NumberCalled { .. } => "number_called",
            Self::NumberReserved(_) => "number_reserved",
            Self::MarkedNumbers { .. } => "marked_numbers",
            Self::Winner(_) => "winner",
            Self::WinnerAnnouncement => "winner_announcement",
            Self::NewRound { .. } => "new_round",
            Self::NoPlayers { .. } => "no_players",
            Self::Refund { .. } => "refund",
            Self::RoundCancelled { .. } => "round_cancelled",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }
}

/// A decoded inbound frame: the event plus any room counters it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub event: ServerEvent,
    pub counters: RoomCounters,
}

impl InboundFrame {
    /// Wrap an event that carries no counters.
    pub fn new(event: ServerEvent) -> Self {
        Self {
            event,
            counters: RoomCounters::default(),
        }
    }

    /// Attach room counters.
    #[must_use]
    pub fn with_counters(mut self, counters: RoomCounters) -> Self {
        self.counters = counters;
        self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::Serialization`](crate::BingoError::Serialization)
    /// if the text is not a JSON object with a recognisable shape. Malformed
    /// counters are logged and dropped without failing the frame.
    pub fn parse(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let event = ServerEvent::deserialize(&value)?;
        let counters = RoomCounters::deserialize(&value).unwrap_or_else(|e| {
            warn!(kind = event.kind(), "ignoring malformed room counters: {e}");
            RoomCounters::default()
        });
        Ok(Self { event, counters })
    }

    /// Encode back into a single JSON object, counters merged at top level.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if either half fails to encode.
    pub fn encode(&self) -> Result<String> {
        let mut value = serde_json::to_value(&self.event)?;
        if let (Some(obj), serde_json::Value::Object(extra)) =
            (value.as_object_mut(), serde_json::to_value(&self.counters)?)
        {
            obj.extend(extra);
        }
        Ok(serde_json::to_string(&value)?)
    }
}

// ── Client intents ──────────────────────────────────────────────────

/// Messages sent from the client to the room server.
///
/// All intents are one-way: the server answers, if at all, with a later
/// broadcast rather than a correlated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientIntent {
    /// Reserve (or, if already held, release) a number.
    SelectNumber { number: u8 },
    /// Mark a called number on this session's card.
    MarkNumber { number: u8 },
    /// Claim a completed line.
    BingoClaim,
}

// ── Lobby status ────────────────────────────────────────────────────

/// Per-stake occupancy as reported by the lobby status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StakeStatus {
    #[serde(default)]
    pub reservation_active: bool,
    #[serde(default)]
    pub seconds_left: i64,
    #[serde(default)]
    pub players: u32,
    #[serde(default)]
    pub derash: f64,
    #[serde(default, deserialize_with = "game_no")]
    pub game_no: Option<String>,
}

/// Decode the lobby status body, keyed by stake amount.
///
/// # Errors
///
/// Returns a serialization error if the body is not an object of stake keys.
pub fn parse_lobby_status(body: &str) -> Result<BTreeMap<u32, StakeStatus>> {
    Ok(serde_json::from_str(body)?)
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

    #[test]
    fn null_fields_decode_as_empty() {
        let frame = InboundFrame::parse(
            r#"{"type":"number_reserved","reserved_numbers":null,"user_id":"7","selected_number":null,"playboard":null}"#,
        )
        .unwrap();
        let ServerEvent::NumberReserved(p) = frame.event else {
            panic!("expected number_reserved");
        };
        assert!(p.reserved_numbers.is_empty());
        assert!(p.playboard.is_empty());
        assert_eq!(p.selected_number, None);
        assert_eq!(p.user_id.as_deref(), Some("7"));
    }

    #[test]
    fn counters_ride_along_on_any_frame() {
        let frame = InboundFrame::parse(
            r#"{"type":"reservation","seconds_left":12,"players":3,"derash":30.0,"game_no":"000042"}"#,
        )
        .unwrap();
        assert_eq!(frame.counters.players, Some(3));
        assert_eq!(frame.counters.derash, Some(30.0));
        assert_eq!(frame.counters.game_no.as_deref(), Some("000042"));
    }

    #[test]
    fn malformed_counters_do_not_drop_the_event() {
        let frame =
            InboundFrame::parse(r#"{"type":"marked_numbers","marked_numbers":[4],"players":"many"}"#)
                .unwrap();
        assert!(frame.counters.is_empty());
        assert_eq!(
            frame.event,
            ServerEvent::MarkedNumbers {
                marked_numbers: vec![4]
            }
        );
    }

    #[test]
    fn out_of_range_numbers_are_dropped_not_fatal() {
        let frame = InboundFrame::parse(
            r#"{"type":"init","reservation_active":false,"seconds_left":2.7,
                "called_numbers":[4,300,-1,"9",12],"selected_number":999,
                "playboard":{"bad":true},"marked_numbers":[4]}"#,
        )
        .unwrap();
        let ServerEvent::Init(snapshot) = frame.event else {
            panic!("expected init");
        };
        assert_eq!(snapshot.called_numbers, vec![4, 12]);
        assert_eq!(snapshot.selected_number, None);
        assert!(snapshot.playboard.is_empty());
        assert_eq!(snapshot.marked_numbers, vec![4]);
        assert_eq!(snapshot.seconds_left, Some(2));
    }

    #[test]
    fn flat_winning_cells_belong_to_the_single_winner() {
        let frame = InboundFrame::parse(
            r#"{"type":"winner","winner_id":"u1","winning_number":7,"winning_cells":[[0,0],[1,1]]}"#,
        )
        .unwrap();
        let ServerEvent::Winner(win) = frame.event else {
            panic!("expected winner");
        };
        assert_eq!(win.winner_ids, vec!["u1"]);
        assert_eq!(win.winning_cells, vec![vec![[0, 0], [1, 1]]]);
    }

    #[test]
    fn malformed_winner_entry_keeps_alignment() {
        let frame = InboundFrame::parse(
            r#"{"type":"winner","winner_ids":["a","b"],"winning_cells":[null,[[4,4],[9]]]}"#,
        )
        .unwrap();
        let ServerEvent::Winner(win) = frame.event else {
            panic!("expected winner");
        };
        assert_eq!(win.winning_cells, vec![vec![], vec![[4, 4]]]);
    }

    #[test]
    fn unknown_type_decodes_to_unknown() {
        let frame = InboundFrame::parse(r#"{"type":"jackpot","amount":5}"#).unwrap();
        assert_eq!(frame.event, ServerEvent::Unknown);
    }

    #[test]
    fn non_object_frame_is_an_error() {
        assert!(InboundFrame::parse("[1,2,3]").is_err());
        assert!(InboundFrame::parse("not json").is_err());
    }

    #[test]
    fn reset_reason_classification() {
        let refund = ServerEvent::Refund {
            message: Some("back".into()),
        };
        assert_eq!(
            refund.reset_reason(),
            Some((ResetReason::Refund, Some("back")))
        );
        assert_eq!(ServerEvent::WinnerAnnouncement.reset_reason(), None);
    }

    #[test]
    fn intents_use_flat_type_tag() {
        let json = serde_json::to_string(&ClientIntent::MarkNumber { number: 7 }).unwrap();
        assert_eq!(json, r#"{"type":"mark_number","number":7}"#);
        let json = serde_json::to_string(&ClientIntent::BingoClaim).unwrap();
        assert_eq!(json, r#"{"type":"bingo_claim"}"#);
    }

    #[test]
    fn encode_merges_counters() {
        let frame = InboundFrame::new(ServerEvent::NewRound { message: None }).with_counters(
            RoomCounters {
                game_no: Some("000003".into()),
                ..Default::default()
            },
        );
        let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "new_round");
        assert_eq!(value["game_no"], "000003");
        assert_eq!(InboundFrame::parse(&frame.encode().unwrap()).unwrap(), frame);
    }

    #[test]
    fn lobby_status_accepts_numeric_game_no() {
        let body = r#"{
            "10": {"reservation_active": true, "seconds_left": 41, "players": 2, "derash": 20.0, "game_no": 17},
            "50": {"reservation_active": false, "seconds_left": 0, "players": 9, "derash": 450.0, "game_no": "000008"}
        }"#;
        let status = parse_lobby_status(body).unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status[&10].game_no.as_deref(), Some("000017"));
        assert!(!status[&50].reservation_active);
        assert_eq!(status[&50].players, 9);
    }
}
