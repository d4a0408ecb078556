#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire protocol tests for the stake bingo client.
//!
//! Decodes JSON fixtures shaped like real room server output for every frame
//! type, checks the flat `type` tag on outbound intents, and covers the
//! lobby status body.

use stake_bingo_client::protocol::{
    parse_lobby_status, ClientIntent, InboundFrame, ResetReason, RoomCounters, ServerEvent,
};

fn parse(json: &str) -> InboundFrame {
    InboundFrame::parse(json).expect("fixture should decode")
}

// ════════════════════════════════════════════════════════════════════
// Snapshot
// ════════════════════════════════════════════════════════════════════

#[test]
fn init_fixture_mid_round() {
    let frame = parse(
        r#"{
            "type": "init",
            "reservation_active": false,
            "seconds_left": 2,
            "called_numbers": [14, 33, 61],
            "reserved_numbers": [4, 9, 27],
            "user_id": "5f1c2a",
            "selected_number": 9,
            "playboard": [1,16,31,46,61,2,17,32,47,62,3,18,0,48,63,4,19,34,49,64,5,20,35,50,65],
            "marked_numbers": [61],
            "game_no": "000123",
            "players": 3,
            "derash": 60.0
        }"#,
    );
    let ServerEvent::Init(snapshot) = frame.event else {
        panic!("expected init, got {:?}", frame.event);
    };
    assert_eq!(snapshot.reservation_active, Some(false));
    assert_eq!(snapshot.seconds_left, Some(2));
    assert_eq!(snapshot.called_numbers, vec![14, 33, 61]);
    assert_eq!(snapshot.user_id.as_deref(), Some("5f1c2a"));
    assert_eq!(snapshot.selected_number, Some(9));
    assert_eq!(snapshot.playboard.len(), 25);
    assert_eq!(snapshot.playboard[12], 0);
    assert_eq!(snapshot.marked_numbers, vec![61]);

    assert_eq!(frame.counters.game_no.as_deref(), Some("000123"));
    assert_eq!(frame.counters.players, Some(3));
    assert_eq!(frame.counters.derash, Some(60.0));
}

#[test]
fn init_fixture_fresh_session() {
    let frame = parse(
        r#"{"type":"init","reservation_active":true,"seconds_left":47,"called_numbers":[],
            "reserved_numbers":[],"user_id":"ab12","selected_number":null,"playboard":null,
            "marked_numbers":null}"#,
    );
    let ServerEvent::Init(snapshot) = frame.event else {
        panic!("expected init");
    };
    assert_eq!(snapshot.selected_number, None);
    assert!(snapshot.playboard.is_empty());
    assert!(snapshot.marked_numbers.is_empty());
    assert!(frame.counters.is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Reservation window
// ════════════════════════════════════════════════════════════════════

#[test]
fn reservation_fixture() {
    let frame = parse(
        r#"{"type":"reservation","reservation_active":true,"reserved_numbers":[3,8],
            "seconds_left":41,"players":2,"derash":40.0}"#,
    );
    assert_eq!(
        frame.event,
        ServerEvent::Reservation {
            reservation_active: Some(true),
            reserved_numbers: vec![3, 8],
            seconds_left: Some(41),
        }
    );
    assert_eq!(frame.counters.players, Some(2));
}

#[test]
fn reservation_end_fixture() {
    let frame = parse(r#"{"type":"reservation_end","seconds_left":3}"#);
    assert_eq!(
        frame.event,
        ServerEvent::ReservationEnd {
            seconds_left: Some(3)
        }
    );
}

#[test]
fn number_reserved_fixture() {
    let frame = parse(
        r#"{"type":"number_reserved","reserved_numbers":[3,8,12],"user_id":"ab12",
            "selected_number":12,"playboard":[1,16,31,46,61,2,17,32,47,62,3,18,0,48,63,4,19,34,49,64,5,20,35,50,65],
            "marked_numbers":[],"players":3,"derash":60.0}"#,
    );
    let ServerEvent::NumberReserved(assignment) = frame.event else {
        panic!("expected number_reserved");
    };
    assert_eq!(assignment.reserved_numbers, vec![3, 8, 12]);
    assert_eq!(assignment.user_id.as_deref(), Some("ab12"));
    assert_eq!(assignment.selected_number, Some(12));
    assert_eq!(assignment.playboard.len(), 25);
    assert_eq!(frame.counters.derash, Some(60.0));
}

// ════════════════════════════════════════════════════════════════════
// Drawing
// ════════════════════════════════════════════════════════════════════

#[test]
fn number_called_fixture() {
    let frame = parse(
        r#"{"type":"number_called","number":42,"called_numbers":[7,42],"seconds_left":3}"#,
    );
    assert_eq!(
        frame.event,
        ServerEvent::NumberCalled {
            number: Some(42),
            called_numbers: vec![7, 42],
            seconds_left: Some(3),
        }
    );
}

#[test]
fn marked_numbers_fixture() {
    let frame = parse(r#"{"type":"marked_numbers","marked_numbers":[7,42]}"#);
    assert_eq!(
        frame.event,
        ServerEvent::MarkedNumbers {
            marked_numbers: vec![7, 42]
        }
    );
}

#[test]
fn winner_fixture_with_two_winners() {
    let frame = parse(
        r#"{"type":"winner","winner_ids":["ab12","cd34"],"winning_number":42,
            "winning_cells":[[[0,0],[1,1],[2,2],[3,3],[4,4]],[[2,0],[2,1],[2,2],[2,3],[2,4]]]}"#,
    );
    let ServerEvent::Winner(win) = frame.event else {
        panic!("expected winner");
    };
    assert_eq!(win.winner_ids, vec!["ab12", "cd34"]);
    assert_eq!(win.winning_number, Some(42));
    assert_eq!(win.winning_cells.len(), 2);
    assert_eq!(win.winning_cells[1][4], [2, 4]);
}

#[test]
fn winner_announcement_fixture() {
    let frame = parse(r#"{"type":"winner_announcement","winner_ids":["ab12"]}"#);
    assert_eq!(frame.event, ServerEvent::WinnerAnnouncement);
}

// ════════════════════════════════════════════════════════════════════
// Resets and errors
// ════════════════════════════════════════════════════════════════════

#[test]
fn reset_fixtures_classify() {
    let cases = [
        (r#"{"type":"new_round"}"#, ResetReason::NewRound, None),
        (
            r#"{"type":"no_players","message":"Waiting for players"}"#,
            ResetReason::NoPlayers,
            Some("Waiting for players"),
        ),
        (
            r#"{"type":"refund","message":"Only one player joined"}"#,
            ResetReason::Refund,
            Some("Only one player joined"),
        ),
        (
            r#"{"type":"round_cancelled","message":null}"#,
            ResetReason::Cancelled,
            None,
        ),
    ];
    for (json, reason, message) in cases {
        let frame = parse(json);
        assert_eq!(
            frame.event.reset_reason(),
            Some((reason, message)),
            "fixture {json}"
        );
    }
}

#[test]
fn error_fixture() {
    let frame = parse(r#"{"type":"error","message":"Number already reserved"}"#);
    assert_eq!(
        frame.event,
        ServerEvent::Error {
            message: Some("Number already reserved".into())
        }
    );
    assert_eq!(frame.event.reset_reason(), None);
}

#[test]
fn unrecognised_frame_types_do_not_fail() {
    let frame = parse(r#"{"type":"chat","text":"hello","players":9}"#);
    assert_eq!(frame.event, ServerEvent::Unknown);
    assert_eq!(frame.counters.players, Some(9));
}

#[test]
fn frames_without_a_type_are_errors() {
    assert!(InboundFrame::parse(r#"{"number":5}"#).is_err());
    assert!(InboundFrame::parse("[]").is_err());
    assert!(InboundFrame::parse("").is_err());
}

#[test]
fn numeric_game_no_is_zero_padded() {
    let frame = parse(r#"{"type":"new_round","game_no":42}"#);
    assert_eq!(
        frame.counters,
        RoomCounters {
            game_no: Some("000042".into()),
            players: None,
            derash: None,
        }
    );
}

// ════════════════════════════════════════════════════════════════════
// Outbound intents
// ════════════════════════════════════════════════════════════════════

#[test]
fn intents_match_server_expectations() {
    assert_eq!(
        serde_json::to_string(&ClientIntent::SelectNumber { number: 12 }).unwrap(),
        r#"{"type":"select_number","number":12}"#
    );
    assert_eq!(
        serde_json::to_string(&ClientIntent::MarkNumber { number: 42 }).unwrap(),
        r#"{"type":"mark_number","number":42}"#
    );
    assert_eq!(
        serde_json::to_string(&ClientIntent::BingoClaim).unwrap(),
        r#"{"type":"bingo_claim"}"#
    );
}

#[test]
fn encoded_frame_parses_back_with_counters() {
    let frame = parse(r#"{"type":"reservation_end","seconds_left":3,"game_no":"000009","players":4}"#);
    let again = InboundFrame::parse(&frame.encode().unwrap()).unwrap();
    assert_eq!(again, frame);
}

// ════════════════════════════════════════════════════════════════════
// Lobby status
// ════════════════════════════════════════════════════════════════════

#[test]
fn lobby_status_fixture() {
    let body = r#"{
        "10": {"reservation_active": true, "seconds_left": 33, "players": 4, "derash": 40.0, "game_no": 118},
        "20": {"reservation_active": false, "seconds_left": 2, "players": 2, "derash": 40.0, "game_no": "000077"},
        "50": {}
    }"#;
    let status = parse_lobby_status(body).unwrap();
    assert_eq!(status.len(), 3);
    assert!(status[&10].reservation_active);
    assert_eq!(status[&10].game_no.as_deref(), Some("000118"));
    assert_eq!(status[&20].game_no.as_deref(), Some("000077"));
    assert_eq!(status[&50].players, 0);
    assert_eq!(status[&50].game_no, None);
}

#[test]
fn lobby_status_rejects_non_numeric_stakes() {
    assert!(parse_lobby_status(r#"{"ten": {}}"#).is_err());
}
