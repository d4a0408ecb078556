#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for stake bingo client integration tests.
//!
//! Provides a channel-backed [`MockTransport`] with a [`MockRoom`] handle for
//! pushing frames mid-test, a scripted [`MockConnector`], and builders for
//! raw wire frames.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use stake_bingo_client::{BingoError, BingoEvent, Connector, RoundView, Transport};
use tokio::sync::{mpsc, watch};

/// Upper bound for any single wait in the integration tests.
pub const TIMEOUT: Duration = Duration::from_secs(5);

type Frame = Option<Result<String, BingoError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-backed mock transport.
///
/// Frames queued on the paired [`MockRoom`] are delivered in order by
/// `recv()`. `None` signals a clean close. Once the room handle is dropped
/// and the queue is empty, `recv()` hangs so the session loop stays alive.
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Frame>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

/// Test-side handle of one [`MockTransport`].
#[derive(Clone)]
pub struct MockRoom {
    tx: mpsc::UnboundedSender<Frame>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a transport pre-loaded with `script`.
    pub fn new(script: Vec<Frame>) -> (Self, MockRoom) {
        let (tx, incoming) = mpsc::unbounded_channel();
        for frame in script {
            tx.send(frame).unwrap();
        }
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, MockRoom { tx, sent, closed })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), BingoError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BingoError::TransportClosed);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, BingoError>> {
        match self.incoming.recv().await {
            Some(frame) => frame,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), BingoError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl MockRoom {
    /// Deliver a text frame. Silently dropped once the transport is gone.
    pub fn push(&self, frame: String) {
        let _ = self.tx.send(Some(Ok(frame)));
    }

    /// Close the link from the room side.
    pub fn hang_up(&self) {
        let _ = self.tx.send(None);
    }

    /// Fail the link with a receive error.
    pub fn fail(&self, reason: &str) {
        let _ = self
            .tx
            .send(Some(Err(BingoError::TransportReceive(reason.into()))));
    }

    /// Everything the client sent, decoded.
    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Wait until the client has sent `intent`.
    pub async fn wait_sent(&self, intent: Value) {
        tokio::time::timeout(TIMEOUT, async {
            while !self.sent().contains(&intent) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("intent {intent} was never sent; sent: {:?}", self.sent()));
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// A connector that hands out queued links in order and records every
/// stake it was asked to dial. An empty queue refuses the connection.
#[derive(Clone, Default)]
pub struct MockConnector {
    links: Arc<StdMutex<VecDeque<Result<MockTransport, BingoError>>>>,
    dialed: Arc<StdMutex<Vec<u32>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a link that will deliver `script` first.
    pub fn push_link(&self, script: Vec<Frame>) -> MockRoom {
        let (transport, room) = MockTransport::new(script);
        self.links.lock().unwrap().push_back(Ok(transport));
        room
    }

    /// Queue a refused connection attempt.
    pub fn push_failure(&self) {
        self.links.lock().unwrap().push_back(Err(refused()));
    }

    pub fn dialed(&self) -> Vec<u32> {
        self.dialed.lock().unwrap().clone()
    }
}

fn refused() -> BingoError {
    BingoError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "mock room refused",
    ))
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&mut self, stake: u32) -> Result<MockTransport, BingoError> {
        self.dialed.lock().unwrap().push(stake);
        self.links
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(refused()))
    }
}

// ── Waiting helpers ─────────────────────────────────────────────────

/// Wait until the published view satisfies `pred` and return it.
pub async fn wait_view(
    rx: &mut watch::Receiver<RoundView>,
    pred: impl FnMut(&RoundView) -> bool,
) -> RoundView {
    tokio::time::timeout(TIMEOUT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for view")
        .expect("view channel closed")
        .clone()
}

/// Receive events until one matches `pred`, skipping the rest.
pub async fn next_event(
    events: &mut mpsc::Receiver<BingoEvent>,
    mut pred: impl FnMut(&BingoEvent) -> bool,
) -> BingoEvent {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

// ── Wire frame builders ─────────────────────────────────────────────

/// Card with B 1-5, I 16-20, N 31-35, G 46-50, O 61-65 laid out by column
/// and the free cell at the center.
pub fn card_cells() -> Vec<u8> {
    let mut cells = Vec::with_capacity(25);
    for r in 0..5u8 {
        for c in 0..5u8 {
            cells.push(if r == 2 && c == 2 { 0 } else { 1 + c * 15 + r });
        }
    }
    cells
}

pub fn frame(value: Value) -> Frame {
    Some(Ok(value.to_string()))
}

/// Snapshot with no selection.
pub fn init_json(user_id: &str, reservation_active: bool, seconds_left: i64) -> Value {
    json!({
        "type": "init",
        "reservation_active": reservation_active,
        "seconds_left": seconds_left,
        "called_numbers": [],
        "reserved_numbers": [],
        "user_id": user_id,
        "selected_number": null,
        "playboard": [],
        "marked_numbers": [],
        "game_no": "000007",
        "players": 0,
        "derash": 0.0
    })
}

/// Drawing-phase snapshot for a session holding `selected` with the sample card.
pub fn init_drawing_json(user_id: &str, selected: u8, called: &[u8], marked: &[u8]) -> Value {
    json!({
        "type": "init",
        "reservation_active": false,
        "seconds_left": 3,
        "called_numbers": called,
        "reserved_numbers": [selected],
        "user_id": user_id,
        "selected_number": selected,
        "playboard": card_cells(),
        "marked_numbers": marked
    })
}

pub fn number_reserved_json(user_id: &str, selected: Option<u8>, reserved: &[u8]) -> Value {
    json!({
        "type": "number_reserved",
        "reserved_numbers": reserved,
        "user_id": user_id,
        "selected_number": selected,
        "playboard": if selected.is_some() { card_cells() } else { vec![] },
        "marked_numbers": [],
        "players": reserved.len(),
        "derash": 20.0 * reserved.len() as f64
    })
}

pub fn reservation_end_json(seconds_left: i64) -> Value {
    json!({ "type": "reservation_end", "seconds_left": seconds_left })
}

pub fn number_called_json(number: u8, called: &[u8]) -> Value {
    json!({
        "type": "number_called",
        "number": number,
        "called_numbers": called,
        "seconds_left": 3
    })
}

pub fn marked_numbers_json(marked: &[u8]) -> Value {
    json!({ "type": "marked_numbers", "marked_numbers": marked })
}

pub fn winner_json(winner_ids: &[&str], winning_number: u8, cells: Value) -> Value {
    json!({
        "type": "winner",
        "winner_ids": winner_ids,
        "winning_number": winning_number,
        "winning_cells": cells
    })
}

/// Any of `new_round`, `no_players`, `refund`, `round_cancelled`.
pub fn reset_json(kind: &str, message: Option<&str>) -> Value {
    json!({ "type": kind, "message": message })
}

pub fn error_json(message: &str) -> Value {
    json!({ "type": "error", "message": message })
}

pub fn select_intent(number: u8) -> Value {
    json!({ "type": "select_number", "number": number })
}

pub fn mark_intent(number: u8) -> Value {
    json!({ "type": "mark_number", "number": number })
}
