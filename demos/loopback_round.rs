//! # Loopback Round Example
//!
//! Shows how to implement [`Transport`] and [`Connector`] with in-process
//! channels and plays a scripted round against a fake room. Useful for
//! testing a front end without a server, or as a template for other
//! backends.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_round
//! ```

use async_trait::async_trait;
use serde_json::json;
use stake_bingo_client::{
    BingoClient, BingoConfig, BingoError, BingoEvent, Connector, Phase, Transport,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: A channel-backed transport
// ─────────────────────────────────────────────────────────────────────

/// Client half of the loopback. Handed out by [`LoopbackConnector`].
pub struct LoopbackTransport {
    /// Intents the client sends go here.
    tx: mpsc::UnboundedSender<String>,
    /// Frames the fake room sends arrive here.
    rx: mpsc::UnboundedReceiver<String>,
}

/// Room half of the loopback.
pub struct FakeRoom {
    /// Intents sent by the client.
    pub rx: mpsc::UnboundedReceiver<String>,
    /// Frames for the client.
    pub tx: mpsc::UnboundedSender<String>,
}

fn loopback_pair() -> (LoopbackTransport, FakeRoom) {
    let (client_tx, room_rx) = mpsc::unbounded_channel();
    let (room_tx, client_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        },
        FakeRoom {
            rx: room_rx,
            tx: room_tx,
        },
    )
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), BingoError> {
        self.tx
            .send(message)
            .map_err(|e| BingoError::TransportSend(e.to_string()))
    }

    /// Cancel-safe because `UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<String, BingoError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), BingoError> {
        self.rx.close();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: A connector that hands out one prepared link
// ─────────────────────────────────────────────────────────────────────

struct LoopbackConnector {
    link: Option<LoopbackTransport>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&mut self, stake: u32) -> Result<LoopbackTransport, BingoError> {
        tracing::info!("Dialing the {stake} room");
        self.link.take().ok_or(BingoError::TransportClosed)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Script a round
// ─────────────────────────────────────────────────────────────────────

/// Card with B 1-5, I 16-20, N 31-35, G 46-50, O 61-65 and a free center.
fn demo_card() -> Vec<u8> {
    (0..5u8)
        .flat_map(|r| (0..5u8).map(move |c| if r == 2 && c == 2 { 0 } else { 1 + c * 15 + r }))
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, mut room) = loopback_pair();
    let connector = LoopbackConnector {
        link: Some(transport),
    };
    let config = BingoConfig::new("http://loopback.invalid").with_max_reconnect_attempts(0);
    let (mut client, mut event_rx) = BingoClient::start(connector, config);
    let mut view_rx = client.subscribe_view();

    client.set_auto_play(true)?;
    client.join_stake(10)?;

    // ── Reservation ─────────────────────────────────────────────────
    room.tx.send(
        json!({
            "type": "init",
            "reservation_active": true,
            "seconds_left": 30,
            "called_numbers": [],
            "reserved_numbers": [],
            "user_id": "demo",
            "selected_number": null,
            "game_no": "000001"
        })
        .to_string(),
    )?;
    view_rx.wait_for(|v| v.phase == Phase::Reservation).await?;

    client.select_number(12)?;
    let Some(intent) = room.rx.recv().await else {
        return Err("client hung up before selecting".into());
    };
    tracing::info!("Room received: {intent}");

    room.tx.send(
        json!({
            "type": "number_reserved",
            "reserved_numbers": [12],
            "user_id": "demo",
            "selected_number": 12,
            "playboard": demo_card(),
            "players": 1,
            "derash": 10.0
        })
        .to_string(),
    )?;
    room.tx
        .send(json!({ "type": "reservation_end", "seconds_left": 3 }).to_string())?;

    // ── Drawing ─────────────────────────────────────────────────────
    // Row three of the demo card, around the free center.
    let mut called = Vec::new();
    for number in [3u8, 18, 48, 63] {
        called.push(number);
        room.tx.send(
            json!({
                "type": "number_called",
                "number": number,
                "called_numbers": called,
                "seconds_left": 3
            })
            .to_string(),
        )?;

        // Auto-play answers every call with a mark; confirm it.
        let Some(intent) = room.rx.recv().await else {
            return Err("client hung up while marking".into());
        };
        tracing::info!("Room received: {intent}");
        room.tx.send(
            json!({ "type": "marked_numbers", "marked_numbers": called }).to_string(),
        )?;
    }

    view_rx.wait_for(|v| v.claim_ready).await?;
    client.claim_bingo()?;
    let Some(intent) = room.rx.recv().await else {
        return Err("client hung up before claiming".into());
    };
    tracing::info!("Room received: {intent}");

    room.tx.send(
        json!({
            "type": "winner",
            "winner_ids": ["demo"],
            "winning_number": 63,
            "winning_cells": [[[2, 0], [2, 1], [2, 2], [2, 3], [2, 4]]]
        })
        .to_string(),
    )?;
    let view = view_rx.wait_for(|v| v.phase == Phase::RoundEnd).await?.clone();
    tracing::info!(
        "Round over: winner={} cells={:?}",
        view.is_winner,
        view.winning_cells
    );

    // ── Shutdown ────────────────────────────────────────────────────
    client.shutdown().await;
    while let Some(event) = event_rx.recv().await {
        if let BingoEvent::Disconnected { reason } = event {
            tracing::info!("Disconnected: {}", reason.as_deref().unwrap_or("clean"));
        }
    }
    Ok(())
}
