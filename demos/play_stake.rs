//! # Play Stake Example
//!
//! Joins one stake room over WebSocket and plays a round on auto-play:
//!
//! 1. Print the lobby status URL for the configured server
//! 2. Join the stake room and wait for the snapshot
//! 3. Pick the first free number once the reservation window is open and
//!    print the card the room assigns
//! 4. Let auto-play mark called numbers and claim when a line completes
//! 5. Shut down gracefully on Ctrl+C or when the round ends
//!
//! ## Running
//!
//! ```sh
//! BINGO_URL=http://localhost:8000 BINGO_TOKEN=... BINGO_STAKE=10 \
//!     cargo run --example play_stake
//! ```

use stake_bingo_client::{
    BingoClient, BingoConfig, BingoEvent, Phase, RoundView, WebSocketConnector,
};

/// Default server URL when `BINGO_URL` is not set.
const DEFAULT_URL: &str = "http://localhost:8000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("BINGO_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let stake: u32 = std::env::var("BINGO_STAKE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    let mut config = BingoConfig::new(url).with_max_reconnect_attempts(5);
    if let Ok(token) = std::env::var("BINGO_TOKEN") {
        config = config.with_token(token);
    }
    tracing::info!("Lobby status: {}", config.status_url());

    // ── Start ───────────────────────────────────────────────────────
    let connector = WebSocketConnector::new(&config);
    let (mut client, mut event_rx) = BingoClient::start(connector, config);
    client.set_auto_play(true)?;
    client.join_stake(stake)?;

    let mut picked = false;
    let mut shown_card = false;
    let mut claimed = false;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    BingoEvent::Connected { stake } => {
                        tracing::info!("Connected to the {stake} room");
                    }

                    BingoEvent::RoundUpdated(view) => {
                        if !picked && view.phase == Phase::Reservation && view.session_id.is_some() {
                            if let Some(number) = first_free_number(&view) {
                                client.select_number(number)?;
                                tracing::info!("Picked number {number}");
                                picked = true;
                            }
                        }

                        if let (false, Some(card)) = (shown_card, view.card.as_ref()) {
                            for row in card.cells().chunks(5) {
                                tracing::info!("{row:>3?}");
                            }
                            shown_card = true;
                        }

                        if view.claim_ready && !claimed {
                            client.claim_bingo()?;
                            tracing::info!("Line complete, claiming bingo");
                            claimed = true;
                        }

                        if view.phase == Phase::RoundEnd {
                            if view.is_winner {
                                tracing::info!("We won on {:?}!", view.winning_number);
                            } else {
                                tracing::info!("Round won by {:?}", view.winners);
                            }
                            break;
                        }
                    }

                    BingoEvent::Notice(notice) => {
                        tracing::info!("[{:?}] {}", notice.kind, notice.message);
                    }

                    BingoEvent::IntentFailed { intent, error } => {
                        tracing::warn!("{intent} failed: {error}");
                    }

                    BingoEvent::Reconnecting { attempt, next_in } => {
                        tracing::warn!("Reconnecting (attempt {attempt}) in {next_in:?}");
                    }

                    BingoEvent::GaveUp { attempts } => {
                        tracing::error!("Gave up after {attempts} attempt(s)");
                        break;
                    }

                    BingoEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Shutdown ────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down cleanly");
    Ok(())
}

fn first_free_number(view: &RoundView) -> Option<u8> {
    (1..=75u8).find(|n| !view.reserved_numbers.contains(n))
}
