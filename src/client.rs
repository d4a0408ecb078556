//! Async client for stake bingo rooms.
//!
//! [`BingoClient`] is a thin handle that talks to a background session task
//! over an unbounded MPSC channel. The session task owns the room connection
//! and the [`RoundSynchronizer`], and it is the only place either is touched:
//! server frames, countdown ticks, notice expiries and player commands all
//! arrive on one `tokio::select!` loop and are applied one at a time.
//!
//! Events are emitted on a bounded channel returned from
//! [`BingoClient::start`]. The latest [`RoundView`] is also published on a
//! watch channel.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = BingoConfig::new("https://bingo.example.com").with_token(token);
//! let connector = WebSocketConnector::new(&config);
//! let (mut client, mut events) = BingoClient::start(connector, config);
//!
//! client.join_stake(20)?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         BingoEvent::RoundUpdated(view) => render(&view),
//!         BingoEvent::GaveUp { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::countdown::{Countdown, Tick};
use crate::error::{BingoError, IntentRejection, Result};
use crate::event::{BingoEvent, ConnectionStatus, IntentKind};
use crate::notice::Notice;
use crate::protocol::{ClientIntent, InboundFrame};
use crate::round::{Effect, RoundSynchronizer, RoundTiming, RoundView, SyncSettings};
use crate::transport::{Connector, Transport};
use crate::validator::MarkVerdict;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default delay between reconnection attempts.
const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);

/// Default limit for a single connection attempt.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stakes offered by default.
pub const DEFAULT_STAKES: [u32; 3] = [10, 20, 50];

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`BingoClient`].
///
/// Only `server_url` is required; everything else has a default.
///
/// # Example
///
/// ```
/// use stake_bingo_client::client::BingoConfig;
/// use std::time::Duration;
///
/// let config = BingoConfig::new("https://bingo.example.com")
///     .with_token("secret")
///     .with_reconnect_interval(Duration::from_secs(5))
///     .with_max_reconnect_attempts(10);
/// assert_eq!(config.allowed_stakes, vec![10, 20, 50]);
/// assert_eq!(
///     config.room_url(10),
///     "wss://bingo.example.com/bingo/ws?token=secret&stake=10"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct BingoConfig {
    /// Server base URL. `http`/`https` and `ws`/`wss` are both accepted.
    pub server_url: String,
    /// Session token passed to the room. Inserted into the URL as is.
    pub token: Option<String>,
    /// Stakes that may be joined. Defaults to **10, 20, 50**.
    pub allowed_stakes: Vec<u32>,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer falls behind, events are dropped with a warning so
    /// the session loop never blocks. `Disconnected` and `GaveUp` are always
    /// delivered. The watch channel always holds the latest view regardless.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the session loop gets to close the room connection on
    /// [`BingoClient::shutdown`] before it is aborted. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Fixed delay between reconnection attempts. Defaults to **3 seconds**.
    pub reconnect_interval: Duration,
    /// Give up after this many consecutive failed reconnections.
    /// `None` (the default) retries forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Limit for one connection attempt. Defaults to **10 seconds**.
    pub connect_timeout: Duration,
    /// Countdown fallbacks for frames without `seconds_left`.
    pub timing: RoundTiming,
    /// Lifetime of error notices. Defaults to **3 seconds**.
    pub error_notice_ttl: Duration,
    /// Lifetime of announcements. Defaults to **5 seconds**.
    pub announcement_ttl: Duration,
}

impl BingoConfig {
    /// Create a configuration for `server_url` with default values.
    pub fn new(server_url: impl Into<String>) -> Self {
        let sync = SyncSettings::default();
        Self {
            server_url: server_url.into(),
            token: None,
            allowed_stakes: DEFAULT_STAKES.to_vec(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timing: sync.timing,
            error_notice_ttl: sync.error_notice_ttl,
            announcement_ttl: sync.announcement_ttl,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_allowed_stakes(mut self, stakes: impl IntoIterator<Item = u32>) -> Self {
        self.allowed_stakes = stakes.into_iter().collect();
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// A zero timeout aborts the session loop immediately on shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: RoundTiming) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn with_error_notice_ttl(mut self, ttl: Duration) -> Self {
        self.error_notice_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_announcement_ttl(mut self, ttl: Duration) -> Self {
        self.announcement_ttl = ttl;
        self
    }

    pub fn is_allowed_stake(&self, stake: u32) -> bool {
        self.allowed_stakes.contains(&stake)
    }

    /// WebSocket URL of the room for `stake`.
    pub fn room_url(&self, stake: u32) -> String {
        let base = with_scheme(&self.server_url, "ws://", "wss://");
        match &self.token {
            Some(token) => format!("{base}/bingo/ws?token={token}&stake={stake}"),
            None => format!("{base}/bingo/ws?stake={stake}"),
        }
    }

    /// HTTP URL of the per-stake lobby status endpoint.
    pub fn status_url(&self) -> String {
        let base = with_scheme(&self.server_url, "http://", "https://");
        format!("{base}/bingo/status")
    }

    fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            timing: self.timing,
            error_notice_ttl: self.error_notice_ttl,
            announcement_ttl: self.announcement_ttl,
        }
    }
}

/// Rewrite the scheme of `url` to `plain` or `secure`, keeping the security
/// level, and drop any trailing slash.
fn with_scheme(url: &str, plain: &str, secure: &str) -> String {
    let url = url.trim_end_matches('/');
    let (secure_scheme, rest) = if let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("wss://"))
    {
        (true, rest)
    } else if let Some(rest) = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("ws://"))
    {
        (false, rest)
    } else {
        return url.to_string();
    };
    let scheme = if secure_scheme { secure } else { plain };
    format!("{scheme}{rest}")
}

// ── Commands & shared state ─────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Command {
    Join(u32),
    Leave,
    Select(u8),
    Mark(u8),
    Claim,
    AutoPlay(bool),
}

/// Internal shared state between the client handle and the session loop.
struct ClientState {
    connected: AtomicBool,
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for stake bingo rooms.
///
/// Created via [`BingoClient::start`]. Methods queue a command for the
/// session loop and return immediately; outcomes arrive as [`BingoEvent`]s
/// and view updates.
pub struct BingoClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state: Arc<ClientState>,
    view_rx: watch::Receiver<RoundView>,
    allowed_stakes: Vec<u32>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl BingoClient {
    /// Spawn the session loop and return a handle plus event receiver.
    ///
    /// No room is joined until [`join_stake`](Self::join_stake) is called.
    /// Must be called from within a tokio runtime.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start<C: Connector>(
        connector: C,
        config: BingoConfig,
    ) -> (Self, mpsc::Receiver<BingoEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        // tokio panics on a zero-capacity channel.
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<BingoEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (view_tx, view_rx) = watch::channel(RoundView::default());
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let state = Arc::new(ClientState {
            connected: AtomicBool::new(false),
        });
        let allowed_stakes = config.allowed_stakes.clone();
        let shutdown_timeout = config.shutdown_timeout;

        let session = Session {
            connector,
            config,
            event_tx,
            view_tx,
            state: Arc::clone(&state),
            notice_tx,
            room: None,
            link: None,
            ticks: None,
            retry_at: None,
            status: ConnectionStatus::Idle,
            attempts: 0,
            epoch: 0,
            auto_play: false,
        };
        let task = tokio::spawn(session_loop(session, cmd_rx, notice_rx, shutdown_rx));

        let client = Self {
            cmd_tx,
            state,
            view_rx,
            allowed_stakes,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        };
        (client, event_rx)
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Join the room for `stake`, leaving the current room first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::UnknownStake`] if `stake` is not allowed, or
    /// [`BingoError::NotConnected`] if the client has shut down.
    pub fn join_stake(&self, stake: u32) -> Result<()> {
        if !self.allowed_stakes.contains(&stake) {
            return Err(BingoError::UnknownStake(stake));
        }
        self.send(Command::Join(stake))
    }

    /// Leave the current room. No reconnection is attempted afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::NotInRoom`] if no stake is joined.
    pub fn leave(&self) -> Result<()> {
        if self.current_stake().is_none() {
            return Err(BingoError::NotInRoom);
        }
        self.send(Command::Leave)
    }

    /// Pick a number during the reservation window. Picking the number
    /// already held releases it.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::NotConnected`] if no room connection is open.
    pub fn select_number(&self, number: u8) -> Result<()> {
        self.send_intent(Command::Select(number))
    }

    /// Mark the most recently called number.
    ///
    /// A wrong mark disqualifies the session for the rest of the round.
    /// Marks that are refused without disqualifying (free cell, nothing
    /// called yet, no card) are not sent and surface as
    /// [`BingoEvent::IntentFailed`].
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::NotConnected`] if no room connection is open.
    pub fn mark_number(&self, number: u8) -> Result<()> {
        self.send_intent(Command::Mark(number))
    }

    /// Claim bingo. The server decides whether the card wins.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::NotConnected`] if no room connection is open.
    pub fn claim_bingo(&self) -> Result<()> {
        self.send_intent(Command::Claim)
    }

    /// Mark every called number on the card automatically. The setting
    /// carries over to rooms joined later.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::NotConnected`] if the client has shut down.
    pub fn set_auto_play(&self, enabled: bool) -> Result<()> {
        self.send(Command::AutoPlay(enabled))
    }

    /// Shut down the client, closing the room connection and stopping the
    /// background task.
    pub async fn shutdown(&mut self) {
        debug!("BingoClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` while a room connection is open.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// Stake of the joined room, if any.
    pub fn current_stake(&self) -> Option<u32> {
        self.view_rx.borrow().stake
    }

    /// Latest published view.
    pub fn view(&self) -> RoundView {
        self.view_rx.borrow().clone()
    }

    /// Watch channel that always holds the latest view.
    pub fn subscribe_view(&self) -> watch::Receiver<RoundView> {
        self.view_rx.clone()
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn send_intent(&self, cmd: Command) -> Result<()> {
        if !self.is_connected() {
            return Err(BingoError::NotConnected);
        }
        self.send(cmd)
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| BingoError::NotConnected)
    }
}

impl std::fmt::Debug for BingoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BingoClient")
            .field("connected", &self.is_connected())
            .field("stake", &self.current_stake())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for BingoClient {
    fn drop(&mut self) {
        // No executor is available here to drive a graceful close.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session loop ────────────────────────────────────────────────────

/// State owned by the session loop.
struct Session<C: Connector> {
    connector: C,
    config: BingoConfig,
    event_tx: mpsc::Sender<BingoEvent>,
    view_tx: watch::Sender<RoundView>,
    state: Arc<ClientState>,
    /// Expiries tagged with the epoch they were scheduled in.
    notice_tx: mpsc::UnboundedSender<(u64, u64)>,
    room: Option<RoundSynchronizer>,
    link: Option<C::Transport>,
    /// Ticks of the current room's countdown. Replaced on every join.
    ticks: Option<mpsc::UnboundedReceiver<Tick>>,
    retry_at: Option<Instant>,
    status: ConnectionStatus,
    /// Consecutive failed connection attempts.
    attempts: u32,
    /// Bumped whenever the room is torn down.
    epoch: u64,
    auto_play: bool,
}

/// Background loop multiplexing commands, frames, ticks, notice expiries and
/// reconnection via `tokio::select!`.
///
/// Exits when the command channel closes or shutdown is signalled.
async fn session_loop<C: Connector>(
    mut session: Session<C>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut notice_rx: mpsc::UnboundedReceiver<(u64, u64)>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("session loop started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => session.handle_command(cmd).await,
                    None => {
                        debug!("command channel closed, shutting down session loop");
                        session.shut_down().await;
                        break;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                session.shut_down().await;
                break;
            }

            incoming = recv_frame(&mut session.link) => {
                session.handle_incoming(incoming).await;
            }

            tick = next_tick(&mut session.ticks) => {
                session.handle_tick(tick);
            }

            Some((epoch, id)) = notice_rx.recv() => {
                session.handle_notice_expired(epoch, id);
            }

            () = retry_deadline(session.retry_at) => {
                session.connect().await;
            }
        }
    }

    debug!("session loop exited");
}

async fn recv_frame<T: Transport>(link: &mut Option<T>) -> Option<Result<String>> {
    match link {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticks: &mut Option<mpsc::UnboundedReceiver<Tick>>) -> Tick {
    if let Some(rx) = ticks {
        if let Some(tick) = rx.recv().await {
            return tick;
        }
    }
    std::future::pending().await
}

async fn retry_deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl<C: Connector> Session<C> {
    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Join(stake) => self.join(stake).await,
            Command::Leave => {
                self.teardown(Some("left room")).await;
                self.set_status(ConnectionStatus::Idle);
                self.publish();
            }
            Command::Select(number) => {
                self.apply_intent(IntentKind::Select, |sync| sync.select_number(number))
                    .await;
            }
            Command::Mark(number) => {
                self.apply_intent(IntentKind::Mark, |sync| {
                    sync.mark_number(number)
                        .and_then(MarkVerdict::into_send_result)
                })
                .await;
            }
            Command::Claim => {
                self.apply_intent(IntentKind::Claim, RoundSynchronizer::claim_bingo)
                    .await;
            }
            Command::AutoPlay(enabled) => {
                self.auto_play = enabled;
                if let Some(sync) = self.room.as_mut() {
                    sync.set_auto_play(enabled);
                }
                self.flush().await;
            }
        }
    }

    async fn join(&mut self, stake: u32) {
        let same_room = self.room.as_ref().map(RoundSynchronizer::stake) == Some(stake);
        if same_room && self.status != ConnectionStatus::Disconnected {
            debug!(stake, "already in this room");
            return;
        }

        // Old link, synchronizer and countdown go before the new room exists.
        self.teardown(None).await;

        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let mut sync = RoundSynchronizer::new(
            stake,
            self.config.sync_settings(),
            Countdown::with_ticker(tick_tx),
        );
        sync.set_auto_play(self.auto_play);
        self.room = Some(sync);
        self.ticks = Some(tick_rx);
        info!(stake, "joining room");

        self.set_status(ConnectionStatus::Connecting);
        self.publish();
        self.connect().await;
    }

    /// Close the link and drop all room-scoped state.
    async fn teardown(&mut self, reason: Option<&str>) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close().await {
                debug!("closing room link failed: {e}");
            }
            self.state.connected.store(false, Ordering::Release);
            if let Some(reason) = reason {
                emit_blocking(&self.event_tx, BingoEvent::Disconnected {
                    reason: Some(reason.to_string()),
                })
                .await;
            }
        }
        self.room = None;
        self.ticks = None;
        self.retry_at = None;
        self.attempts = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }

    async fn connect(&mut self) {
        self.retry_at = None;
        let Some(stake) = self.room.as_ref().map(RoundSynchronizer::stake) else {
            return;
        };

        let attempt = tokio::time::timeout(self.config.connect_timeout, self.connector.connect(stake))
            .await
            .unwrap_or_else(|_elapsed| Err(BingoError::Timeout));

        match attempt {
            Ok(transport) => {
                info!(stake, after_failures = self.attempts, "room connected");
                self.link = Some(transport);
                self.attempts = 0;
                self.set_status(ConnectionStatus::Connected);
                self.emit(BingoEvent::Connected { stake });
                self.publish();
            }
            Err(e) => {
                warn!(stake, "connection attempt failed: {e}");
                self.schedule_retry().await;
            }
        }
    }

    async fn schedule_retry(&mut self) {
        if let Some(max) = self.config.max_reconnect_attempts {
            if self.attempts >= max {
                warn!(attempts = self.attempts, "giving up on reconnection");
                self.set_status(ConnectionStatus::Disconnected);
                emit_blocking(&self.event_tx, BingoEvent::GaveUp {
                    attempts: self.attempts,
                })
                .await;
                self.publish();
                return;
            }
        }

        self.attempts = self.attempts.saturating_add(1);
        let delay = self.config.reconnect_interval;
        self.retry_at = Some(Instant::now() + delay);
        debug!(attempt = self.attempts, ?delay, "reconnect scheduled");
        self.set_status(ConnectionStatus::Reconnecting {
            attempt: self.attempts,
        });
        self.emit(BingoEvent::Reconnecting {
            attempt: self.attempts,
            next_in: delay,
        });
        self.publish();
    }

    /// The link dropped on its own. Room state is kept so the snapshot that
    /// follows a reconnect can reconcile it.
    async fn link_lost(&mut self, reason: Option<String>) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close().await {
                debug!("closing failed link: {e}");
            }
        }
        self.state.connected.store(false, Ordering::Release);
        emit_blocking(&self.event_tx, BingoEvent::Disconnected { reason }).await;
        self.schedule_retry().await;
    }

    async fn handle_incoming(&mut self, incoming: Option<Result<String>>) {
        match incoming {
            Some(Ok(text)) => match InboundFrame::parse(&text) {
                Ok(frame) => {
                    if let Some(sync) = self.room.as_mut() {
                        sync.handle_frame(frame);
                    }
                    self.flush().await;
                }
                Err(e) => {
                    warn!("failed to decode room frame: {e} (raw: {text})");
                }
            },
            Some(Err(e)) => {
                error!("transport receive error: {e}");
                self.link_lost(Some(format!("transport receive error: {e}")))
                    .await;
            }
            None => {
                debug!("room closed the connection");
                self.link_lost(None).await;
            }
        }
    }

    fn handle_tick(&mut self, tick: Tick) {
        let changed = self
            .room
            .as_mut()
            .is_some_and(|sync| sync.handle_tick(tick));
        if changed {
            self.publish();
        }
    }

    fn handle_notice_expired(&mut self, epoch: u64, id: u64) {
        if epoch != self.epoch {
            return;
        }
        let removed = self
            .room
            .as_mut()
            .is_some_and(|sync| sync.expire_notice(id));
        if removed {
            self.publish();
        }
    }

    async fn apply_intent<F>(&mut self, intent: IntentKind, apply: F)
    where
        F: FnOnce(&mut RoundSynchronizer) -> std::result::Result<(), IntentRejection>,
    {
        let error = if self.room.is_none() {
            Some(BingoError::NotInRoom)
        } else if self.link.is_none() {
            // Applying it locally would record a mark that never reaches the room.
            Some(BingoError::NotConnected)
        } else {
            self.room
                .as_mut()
                .and_then(|sync| apply(sync).err())
                .map(BingoError::IntentRejected)
        };

        if let Some(error) = error {
            debug!(%intent, "intent failed: {error}");
            self.emit(BingoEvent::IntentFailed { intent, error });
        }
        self.flush().await;
    }

    /// Carry out queued effects, then publish the resulting view.
    async fn flush(&mut self) {
        let effects = self
            .room
            .as_mut()
            .map(RoundSynchronizer::take_effects)
            .unwrap_or_default();
        for effect in effects {
            match effect {
                Effect::Send(intent) => self.send_intent(intent).await,
                Effect::Notice(notice) => self.post_notice(notice),
            }
        }
        self.publish();
    }

    async fn send_intent(&mut self, intent: ClientIntent) {
        let kind = IntentKind::from(&intent);
        let Some(link) = self.link.as_mut() else {
            self.emit(BingoEvent::IntentFailed {
                intent: kind,
                error: BingoError::NotConnected,
            });
            return;
        };

        let json = match serde_json::to_string(&intent) {
            Ok(json) => json,
            Err(e) => {
                error!("failed to serialize intent: {e}");
                self.emit(BingoEvent::IntentFailed {
                    intent: kind,
                    error: e.into(),
                });
                return;
            }
        };

        debug!(intent = %kind, "sending intent");
        if let Err(e) = link.send(json).await {
            error!("transport send error: {e}");
            let reason = format!("transport send error: {e}");
            self.emit(BingoEvent::IntentFailed {
                intent: kind,
                error: e,
            });
            self.link_lost(Some(reason)).await;
        }
    }

    fn post_notice(&self, notice: Notice) {
        let tx = self.notice_tx.clone();
        let (epoch, id, ttl) = (self.epoch, notice.id, notice.ttl);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let _ = tx.send((epoch, id));
        });
        self.emit(BingoEvent::Notice(notice));
    }

    async fn shut_down(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close().await {
                debug!("closing room link failed: {e}");
            }
        }
        self.room = None;
        self.ticks = None;
        self.set_status(ConnectionStatus::Disconnected);
        emit_blocking(&self.event_tx, BingoEvent::Disconnected {
            reason: Some("client shut down".into()),
        })
        .await;
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
        self.state
            .connected
            .store(status.is_connected(), Ordering::Release);
    }

    fn current_view(&self) -> RoundView {
        let mut view = self
            .room
            .as_ref()
            .map(RoundSynchronizer::view)
            .unwrap_or_default();
        view.connection = self.status;
        view.auto_play = self.auto_play;
        view
    }

    /// Publish the current view on the watch channel and as an event.
    fn publish(&self) {
        let view = self.current_view();
        if *self.view_tx.borrow() == view {
            return;
        }
        self.view_tx.send_replace(view.clone());
        self.emit(BingoEvent::RoundUpdated(Box::new(view)));
    }

    /// Emit an event. If the channel is full, log a warning and drop it so
    /// the session loop never blocks.
    fn emit(&self, event: BingoEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    "event channel full, dropping event: {:?}",
                    std::mem::discriminant(&dropped)
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }
}

/// Emit an event that must not be dropped. Waits for channel capacity.
async fn emit_blocking(event_tx: &mpsc::Sender<BingoEvent>, event: BingoEvent) {
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = BingoConfig::new("https://bingo.example.com");
        assert_eq!(config.token, None);
        assert_eq!(config.allowed_stakes, vec![10, 20, 50]);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.reconnect_interval, Duration::from_secs(3));
        assert_eq!(config.max_reconnect_attempts, None);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.timing, RoundTiming::default());
        assert_eq!(config.error_notice_ttl, Duration::from_secs(3));
        assert_eq!(config.announcement_ttl, Duration::from_secs(5));
    }

    #[test]
    fn config_builder_methods() {
        let config = BingoConfig::new("http://localhost:8000")
            .with_token("t")
            .with_allowed_stakes([5, 100])
            .with_event_channel_capacity(0)
            .with_reconnect_interval(Duration::from_millis(500))
            .with_max_reconnect_attempts(4)
            .with_connect_timeout(Duration::from_secs(2))
            .with_timing(RoundTiming {
                reservation_window_secs: 30,
                call_interval_secs: 5,
            });
        assert_eq!(config.token.as_deref(), Some("t"));
        assert!(config.is_allowed_stake(100));
        assert!(!config.is_allowed_stake(10));
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.max_reconnect_attempts, Some(4));
        assert_eq!(config.sync_settings().timing.call_interval_secs, 5);
    }

    #[test]
    fn room_and_status_urls_follow_the_scheme() {
        let secure = BingoConfig::new("https://bingo.example.com/").with_token("abc");
        assert_eq!(
            secure.room_url(50),
            "wss://bingo.example.com/bingo/ws?token=abc&stake=50"
        );
        assert_eq!(
            secure.status_url(),
            "https://bingo.example.com/bingo/status"
        );

        let plain = BingoConfig::new("ws://127.0.0.1:8000");
        assert_eq!(plain.room_url(10), "ws://127.0.0.1:8000/bingo/ws?stake=10");
        assert_eq!(plain.status_url(), "http://127.0.0.1:8000/bingo/status");
    }

    #[test]
    fn unknown_scheme_is_left_alone() {
        assert_eq!(with_scheme("localhost:1/", "ws://", "wss://"), "localhost:1");
    }
}
