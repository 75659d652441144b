//! Supervised WebSocket event channel to the Device.
//!
//! The [`ConnectionSupervisor`] owns the channel connection in a background
//! task. It connects to `ws://<address>/ws`, forwards every text frame
//! verbatim, and reconnects on a fixed cadence whenever the connection drops
//! or cannot be opened. Supervision continues until [`stop`] is called, even
//! if the Device never comes up.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    ConnectionSupervisor                     │
//! │                                                             │
//! │  start() / stop() ──cmd───▶  Background task                │
//! │  state()          ◀─watch──  owns the WebSocket,            │
//! │  frame_receiver() ◀─mpsc───  reconnects every 3 seconds     │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`stop`]: ConnectionSupervisor::stop

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use waypost_core::{ConnectionState, Error, Result};

use crate::endpoints::DeviceEndpoints;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Pause between reconnection attempts. The cadence is fixed: the Device is
/// at a known address on a local network, so there is no remote service to
/// protect with a growing backoff.
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Capacity of the command channel.
const CMD_CHANNEL_CAPACITY: usize = 8;

/// Capacity of the frame channel (bounded, frames can be bursty).
const FRAME_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

/// Messages sent from the public API to the background task.
enum SupervisorCommand {
    /// Begin (or resume) supervising the channel.
    Start,
    /// Close any open connection and stop reconnecting.
    Stop,
}

/// Why one connection's read loop ended.
enum ChannelOutcome {
    /// Connection dropped unexpectedly; supervision continues.
    Lost,
    /// A Stop command arrived; supervision pauses until the next Start.
    Stopped,
    /// The supervisor handle was dropped; the task exits.
    Shutdown,
}

/// How a reconnect pause ended.
enum RetryOutcome {
    Retry,
    Stopped,
    Shutdown,
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

// ---------------------------------------------------------------------------
// ConnectionSupervisor
// ---------------------------------------------------------------------------

/// Handle to the supervised Device event channel.
///
/// Create with [`ConnectionSupervisor::new`], then call [`start`] to begin
/// supervision. The background task keeps the channel alive from there:
/// every lost or failed connection is retried after a fixed delay, forever,
/// until [`stop`] is called or the handle is dropped.
///
/// Incoming text frames are forwarded verbatim through [`frame_receiver`];
/// no decoding happens at this layer. State transitions are published
/// through a watch channel, read with [`state`] or [`watch_state`].
///
/// [`start`]: ConnectionSupervisor::start
/// [`stop`]: ConnectionSupervisor::stop
/// [`frame_receiver`]: ConnectionSupervisor::frame_receiver
/// [`state`]: ConnectionSupervisor::state
/// [`watch_state`]: ConnectionSupervisor::watch_state
pub struct ConnectionSupervisor {
    cmd_tx: mpsc::Sender<SupervisorCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    frame_rx: mpsc::Receiver<String>,
}

impl ConnectionSupervisor {
    /// Create a supervisor for the Device's event channel.
    ///
    /// Spawns the background task on the current Tokio runtime. The task
    /// stays idle, holding no connection, until [`start`] is called.
    ///
    /// [`start`]: ConnectionSupervisor::start
    pub fn new(endpoints: &DeviceEndpoints) -> Self {
        Self::spawn_task(endpoints, RECONNECT_DELAY)
    }

    /// Create a supervisor with a custom reconnect delay.
    ///
    /// Intended for tests that cannot afford the production cadence.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn with_reconnect_delay(endpoints: &DeviceEndpoints, delay: Duration) -> Self {
        Self::spawn_task(endpoints, delay)
    }

    fn spawn_task(endpoints: &DeviceEndpoints, reconnect_delay: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        tokio::spawn(run_supervisor_task(
            endpoints.ws_url().to_string(),
            cmd_rx,
            state_tx,
            frame_tx,
            reconnect_delay,
        ));

        Self {
            cmd_tx,
            state_rx,
            frame_rx,
        }
    }

    /// Begin supervising the channel.
    ///
    /// Idempotent: while a connection is open or a reconnect is pending,
    /// further calls are ignored. After [`stop`], calling this resumes
    /// supervision.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the background task has exited.
    ///
    /// [`stop`]: ConnectionSupervisor::stop
    pub async fn start(&self) -> Result<()> {
        self.cmd_tx
            .send(SupervisorCommand::Start)
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Stop supervising the channel.
    ///
    /// Closes any open connection and cancels a pending reconnect. The
    /// background task stays alive so a later [`start`] can resume.
    ///
    /// [`start`]: ConnectionSupervisor::start
    pub async fn stop(&self) {
        // Ignore the send error. If the channel is closed the task is gone
        // and there is nothing left to stop.
        let _ = self.cmd_tx.send(SupervisorCommand::Stop).await;
    }

    /// Return the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Return a watch receiver that observes connection state transitions.
    ///
    /// The watch only updates on actual transitions, so `changed()` never
    /// fires for a republished identical state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Return `true` if the channel is currently connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Return a mutable reference to the incoming frame receiver.
    ///
    /// Frames arrive exactly as the Device sent them; routing and decoding
    /// are the caller's concern.
    pub fn frame_receiver(&mut self) -> &mut mpsc::Receiver<String> {
        &mut self.frame_rx
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// Entry point for the background supervision task.
///
/// Alternates between an idle phase (waiting for Start) and an active phase
/// (connect, run the channel, wait the fixed delay, repeat). The task exits
/// only when the command channel closes, i.e. when the
/// [`ConnectionSupervisor`] is dropped.
async fn run_supervisor_task(
    ws_url: String,
    mut cmd_rx: mpsc::Receiver<SupervisorCommand>,
    state_tx: watch::Sender<ConnectionState>,
    frame_tx: mpsc::Sender<String>,
    reconnect_delay: Duration,
) {
    loop {
        // Idle until someone asks for the channel.
        match cmd_rx.recv().await {
            Some(SupervisorCommand::Start) => {}
            Some(SupervisorCommand::Stop) => continue,
            None => break,
        }

        info!("Device channel: supervising {}", ws_url);

        'active: loop {
            match connect_ws(&ws_url).await {
                Ok(ws_stream) => {
                    info!("Device channel: connected to {}", ws_url);
                    publish(&state_tx, ConnectionState::Connected);

                    let outcome = run_channel(ws_stream, &mut cmd_rx, &frame_tx).await;
                    publish(&state_tx, ConnectionState::Disconnected);

                    match outcome {
                        ChannelOutcome::Lost => {}
                        ChannelOutcome::Stopped => {
                            info!("Device channel: stopped");
                            break 'active;
                        }
                        ChannelOutcome::Shutdown => return,
                    }
                }
                Err(err) => {
                    warn!("Device channel: connect failed: {}", err);
                }
            }

            match wait_for_retry(reconnect_delay, &mut cmd_rx).await {
                RetryOutcome::Retry => {}
                RetryOutcome::Stopped => {
                    info!("Device channel: stopped while waiting to reconnect");
                    break 'active;
                }
                RetryOutcome::Shutdown => return,
            }
        }
    }

    debug!("Device channel: supervisor task exiting");
}

/// Run one connection's read loop.
///
/// Forwards text frames until the connection ends or a command interrupts
/// it, and reports why it returned.
async fn run_channel(
    ws_stream: WsStream,
    cmd_rx: &mut mpsc::Receiver<SupervisorCommand>,
    frame_tx: &mpsc::Sender<String>,
) -> ChannelOutcome {
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    loop {
        tokio::select! {
            frame = ws_stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Err(err) = frame_tx.try_send(text.as_str().to_owned()) {
                            warn!("Device channel: frame buffer full or closed, dropping frame: {}", err);
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        debug!("Device channel: received Close frame");
                        return ChannelOutcome::Lost;
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong/Binary are not forwarded
                    }
                    Some(Err(err)) => {
                        warn!("Device channel: read error: {}", err);
                        return ChannelOutcome::Lost;
                    }
                    None => {
                        debug!("Device channel: stream ended");
                        return ChannelOutcome::Lost;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SupervisorCommand::Start) => {
                        debug!("Device channel: already connected, ignoring start");
                    }
                    Some(SupervisorCommand::Stop) => {
                        send_close(&mut ws_sink).await;
                        return ChannelOutcome::Stopped;
                    }
                    None => {
                        debug!("Device channel: handle dropped, closing connection");
                        send_close(&mut ws_sink).await;
                        return ChannelOutcome::Shutdown;
                    }
                }
            }
        }
    }
}

/// Sleep out the reconnect delay while staying responsive to commands.
async fn wait_for_retry(
    delay: Duration,
    cmd_rx: &mut mpsc::Receiver<SupervisorCommand>,
) -> RetryOutcome {
    debug!("Device channel: reconnecting in {:?}", delay);
    let retry = tokio::time::sleep(delay);
    tokio::pin!(retry);

    loop {
        tokio::select! {
            _ = &mut retry => return RetryOutcome::Retry,
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SupervisorCommand::Start) => {
                        debug!("Device channel: reconnect already pending, ignoring start");
                    }
                    Some(SupervisorCommand::Stop) => return RetryOutcome::Stopped,
                    None => return RetryOutcome::Shutdown,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Publish a state transition, skipping the notification when nothing
/// changed.
fn publish(state_tx: &watch::Sender<ConnectionState>, next: ConnectionState) {
    state_tx.send_if_modified(|state| {
        if *state == next {
            false
        } else {
            *state = next;
            true
        }
    });
}

/// Establish a new WebSocket connection to `ws_url`.
async fn connect_ws(ws_url: &str) -> Result<WsStream> {
    let (ws_stream, _response) = connect_async(ws_url)
        .await
        .map_err(|err| Error::channel(format!("failed to connect to {ws_url}: {err}")))?;
    Ok(ws_stream)
}

/// Send a WebSocket Close frame, ignoring any write errors.
async fn send_close(ws_sink: &mut SplitSink<WsStream, WsMessage>) {
    let _ = ws_sink.send(WsMessage::Close(None)).await;
    let _ = ws_sink.close().await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::spawn_ws_stub;
    use std::time::Instant;
    use tokio::time::timeout;

    const TEST_DELAY: Duration = Duration::from_millis(80);

    async fn supervised_stub(
        delay: Duration,
    ) -> (
        ConnectionSupervisor,
        mpsc::UnboundedReceiver<crate::test_utils::StubWs>,
    ) {
        let (addr, conns) = spawn_ws_stub().await;
        let endpoints = DeviceEndpoints::new(&addr.to_string()).unwrap();
        let supervisor = ConnectionSupervisor::with_reconnect_delay(&endpoints, delay);
        (supervisor, conns)
    }

    async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
        timeout(Duration::from_secs(5), rx.wait_for(|state| *state == want))
            .await
            .expect("timed out waiting for connection state")
            .expect("state channel closed");
    }

    #[test]
    fn test_reconnect_delay_is_three_seconds() {
        assert_eq!(RECONNECT_DELAY, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_start_connects_and_publishes_state() {
        let (supervisor, mut conns) = supervised_stub(TEST_DELAY).await;
        let mut state_rx = supervisor.watch_state();

        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
        supervisor.start().await.unwrap();

        wait_for_state(&mut state_rx, ConnectionState::Connected).await;
        assert!(supervisor.is_connected());

        let _conn = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_frames_forwarded_verbatim() {
        let (mut supervisor, mut conns) = supervised_stub(TEST_DELAY).await;
        supervisor.start().await.unwrap();

        let mut conn = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();

        conn.send(WsMessage::Text(r#"{"event":"buttonPressed"}"#.into()))
            .await
            .unwrap();
        conn.send(WsMessage::Text("not json".into())).await.unwrap();
        conn.send(WsMessage::Binary(vec![1, 2, 3].into()))
            .await
            .unwrap();
        conn.send(WsMessage::Text("  ".into())).await.unwrap();

        let frames = supervisor.frame_receiver();
        let first = timeout(Duration::from_secs(5), frames.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, r#"{"event":"buttonPressed"}"#);

        let second = timeout(Duration::from_secs(5), frames.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second, "not json");

        // The binary frame is skipped, so the next text frame follows.
        let third = timeout(Duration::from_secs(5), frames.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(third, "  ");
    }

    #[tokio::test]
    async fn test_reconnects_after_connection_drop() {
        let (supervisor, mut conns) = supervised_stub(Duration::from_millis(300)).await;
        let mut state_rx = supervisor.watch_state();
        supervisor.start().await.unwrap();

        let conn1 = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();
        wait_for_state(&mut state_rx, ConnectionState::Connected).await;

        drop(conn1);
        wait_for_state(&mut state_rx, ConnectionState::Disconnected).await;
        wait_for_state(&mut state_rx, ConnectionState::Connected).await;

        let _conn2 = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_reconnect_uses_fixed_delay() {
        let delay = Duration::from_millis(400);
        let (supervisor, mut conns) = supervised_stub(delay).await;
        let mut state_rx = supervisor.watch_state();
        supervisor.start().await.unwrap();

        let conn1 = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();
        wait_for_state(&mut state_rx, ConnectionState::Connected).await;

        drop(conn1);
        wait_for_state(&mut state_rx, ConnectionState::Disconnected).await;
        let lost_at = Instant::now();

        let conn2 = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();
        let first_gap = lost_at.elapsed();
        assert!(
            first_gap >= delay - Duration::from_millis(50),
            "reconnected after {:?}, expected at least {:?}",
            first_gap,
            delay
        );

        // A second loss waits the same fixed delay, not a grown one.
        wait_for_state(&mut state_rx, ConnectionState::Connected).await;
        drop(conn2);
        wait_for_state(&mut state_rx, ConnectionState::Disconnected).await;
        let lost_again = Instant::now();

        let _conn3 = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();
        let second_gap = lost_again.elapsed();
        assert!(
            second_gap < delay * 3,
            "second reconnect took {:?}, cadence should not grow",
            second_gap
        );
    }

    #[tokio::test]
    async fn test_retries_until_listener_appears() {
        // Reserve an address, then release it so the first attempts fail.
        let placeholder = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = placeholder.local_addr().unwrap();
        drop(placeholder);

        let endpoints = DeviceEndpoints::new(&addr.to_string()).unwrap();
        let supervisor =
            ConnectionSupervisor::with_reconnect_delay(&endpoints, Duration::from_millis(100));
        let mut state_rx = supervisor.watch_state();
        supervisor.start().await.unwrap();

        // Let at least one connect attempt fail before the stub appears.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);

        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            // Hold the connection open until the test finishes.
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        wait_for_state(&mut state_rx, ConnectionState::Connected).await;
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_reconnect() {
        let (supervisor, mut conns) = supervised_stub(Duration::from_millis(200)).await;
        let mut state_rx = supervisor.watch_state();
        supervisor.start().await.unwrap();

        let conn1 = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();
        wait_for_state(&mut state_rx, ConnectionState::Connected).await;

        drop(conn1);
        wait_for_state(&mut state_rx, ConnectionState::Disconnected).await;
        supervisor.stop().await;

        // No reconnection attempt should follow.
        let next = timeout(Duration::from_millis(600), conns.recv()).await;
        assert!(next.is_err(), "stop should cancel the pending reconnect");
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_stop_closes_open_channel() {
        let (supervisor, mut conns) = supervised_stub(TEST_DELAY).await;
        let mut state_rx = supervisor.watch_state();
        supervisor.start().await.unwrap();

        let mut conn = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();
        wait_for_state(&mut state_rx, ConnectionState::Connected).await;

        supervisor.stop().await;

        // The server side observes the close handshake.
        let frame = timeout(Duration::from_secs(5), conn.next()).await.unwrap();
        match frame {
            Some(Ok(WsMessage::Close(_))) | None => {}
            other => panic!("expected close, got {:?}", other),
        }
        wait_for_state(&mut state_rx, ConnectionState::Disconnected).await;
    }

    #[tokio::test]
    async fn test_start_while_connected_is_ignored() {
        let (supervisor, mut conns) = supervised_stub(TEST_DELAY).await;
        let mut state_rx = supervisor.watch_state();
        supervisor.start().await.unwrap();

        let _conn = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();
        wait_for_state(&mut state_rx, ConnectionState::Connected).await;

        supervisor.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let extra = timeout(Duration::from_millis(100), conns.recv()).await;
        assert!(extra.is_err(), "redundant start must not open a second connection");
        assert!(supervisor.is_connected());
    }

    #[tokio::test]
    async fn test_start_after_stop_resumes_supervision() {
        let (supervisor, mut conns) = supervised_stub(TEST_DELAY).await;
        let mut state_rx = supervisor.watch_state();
        supervisor.start().await.unwrap();

        let _conn1 = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();
        wait_for_state(&mut state_rx, ConnectionState::Connected).await;

        supervisor.stop().await;
        wait_for_state(&mut state_rx, ConnectionState::Disconnected).await;

        supervisor.start().await.unwrap();
        wait_for_state(&mut state_rx, ConnectionState::Connected).await;

        let _conn2 = timeout(Duration::from_secs(5), conns.recv())
            .await
            .unwrap()
            .unwrap();
    }
}
