//! Connection lifecycle for the single channel to the game server.
//!
//! [`ConnectionState`] is the pure phase machine: which operations are allowed
//! in which phase, retry counting, and the status shown to the player.
//! [`ConnectionManager`] is the async actor that owns the transport and every
//! timer (staged boot feedback, hard connect deadline, heartbeat check, ping,
//! retry backoff). All of those live inside its `run` future, so dropping or
//! tearing down the actor cancels them together.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::time::{
    interval, interval_at, sleep, sleep_until, timeout, Instant, MissedTickBehavior,
};
use tracing::{debug, info, trace, warn};

use super::client::{NetworkClient, NetworkCommand, NetworkEvent};
use super::protocol::{ClientMessage, ServerMessage};
use super::router::{self, MessageRouter};
use super::transport::{is_local_endpoint, Connector, Transport};
use crate::config::NetworkConfig;
use crate::game::clock::wall_clock_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    /// Waiting for a cold remote endpoint to wake before the first attempt
    Warming,
    Connected,
    Retrying,
    Error,
}

/// Coarse user-facing progress while an attempt is slow; never affects protocol behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    Warming,
    Booting,
    Finalizing,
}

impl BootPhase {
    fn for_stage(stage: usize) -> Self {
        match stage {
            0 => BootPhase::Warming,
            1 => BootPhase::Booting,
            _ => BootPhase::Finalizing,
        }
    }
}

/// Snapshot of the connection published to the UI
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub phase: ConnectionPhase,
    pub boot_phase: Option<BootPhase>,
    pub retry_count: u32,
    pub message: String,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            phase: ConnectionPhase::Idle,
            boot_phase: None,
            retry_count: 0,
            message: String::from("Not connected"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConnectionState {
    status: ConnectionStatus,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.status.phase
    }

    pub fn retry_count(&self) -> u32 {
        self.status.retry_count
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    fn set(&mut self, phase: ConnectionPhase, message: impl Into<String>) {
        let message = message.into();
        if phase != self.status.phase {
            info!(from = ?self.status.phase, to = ?phase, %message, "connection phase");
        }
        self.status.phase = phase;
        self.status.message = message;
    }

    /// Start an attempt. Returns false (and changes nothing) while one is in
    /// flight or the channel is already open.
    pub fn begin_connect(&mut self) -> bool {
        if matches!(
            self.status.phase,
            ConnectionPhase::Connecting | ConnectionPhase::Warming | ConnectionPhase::Connected
        ) {
            return false;
        }
        self.status.boot_phase = None;
        self.set(ConnectionPhase::Connecting, "Connecting to server...");
        true
    }

    pub fn enter_warming(&mut self) {
        self.set(ConnectionPhase::Warming, "Waking up the server...");
    }

    /// Cold-start wait is over; the channel open itself is now in flight
    pub fn resume_connecting(&mut self) {
        if self.status.phase == ConnectionPhase::Warming {
            self.set(ConnectionPhase::Connecting, "Connecting to server...");
        }
    }

    /// Staged feedback timer `stage` fired with the channel still not open
    pub fn advance_boot_phase(&mut self, stage: usize) {
        if !matches!(
            self.status.phase,
            ConnectionPhase::Connecting | ConnectionPhase::Warming
        ) {
            return;
        }
        let boot = BootPhase::for_stage(stage);
        let message = match stage {
            0 => "Server is waking up...",
            1 => "Server is booting...",
            2 => "Finalizing server startup...",
            _ => "Still starting, almost there...",
        };
        debug!(stage, ?boot, "boot feedback");
        self.status.boot_phase = Some(boot);
        self.status.message = message.to_string();
    }

    pub fn on_open(&mut self) {
        self.status.retry_count = 0;
        self.status.boot_phase = None;
        self.set(ConnectionPhase::Connected, "Connected");
    }

    /// An attempt failed or an open channel closed. Returns the new retry count.
    pub fn fail(&mut self, reason: &str) -> u32 {
        self.status.retry_count += 1;
        self.status.boot_phase = None;
        self.set(ConnectionPhase::Error, reason);
        self.status.retry_count
    }

    pub fn retry_scheduled(&mut self, delay: Duration) {
        let message = format!(
            "Connection lost, retrying in {}s (attempt {})",
            delay.as_secs().max(1),
            self.status.retry_count + 1
        );
        self.set(ConnectionPhase::Retrying, message);
    }

    pub fn teardown(&mut self) {
        self.status.boot_phase = None;
        self.set(ConnectionPhase::Idle, "Disconnected");
    }
}

/// Backoff before retry number `retry` (1-based): doubles from the base, plus jitter, capped
pub fn backoff_delay(retry: u32, jitter: Duration, config: &NetworkConfig) -> Duration {
    let exponent = retry.saturating_sub(1).min(16);
    let grown = Duration::from_millis(config.retry_base_ms.saturating_mul(1u64 << exponent));
    (grown + jitter).min(Duration::from_millis(config.retry_max_ms))
}

fn random_jitter(config: &NetworkConfig) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=config.retry_jitter_ms))
}

/// Tracks the last inbound heartbeat; the channel is dead after `timeout` of silence
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    last: Instant,
    timeout: Duration,
}

impl HeartbeatMonitor {
    pub fn new(now: Instant, config: &NetworkConfig) -> Self {
        Self {
            last: now,
            timeout: Duration::from_millis(config.heartbeat_interval_ms)
                * config.heartbeat_timeout_factor,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.last = now;
    }

    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.silence(now) > self.timeout
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

// Bookkeeping for one connect attempt
struct Attempt {
    start: Instant,
    deadline: Instant,
    stage: usize,
}

enum Waited<T> {
    Done(T),
    TimedOut,
    Exit,
}

enum AttemptOutcome {
    Open(Box<dyn Transport>),
    Failed(String),
    Exit,
}

enum ServeOutcome {
    Closed(String),
    Exit,
}

enum Step {
    Connect,
    Exit,
}

// A write that cannot finish within `limit` means the channel is dead
async fn send(
    router: &MessageRouter,
    transport: &mut Box<dyn Transport>,
    msg: &ClientMessage,
    limit: Duration,
) -> Result<(), String> {
    let text = router
        .encode(msg)
        .map_err(|e| format!("encoding {}: {}", msg.kind(), e))?;
    match timeout(limit, transport.send(text)).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => {
            warn!(
                kind = msg.kind(),
                limit_ms = limit.as_millis() as u64,
                "send stalled, dropping channel"
            );
            Err("Server stopped responding".to_string())
        }
    }
}

async fn close(transport: &mut Box<dyn Transport>, limit: Duration) {
    match timeout(limit, transport.close()).await {
        Ok(Err(e)) => debug!(error = %e, "close failed"),
        Err(_) => debug!("close stalled, dropping channel"),
        Ok(Ok(())) => {}
    }
}

/// Async owner of the channel. Runs until torn down or until every client handle is dropped.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    config: NetworkConfig,
    url: String,
    room_id: String,
    router: MessageRouter,
    state: ConnectionState,
    status_tx: watch::Sender<ConnectionStatus>,
    commands: mpsc::UnboundedReceiver<NetworkCommand>,
    events: mpsc::UnboundedSender<NetworkEvent>,
    last_ping: Option<(u64, Instant)>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        config: NetworkConfig,
        url: impl Into<String>,
        player_id: impl Into<String>,
        room_id: impl Into<String>,
    ) -> (Self, NetworkClient) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());

        let manager = Self {
            connector,
            config,
            url: url.into(),
            room_id: room_id.into(),
            router: MessageRouter::new(player_id),
            state: ConnectionState::new(),
            status_tx,
            commands: command_rx,
            events: event_tx,
            last_ping: None,
        };

        (manager, NetworkClient::new(command_tx, event_rx, status_rx))
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.state.status().clone());
    }

    pub async fn run(mut self) {
        info!(url = %self.url, room = %self.room_id, "connection manager started");
        let mut retry_at: Option<Instant> = None;

        loop {
            match self.idle(retry_at.take()).await {
                Step::Connect => {}
                Step::Exit => break,
            }

            if !self.state.begin_connect() {
                continue;
            }
            self.publish();

            let transport = match self.attempt().await {
                AttemptOutcome::Open(transport) => transport,
                AttemptOutcome::Failed(reason) => {
                    retry_at = Some(self.schedule_retry(&reason));
                    continue;
                }
                AttemptOutcome::Exit => break,
            };

            match self.serve(transport).await {
                ServeOutcome::Closed(reason) => retry_at = Some(self.schedule_retry(&reason)),
                ServeOutcome::Exit => break,
            }
        }

        self.state.teardown();
        self.publish();
        info!("connection manager stopped");
    }

    // Wait for a connect request or the retry deadline, whichever comes first
    async fn idle(&mut self, retry_at: Option<Instant>) -> Step {
        loop {
            let command = match retry_at {
                Some(at) => tokio::select! {
                    _ = sleep_until(at) => return Step::Connect,
                    command = self.commands.recv() => command,
                },
                None => self.commands.recv().await,
            };

            match command {
                // A manual reconnect skips whatever backoff is left
                Some(NetworkCommand::Connect) => return Step::Connect,
                Some(NetworkCommand::Send(msg)) => {
                    trace!(kind = msg.kind(), "not connected, outbound message dropped");
                }
                Some(NetworkCommand::Teardown) | None => return Step::Exit,
            }
        }
    }

    fn schedule_retry(&mut self, reason: &str) -> Instant {
        let retry = self.state.fail(reason);
        self.publish();

        let delay = backoff_delay(retry, random_jitter(&self.config), &self.config);
        warn!(retry, delay_ms = delay.as_millis() as u64, reason, "scheduling reconnect");
        self.state.retry_scheduled(delay);
        self.publish();

        Instant::now() + delay
    }

    // Drive `fut` while staged feedback timers, the hard deadline and commands keep running
    async fn wait_attempt<F: Future>(&mut self, fut: F, attempt: &mut Attempt) -> Waited<F::Output> {
        tokio::pin!(fut);

        loop {
            let stage_at = self
                .config
                .staged_feedback_secs
                .get(attempt.stage)
                .map(|secs| attempt.start + Duration::from_secs(*secs));

            tokio::select! {
                output = &mut fut => return Waited::Done(output),
                _ = sleep_until(attempt.deadline) => return Waited::TimedOut,
                _ = sleep_until(stage_at.unwrap_or(attempt.deadline)), if stage_at.is_some() => {
                    self.state.advance_boot_phase(attempt.stage);
                    attempt.stage += 1;
                    self.publish();
                }
                command = self.commands.recv() => match command {
                    Some(NetworkCommand::Connect) => debug!("connect ignored, attempt already in flight"),
                    Some(NetworkCommand::Send(msg)) => {
                        trace!(kind = msg.kind(), "still connecting, outbound message dropped");
                    }
                    Some(NetworkCommand::Teardown) | None => return Waited::Exit,
                },
            }
        }
    }

    async fn attempt(&mut self) -> AttemptOutcome {
        let remote = !is_local_endpoint(&self.url);
        let timeout = Duration::from_secs(if remote {
            self.config.connect_timeout_remote_secs
        } else {
            self.config.connect_timeout_local_secs
        });
        let start = Instant::now();
        let mut attempt = Attempt {
            start,
            deadline: start + timeout,
            stage: 0,
        };
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let timed_out = || AttemptOutcome::Failed(format!("No connection after {}s", timeout.as_secs()));

        if remote {
            let warm = match self.wait_attempt(connector.is_warm(&url), &mut attempt).await {
                Waited::Done(warm) => warm,
                Waited::TimedOut => return timed_out(),
                Waited::Exit => return AttemptOutcome::Exit,
            };

            if !warm {
                self.state.enter_warming();
                self.publish();
                let delay = Duration::from_millis(self.config.cold_start_delay_ms);
                match self.wait_attempt(sleep(delay), &mut attempt).await {
                    Waited::Done(()) => {}
                    Waited::TimedOut => return timed_out(),
                    Waited::Exit => return AttemptOutcome::Exit,
                }
                self.state.resume_connecting();
                self.publish();
            }
        }

        debug!(url = %url, remote, "opening channel");
        match self.wait_attempt(connector.connect(&url), &mut attempt).await {
            Waited::Done(Ok(transport)) => AttemptOutcome::Open(transport),
            Waited::Done(Err(e)) => AttemptOutcome::Failed(e.to_string()),
            Waited::TimedOut => timed_out(),
            Waited::Exit => AttemptOutcome::Exit,
        }
    }

    async fn serve(&mut self, mut transport: Box<dyn Transport>) -> ServeOutcome {
        self.state.on_open();
        self.publish();
        self.last_ping = None;

        let now = Instant::now();
        let mut heartbeat = HeartbeatMonitor::new(now, &self.config);
        let limit = heartbeat.timeout();

        let join = self.router.join_room(&self.room_id);
        if let Err(reason) = send(&self.router, &mut transport, &join, limit).await {
            return ServeOutcome::Closed(reason);
        }

        let mut check = interval(Duration::from_millis(self.config.heartbeat_check_interval_ms.max(1)));
        check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let ping_every = Duration::from_millis(self.config.ping_interval_ms.max(1));
        let mut ping = interval_at(now + ping_every, ping_every);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                incoming = transport.recv() => match incoming {
                    Some(Ok(text)) => {
                        if let Some(reply) = self.handle_text(&text, &mut heartbeat) {
                            if let Err(reason) = send(&self.router, &mut transport, &reply, limit).await {
                                return ServeOutcome::Closed(reason);
                            }
                        }
                    }
                    Some(Err(e)) => return ServeOutcome::Closed(e.to_string()),
                    None => return ServeOutcome::Closed("Server closed the connection".to_string()),
                },
                _ = check.tick() => {
                    let now = Instant::now();
                    if heartbeat.is_expired(now) {
                        warn!(silence_ms = heartbeat.silence(now).as_millis() as u64, "heartbeat timeout, closing channel");
                        close(&mut transport, limit).await;
                        return ServeOutcome::Closed("Server stopped responding".to_string());
                    }
                }
                _ = ping.tick() => {
                    let timestamp = wall_clock_ms();
                    self.last_ping = Some((timestamp, Instant::now()));
                    let msg = self.router.ping(timestamp);
                    if let Err(reason) = send(&self.router, &mut transport, &msg, limit).await {
                        return ServeOutcome::Closed(reason);
                    }
                }
                command = self.commands.recv() => match command {
                    Some(NetworkCommand::Connect) => debug!("connect ignored, already connected"),
                    Some(NetworkCommand::Send(msg)) => {
                        if let Err(reason) = send(&self.router, &mut transport, &msg, limit).await {
                            return ServeOutcome::Closed(reason);
                        }
                    }
                    Some(NetworkCommand::Teardown) | None => {
                        close(&mut transport, limit).await;
                        return ServeOutcome::Exit;
                    }
                },
            }
        }
    }

    // Liveness messages stay here; everything else goes to the frame loop. Returns a reply to send.
    fn handle_text(&mut self, text: &str, heartbeat: &mut HeartbeatMonitor) -> Option<ClientMessage> {
        let message = match router::decode(text) {
            Ok(message) => message,
            Err(e) => {
                let raw: String = text.chars().take(120).collect();
                warn!(error = %e, %raw, "discarding undecodable message");
                return None;
            }
        };

        match message {
            ServerMessage::Heartbeat { timestamp } => {
                heartbeat.record(Instant::now());
                Some(self.router.heartbeat_ack(timestamp.unwrap_or_else(wall_clock_ms)))
            }
            ServerMessage::Pong { timestamp } => {
                heartbeat.record(Instant::now());
                if let Some((sent_ts, sent_at)) = self.last_ping {
                    if timestamp.is_none() || timestamp == Some(sent_ts) {
                        self.last_ping = None;
                        let _ = self.events.send(NetworkEvent::RoundTrip(sent_at.elapsed()));
                    }
                }
                None
            }
            message => {
                trace!(kind = message.kind().name(), "inbound message");
                let _ = self.events.send(NetworkEvent::Message(message));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock::{MockAttempt, MockConnector};
    use super::*;

    fn config() -> NetworkConfig {
        NetworkConfig::default()
    }

    fn spawn(
        connector: Arc<MockConnector>,
        config: NetworkConfig,
        url: &str,
    ) -> NetworkClient {
        let (manager, client) = ConnectionManager::new(connector, config, url, "p-test", "room-1");
        tokio::spawn(manager.run());
        client
    }

    async fn wait_phase(client: &mut NetworkClient, phase: ConnectionPhase) -> ConnectionStatus {
        client
            .status
            .wait_for(|s| s.phase == phase)
            .await
            .expect("manager dropped status")
            .clone()
    }

    #[test]
    fn test_connect_guard() {
        let mut state = ConnectionState::new();

        assert!(state.begin_connect());
        assert!(!state.begin_connect());

        state.on_open();
        assert!(!state.begin_connect());

        state.fail("closed");
        state.retry_scheduled(Duration::from_secs(5));
        assert_eq!(state.phase(), ConnectionPhase::Retrying);
        assert!(state.begin_connect());
    }

    #[test]
    fn test_open_resets_retry_count() {
        let mut state = ConnectionState::new();
        state.begin_connect();
        assert_eq!(state.fail("timeout"), 1);
        state.begin_connect();
        assert_eq!(state.fail("timeout"), 2);

        state.begin_connect();
        state.on_open();

        assert_eq!(state.retry_count(), 0);
        assert_eq!(state.status().boot_phase, None);
    }

    #[test]
    fn test_boot_phase_only_while_connecting() {
        let mut state = ConnectionState::new();
        state.advance_boot_phase(0);
        assert_eq!(state.status().boot_phase, None);

        state.begin_connect();
        state.advance_boot_phase(0);
        assert_eq!(state.status().boot_phase, Some(BootPhase::Warming));
        state.advance_boot_phase(3);
        assert_eq!(state.status().boot_phase, Some(BootPhase::Finalizing));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = config();

        assert_eq!(backoff_delay(1, Duration::ZERO, &config), Duration::from_secs(5));
        assert_eq!(
            backoff_delay(1, Duration::from_millis(5000), &config),
            Duration::from_secs(10)
        );
        assert_eq!(backoff_delay(2, Duration::ZERO, &config), Duration::from_secs(10));
        assert_eq!(backoff_delay(3, Duration::ZERO, &config), Duration::from_secs(15));
        assert_eq!(backoff_delay(40, Duration::from_secs(5), &config), Duration::from_secs(15));
    }

    #[test]
    fn test_heartbeat_monitor_timeout() {
        let config = config();
        let start = Instant::now();
        let mut monitor = HeartbeatMonitor::new(start, &config);

        assert!(!monitor.is_expired(start + Duration::from_secs(15)));
        assert!(monitor.is_expired(start + Duration::from_secs(16)));

        monitor.record(start + Duration::from_secs(14));
        assert!(!monitor.is_expired(start + Duration::from_secs(16)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_sent_on_open() {
        let (connector, mut servers) = MockConnector::new(vec![]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        let mut server = servers.recv().await.unwrap();
        let join: serde_json::Value = serde_json::from_str(&server.sent.recv().await.unwrap()).unwrap();

        assert_eq!(join["kind"], "join-room");
        assert_eq!(join["playerId"], "p-test");
        assert_eq!(join["roomId"], "room-1");
        let status = wait_phase(&mut client, ConnectionPhase::Connected).await;
        assert_eq!(status.retry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_noop_while_connected() {
        let (connector, mut servers) = MockConnector::new(vec![]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        let _server = servers.recv().await.unwrap();
        wait_phase(&mut client, ConnectionPhase::Connected).await;

        client.connect();
        client.connect();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(connector.attempts(), 1);
        assert_eq!(client.status().phase, ConnectionPhase::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_timeout_forces_reconnect() {
        let (connector, mut servers) = MockConnector::new(vec![]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        let first = servers.recv().await.unwrap();
        wait_phase(&mut client, ConnectionPhase::Connected).await;

        // No heartbeat ever arrives
        sleep(Duration::from_millis(16_500)).await;
        let status = client.status();
        assert_eq!(status.phase, ConnectionPhase::Retrying);
        assert_eq!(status.retry_count, 1);
        assert!(first.is_closed());

        let _second = servers.recv().await.unwrap();
        wait_phase(&mut client, ConnectionPhase::Connected).await;
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_keeps_channel_and_is_acknowledged() {
        let (connector, mut servers) = MockConnector::new(vec![]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        let mut server = servers.recv().await.unwrap();
        let _join = server.sent.recv().await.unwrap();

        for _ in 0..6 {
            sleep(Duration::from_secs(5)).await;
            server.push(r#"{"kind":"heartbeat","data":{"timestamp":7}}"#);
        }
        sleep(Duration::from_millis(100)).await;

        assert_eq!(client.status().phase, ConnectionPhase::Connected);
        assert_eq!(connector.attempts(), 1);

        let mut acks = 0;
        while let Ok(text) = server.sent.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            if value["kind"] == "heartbeat-ack" {
                assert_eq!(value["timestamp"], 7);
                acks += 1;
            }
        }
        assert_eq!(acks, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_send_drops_channel_and_retries() {
        let (connector, mut servers) = MockConnector::new(vec![MockAttempt::StallSends { after: 1 }]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        let mut first = servers.recv().await.unwrap();
        let _join = first.sent.recv().await.unwrap();
        wait_phase(&mut client, ConnectionPhase::Connected).await;

        // First ping at 2s never completes; the write limit is the 15s heartbeat timeout
        sleep(Duration::from_secs(18)).await;
        let status = client.status();
        assert_eq!(status.phase, ConnectionPhase::Retrying);
        assert_eq!(status.retry_count, 1);

        let _second = servers.recv().await.unwrap();
        wait_phase(&mut client, ConnectionPhase::Connected).await;
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_processed_while_send_stalled() {
        let (connector, mut servers) = MockConnector::new(vec![MockAttempt::StallSends { after: 1 }]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        let mut server = servers.recv().await.unwrap();
        let _join = server.sent.recv().await.unwrap();
        wait_phase(&mut client, ConnectionPhase::Connected).await;

        sleep(Duration::from_secs(3)).await;
        client.teardown();
        wait_phase(&mut client, ConnectionPhase::Idle).await;

        sleep(Duration::from_secs(60)).await;
        assert_eq!(client.status().phase, ConnectionPhase::Idle);
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_convergence_after_failures() {
        let (connector, _servers) = MockConnector::new(vec![
            MockAttempt::Fail,
            MockAttempt::Fail,
            MockAttempt::Fail,
        ]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        let status = wait_phase(&mut client, ConnectionPhase::Connected).await;

        assert_eq!(connector.attempts(), 4);
        assert_eq!(status.retry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_staged_feedback_then_hard_timeout() {
        let (connector, _servers) = MockConnector::new(vec![MockAttempt::Hang]);
        let config = NetworkConfig {
            staged_feedback_secs: vec![2, 4, 6],
            ..config()
        };
        let client = spawn(connector.clone(), config, "ws://127.0.0.1:8080/ws");

        client.connect();
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(client.status().boot_phase, Some(BootPhase::Warming));
        assert_eq!(client.status().phase, ConnectionPhase::Connecting);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(client.status().boot_phase, Some(BootPhase::Booting));

        sleep(Duration::from_secs(2)).await;
        assert_eq!(client.status().boot_phase, Some(BootPhase::Finalizing));

        // Local endpoint: hard deadline at 10s
        sleep(Duration::from_secs(4)).await;
        let status = client.status();
        assert_eq!(status.phase, ConnectionPhase::Retrying);
        assert_eq!(status.boot_phase, None);
        assert_eq!(status.retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_every_timer() {
        let (connector, _servers) = MockConnector::new(vec![MockAttempt::Fail]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        wait_phase(&mut client, ConnectionPhase::Retrying).await;
        client.teardown();
        client.teardown();
        wait_phase(&mut client, ConnectionPhase::Idle).await;

        sleep(Duration::from_secs(120)).await;

        assert_eq!(connector.attempts(), 1);
        assert_eq!(client.status().phase, ConnectionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_connect_skips_backoff() {
        let (connector, mut servers) = MockConnector::new(vec![MockAttempt::Fail]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        wait_phase(&mut client, ConnectionPhase::Retrying).await;

        client.connect();
        let _server = servers.recv().await.unwrap();
        wait_phase(&mut client, ConnectionPhase::Connected).await;

        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_remote_endpoint_warms_first() {
        let (connector, mut servers) = MockConnector::new(vec![]);
        connector.set_warm(false);
        let mut client = spawn(connector.clone(), config(), "wss://pong404.example/ws");

        client.connect();
        wait_phase(&mut client, ConnectionPhase::Warming).await;
        assert_eq!(connector.attempts(), 0);

        let _server = servers.recv().await.unwrap();
        wait_phase(&mut client, ConnectionPhase::Connected).await;
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_message_is_discarded() {
        let (connector, mut servers) = MockConnector::new(vec![]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        let server = servers.recv().await.unwrap();
        server.push("{definitely not json");
        server.push(r#"{"kind":"room-joined","data":{"role":"left","playerCount":2}}"#);

        match client.events.recv().await.unwrap() {
            NetworkEvent::Message(ServerMessage::RoomJoined(joined)) => {
                assert_eq!(joined.player_count, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(client.status().phase, ConnectionPhase::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_schedules_retry() {
        let (connector, mut servers) = MockConnector::new(vec![]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        let server = servers.recv().await.unwrap();
        wait_phase(&mut client, ConnectionPhase::Connected).await;

        server.close();
        let status = wait_phase(&mut client, ConnectionPhase::Retrying).await;
        assert_eq!(status.retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_yields_round_trip() {
        let (connector, mut servers) = MockConnector::new(vec![]);
        let mut client = spawn(connector.clone(), config(), "ws://127.0.0.1:8080/ws");

        client.connect();
        let mut server = servers.recv().await.unwrap();
        let _join = server.sent.recv().await.unwrap();

        let ping: serde_json::Value = serde_json::from_str(&server.sent.recv().await.unwrap()).unwrap();
        assert_eq!(ping["kind"], "ping");

        sleep(Duration::from_millis(40)).await;
        server.push(&format!(r#"{{"kind":"pong","timestamp":{}}}"#, ping["timestamp"]));

        match client.events.recv().await.unwrap() {
            NetworkEvent::RoundTrip(rtt) => assert!(rtt >= Duration::from_millis(40)),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
