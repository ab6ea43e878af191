use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use serialgate_frame::{
    spawn_writer, Frame, FrameConfig, FrameReader, FrameWriter, OutboundMessage, OutboundQueue,
    WriterHandle,
};
use serialgate_route::{Dispatcher, Router, RouterConfig};
use serialgate_schema::SchemaRegistry;
use serialgate_transport::PortProvider;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::control::{ControlFrame, HandshakeConfig};
use crate::error::{LinkError, Result};
use crate::handshake::Handshake;
use crate::heartbeat::{Heartbeat, HeartbeatConfig, ProbeCheck};
use crate::pump::{spawn_reader, LinkEvent, ReaderHandle};
use crate::state::ConnectionState;
use crate::supervisor::{OpenedPort, PortSupervisor, SupervisorConfig};

/// Topic that mirrors notifying outbound messages.
pub const EVENT_TOPIC: &str = "event";

/// Everything the gateway worker needs to know up front.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub frame: FrameConfig,
    pub handshake: HandshakeConfig,
    pub heartbeat: HeartbeatConfig,
    pub supervisor: SupervisorConfig,
    pub router: RouterConfig,
    /// Pause between losing a link and acquiring the next one.
    pub reconnect_delay: Duration,
    /// How often idle sessions are expired.
    pub expire_interval: Duration,
    /// Log raw frames and decoded records at info instead of trace/debug.
    pub debug_mode: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            handshake: HandshakeConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            supervisor: SupervisorConfig::default(),
            router: RouterConfig::default(),
            reconnect_delay: Duration::from_millis(1000),
            expire_interval: Duration::from_millis(1000),
            debug_mode: false,
        }
    }
}

impl GatewayConfig {
    /// Switch framing and routing to multiplexed (hub) mode together.
    pub fn with_multiplexed(mut self, multiplexed: bool) -> Self {
        self.frame.multiplexed = multiplexed;
        self.router.multiplexed = multiplexed;
        self
    }
}

/// Cloneable control surface for a running gateway.
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    commands: mpsc::UnboundedSender<OutboundMessage>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl GatewayHandle {
    /// Queue a message for the device on the current link.
    ///
    /// Messages sent while no link is up are discarded at the next connect.
    pub fn send(&self, message: OutboundMessage) -> Result<()> {
        self.commands
            .send(message)
            .map_err(|_| LinkError::GatewayStopped)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Ask the worker to close the link and return.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

enum Outcome {
    Shutdown,
    HandshakeTimeout,
    Lost { reason: String, established: bool },
}

/// Resources tied to one opened port.
struct Link {
    name: String,
    queue: OutboundQueue,
    writer: WriterHandle,
    reader: ReaderHandle,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

impl Link {
    /// Stop both I/O threads. Anything still queued is discarded.
    ///
    /// Returns the event stream so writes that completed before the stop can
    /// still be reported.
    fn close(mut self) -> mpsc::UnboundedReceiver<LinkEvent> {
        self.writer.stop();
        self.reader.stop();
        debug!(port = %self.name, "link closed");
        self.events
    }
}

/// Per-connection protocol state, rebuilt on every connect.
struct Protocol {
    handshake: Handshake,
    heartbeat: Option<Heartbeat>,
}

/// The gateway context: owns all mutable state and runs the sequential
/// worker that processes every inbound frame.
pub struct Gateway {
    config: GatewayConfig,
    registry: SchemaRegistry,
    router: Router,
    dispatcher: Dispatcher,
    supervisor: PortSupervisor,
    state: watch::Sender<ConnectionState>,
    commands_tx: mpsc::UnboundedSender<OutboundMessage>,
    commands_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    cancel: CancellationToken,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        registry: SchemaRegistry,
        dispatcher: Dispatcher,
        provider: Arc<dyn PortProvider>,
    ) -> Result<Self> {
        config.frame.validate()?;
        config.heartbeat.validate()?;
        let router = Router::new(config.router.clone())?;
        let supervisor = PortSupervisor::new(provider, config.supervisor.clone());
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            registry,
            router,
            dispatcher,
            supervisor,
            state,
            commands_tx,
            commands_rx,
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned cancellation token for shutdown.
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            commands: self.commands_tx.clone(),
            state: self.state.subscribe(),
            cancel: self.cancel.clone(),
        }
    }

    /// Acquire ports and serve them until shutdown or until every candidate
    /// is exhausted.
    pub async fn run(mut self) -> Result<()> {
        info!(fields = self.registry.len(), multiplexed = self.config.frame.multiplexed, "gateway starting");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let port = match self.supervisor.acquire() {
                Ok(port) => port,
                Err(err) => {
                    self.set_state(ConnectionState::Disconnected);
                    warn!(error = %err, "serial link unavailable, stopping");
                    return Err(err);
                }
            };
            let name = port.name.clone();

            let outcome = match self.open_link(port) {
                Ok(link) => self.serve(link).await,
                Err(err) => Outcome::Lost {
                    reason: err.to_string(),
                    established: false,
                },
            };
            self.set_state(ConnectionState::Disconnected);
            self.router.reset();

            match outcome {
                Outcome::Shutdown => break,
                Outcome::HandshakeTimeout => {
                    let err = LinkError::HandshakeTimeout {
                        port: name.clone(),
                        after: self.config.handshake.timeout,
                    };
                    warn!(error = %err, "device did not answer challenge");
                    self.supervisor.report_failure(&name);
                }
                Outcome::Lost {
                    reason,
                    established,
                } => {
                    warn!(port = %name, reason = %reason, "serial link lost");
                    if !established {
                        self.supervisor.report_failure(&name);
                    }
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        info!("gateway stopped");
        Ok(())
    }

    fn open_link(&self, port: OpenedPort) -> Result<Link> {
        let OpenedPort { name, stream } = port;
        let mut read_half = stream.try_clone_stream()?;
        read_half.set_read_timeout(self.config.frame.read_timeout)?;

        let (events_tx, events) = mpsc::unbounded_channel();
        let reader = spawn_reader(
            FrameReader::with_config(read_half, self.config.frame.clone()),
            events_tx.clone(),
        );
        let (queue, writer) = spawn_writer(
            FrameWriter::with_config(stream, self.config.frame.clone()),
            move |message: &OutboundMessage| {
                if message.notify {
                    let _ = events_tx.send(LinkEvent::Sent(message.clone()));
                }
            },
        );

        Ok(Link {
            name,
            queue,
            writer,
            reader,
            events,
        })
    }

    async fn serve(&mut self, mut link: Link) -> Outcome {
        self.set_state(ConnectionState::Connecting);
        let stale = std::iter::from_fn(|| self.commands_rx.try_recv().ok()).count();
        if stale > 0 {
            debug!(discarded = stale, "outbound messages from before connect discarded");
        }

        let mut protocol = Protocol {
            handshake: Handshake::start(Instant::now(), self.config.handshake.timeout),
            heartbeat: None,
        };
        let challenge = OutboundMessage::broadcast(self.config.handshake.challenge.clone());
        if let Err(err) = link.queue.enqueue(challenge) {
            return self
                .finish(
                    link,
                    Outcome::Lost {
                        reason: err.to_string(),
                        established: false,
                    },
                )
                .await;
        }
        self.set_state(ConnectionState::AwaitingChallengeResponse);
        debug!(port = %link.name, "challenge queued");

        let cancel = self.cancel.clone();
        let mut expire_tick = tokio::time::interval(self.config.expire_interval);
        expire_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            let handshake_deadline = tokio::time::Instant::from_std(protocol.handshake.deadline());
            let probe_at = protocol
                .heartbeat
                .as_ref()
                .map_or(handshake_deadline, |hb| tokio::time::Instant::from_std(hb.next_probe()));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Outcome::Shutdown,
                _ = sleep_until(handshake_deadline), if !protocol.handshake.responded() => {
                    break Outcome::HandshakeTimeout;
                }
                _ = sleep_until(probe_at), if protocol.heartbeat.is_some() => {
                    self.probe(&link, &mut protocol);
                }
                event = link.events.recv() => match event {
                    Some(LinkEvent::Frame(frame)) => self.handle_frame(&link, &mut protocol, frame),
                    Some(LinkEvent::Sent(message)) => self.publish_sent(&message),
                    Some(LinkEvent::Closed(reason)) => break Outcome::Lost {
                        reason,
                        established: protocol.handshake.responded(),
                    },
                    None => break Outcome::Lost {
                        reason: "reader stopped".to_string(),
                        established: protocol.handshake.responded(),
                    },
                },
                Some(message) = self.commands_rx.recv() => {
                    if let Err(err) = link.queue.enqueue(message) {
                        warn!(port = %link.name, error = %err, "outbound message dropped");
                    }
                }
                _ = expire_tick.tick() => {
                    let expired = self.router.expire(Instant::now());
                    if expired > 0 {
                        debug!(expired, "idle sessions expired");
                    }
                }
            }
        };

        self.finish(link, outcome).await
    }

    async fn finish(&mut self, link: Link, outcome: Outcome) -> Outcome {
        let mut events = match tokio::task::spawn_blocking(move || link.close()).await {
            Ok(events) => events,
            Err(_) => {
                warn!("link teardown panicked");
                return outcome;
            }
        };
        while let Ok(event) = events.try_recv() {
            if let LinkEvent::Sent(message) = event {
                self.publish_sent(&message);
            }
        }
        outcome
    }

    fn handle_frame(&mut self, link: &Link, protocol: &mut Protocol, frame: Frame) {
        let now = Instant::now();
        if self.config.debug_mode {
            info!(port = %link.name, frame = %hex(&frame.payload), "frame received");
        } else {
            trace!(port = %link.name, frame = %hex(&frame.payload), "frame received");
        }

        if !protocol.handshake.responded() {
            if protocol
                .handshake
                .observe(&frame.payload, now, &self.config.handshake)
            {
                self.supervisor.confirm();
                protocol.heartbeat = Some(Heartbeat::start(now, self.config.heartbeat.interval));
                self.set_state(ConnectionState::Connected);
                info!(port = %link.name, "handshake complete, link connected");
            } else {
                debug!(port = %link.name, len = frame.payload.len(), "frame before handshake ignored");
            }
            return;
        }

        match ControlFrame::classify(&frame.payload, &self.config.handshake) {
            Some(ControlFrame::ProbeAck) => {
                if let Some(heartbeat) = protocol.heartbeat.as_mut() {
                    if heartbeat.on_ack(now) {
                        self.set_state(ConnectionState::Connected);
                        info!(port = %link.name, "heartbeat answered, link recovered");
                    }
                }
                return;
            }
            Some(ControlFrame::ChallengeAck) => {
                trace!(port = %link.name, "repeated challenge ack ignored");
                return;
            }
            None => {}
        }

        let decoded = self.registry.decode_frame(&frame);
        let record = Value::Object(decoded.to_record());
        if self.config.debug_mode {
            info!(address = ?decoded.address, record = %record, errors = decoded.errors.len(), "frame decoded");
        } else {
            debug!(address = ?decoded.address, record = %record, errors = decoded.errors.len(), "frame decoded");
        }

        let key = self.router.address_key(&decoded);
        for action in self.router.ingest(&key, &decoded, now) {
            self.dispatcher.dispatch(&action);
        }
    }

    fn probe(&mut self, link: &Link, protocol: &mut Protocol) {
        let Some(heartbeat) = protocol.heartbeat.as_mut() else {
            return;
        };

        if let ProbeCheck::Suspect { elapsed } = heartbeat.on_probe(Instant::now()) {
            warn!(
                port = %link.name,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "heartbeat overdue, device may have crashed"
            );
            self.set_state(ConnectionState::Suspect);
        }

        let probe = OutboundMessage::broadcast(self.config.handshake.probe.clone());
        if let Err(err) = link.queue.enqueue(probe) {
            debug!(port = %link.name, error = %err, "heartbeat probe not queued");
        }
    }

    fn publish_sent(&mut self, message: &OutboundMessage) {
        if !self.router.config().is_active(EVENT_TOPIC) {
            return;
        }
        let payload = json!({
            "address": message.destination.to_string(),
            "message": String::from_utf8_lossy(&message.payload),
        });
        self.dispatcher.publish(EVENT_TOPIC, &payload);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "connection state changed");
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out
}
