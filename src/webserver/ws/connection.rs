/// WebSocket connection handler
///
/// Each upgraded socket runs two pumps inside one task:
/// - inbound: reads frames under the liveness deadline, discards payloads
/// - outbound: drains the client queue into batched text messages, pings
///
/// Whichever pump ends first, the client is unregistered exactly once from
/// the single exit path in `run_pumps`. Unregistering closes the queue,
/// which is how the outbound pump learns it should send Close.
use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at};

use crate::config::WebsocketConfig;
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};

use super::health::{HealthConfig, Liveness};
use super::hub::{ClientId, ClientQueue, WsHub};
use super::message::{Frame, FRAME_SEPARATOR};
use super::metrics::ConnectionMetrics;

// ============================================================================
// CONNECTION CONFIG
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    pub health: HealthConfig,

    /// Maximum frames coalesced into one text message
    pub max_batch: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            health: HealthConfig::default(),
            max_batch: 64,
        }
    }
}

impl TryFrom<&WebsocketConfig> for ConnectionConfig {
    type Error = ConfigError;

    fn try_from(config: &WebsocketConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            health: HealthConfig::try_from(config)?,
            max_batch: config.max_batch.max(1),
        })
    }
}

/// Why a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// No inbound frame within pong_wait
    LivenessExpired,
    /// Close frame or end of stream
    PeerClosed,
    ReadError,
    /// Hub removed the client (eviction, shutdown)
    QueueClosed,
    WriteError,
    PingFailed,
}

impl PumpExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpExit::LivenessExpired => "liveness expired",
            PumpExit::PeerClosed => "peer closed",
            PumpExit::ReadError => "read error",
            PumpExit::QueueClosed => "queue closed",
            PumpExit::WriteError => "write error",
            PumpExit::PingFailed => "ping failed",
        }
    }
}

// ============================================================================
// CONNECTION LIFECYCLE
// ============================================================================

/// Handle an upgraded WebSocket until either side gives up
pub async fn serve(socket: WebSocket, hub: WsHub, config: ConnectionConfig) {
    let _socket_guard = hub.metrics().socket_opened();

    let queue = match hub.register().await {
        Ok(queue) => queue,
        Err(e) => {
            logger::warning(
                LogTag::Connection,
                &format!("Dropping connection, registration failed: {}", e),
            );
            return;
        }
    };

    let (sink, stream) = socket.split();
    run_pumps(queue, sink, stream, &hub, &config).await;
}

/// Run both pumps for a registered client and tear down
pub(crate) async fn run_pumps<S, R, E>(
    queue: ClientQueue,
    sink: S,
    stream: R,
    hub: &WsHub,
    config: &ConnectionConfig,
) -> PumpExit
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let ClientQueue { id, receiver } = queue;
    let metrics = ConnectionMetrics::default();

    logger::debug(LogTag::Connection, &format!("Connection {} started", id));

    let inbound = inbound_pump(id, stream, config.health.pong_wait, &metrics);
    let outbound = outbound_pump(id, receiver, sink, config, &metrics);
    tokio::pin!(inbound);
    tokio::pin!(outbound);

    let exit = tokio::select! {
        exit = &mut inbound => {
            unregister(hub, id).await;
            // Queue is closed now; let the outbound pump deliver Close
            if timeout(config.health.write_wait, &mut outbound).await.is_err() {
                logger::debug(
                    LogTag::Connection,
                    &format!("Connection {}: close frame not delivered in time", id),
                );
            }
            exit
        }
        exit = &mut outbound => {
            unregister(hub, id).await;
            exit
        }
    };

    let snapshot = metrics.snapshot();
    let summary = format!(
        "Connection {} closed: {} (frames={}, messages={}, peak_batch={}, pings={}, received={})",
        id,
        exit.as_str(),
        snapshot.frames_written,
        snapshot.messages_written,
        snapshot.peak_batch,
        snapshot.pings_sent,
        snapshot.frames_received
    );
    match exit {
        PumpExit::LivenessExpired | PumpExit::WriteError | PumpExit::PingFailed => {
            logger::info(LogTag::Connection, &summary)
        }
        _ => logger::debug(LogTag::Connection, &summary),
    }

    exit
}

async fn unregister(hub: &WsHub, id: ClientId) {
    if let Err(e) = hub.unregister(id).await {
        logger::debug(
            LogTag::Connection,
            &format!("Connection {}: unregister skipped: {}", id, e),
        );
    }
}

// ============================================================================
// INBOUND PUMP
// ============================================================================

async fn inbound_pump<R, E>(
    id: ClientId,
    mut stream: R,
    pong_wait: Duration,
    metrics: &ConnectionMetrics,
) -> PumpExit
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut liveness = Liveness::new(pong_wait);

    loop {
        let next = match timeout_at(liveness.deadline(), stream.next()).await {
            Ok(next) => next,
            Err(_) => return PumpExit::LivenessExpired,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                logger::debug(
                    LogTag::Connection,
                    &format!("Connection {}: read failed: {}", id, e),
                );
                return PumpExit::ReadError;
            }
            None => return PumpExit::PeerClosed,
        };

        liveness.refresh();
        metrics.frame_received();

        match message {
            Message::Close(_) => return PumpExit::PeerClosed,
            Message::Text(text) => {
                logger::debug(
                    LogTag::Connection,
                    &format!(
                        "Connection {}: ignoring inbound text ({} bytes)",
                        id,
                        text.len()
                    ),
                );
            }
            Message::Binary(data) => {
                logger::debug(
                    LogTag::Connection,
                    &format!(
                        "Connection {}: ignoring inbound binary ({} bytes)",
                        id,
                        data.len()
                    ),
                );
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

// ============================================================================
// OUTBOUND PUMP
// ============================================================================

async fn outbound_pump<S>(
    id: ClientId,
    mut receiver: mpsc::Receiver<Frame>,
    mut sink: S,
    config: &ConnectionConfig,
    metrics: &ConnectionMetrics,
) -> PumpExit
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let write_wait = config.health.write_wait;
    let mut ping = config.health.ping_ticker();

    loop {
        tokio::select! {
            frame = receiver.recv() => {
                let Some(first) = frame else {
                    let _ = write(&mut sink, Message::Close(None), write_wait).await;
                    return PumpExit::QueueClosed;
                };

                let (text, frames) = drain_batch(first, &mut receiver, config.max_batch);
                if let Err(e) = write(&mut sink, Message::Text(text), write_wait).await {
                    logger::debug(
                        LogTag::Connection,
                        &format!("Connection {}: write failed: {}", id, e),
                    );
                    return PumpExit::WriteError;
                }
                metrics.batch_written(frames);
            }
            _ = ping.tick() => {
                if let Err(e) = write(&mut sink, Message::Ping(Vec::new()), write_wait).await {
                    logger::debug(
                        LogTag::Connection,
                        &format!("Connection {}: ping failed: {}", id, e),
                    );
                    return PumpExit::PingFailed;
                }
                metrics.ping_sent();
            }
        }
    }
}

/// Coalesce `first` and whatever is already queued into one text message
fn drain_batch(
    first: Frame,
    receiver: &mut mpsc::Receiver<Frame>,
    max_batch: usize,
) -> (String, usize) {
    let mut text = String::with_capacity(first.len());
    text.push_str(&first);
    let mut frames = 1;

    while frames < max_batch {
        match receiver.try_recv() {
            Ok(frame) => {
                text.push(FRAME_SEPARATOR);
                text.push_str(&frame);
                frames += 1;
            }
            Err(_) => break,
        }
    }

    (text, frames)
}

async fn write<S>(sink: &mut S, message: Message, write_wait: Duration) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match timeout(write_wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {:?}", write_wait)),
    }
}
