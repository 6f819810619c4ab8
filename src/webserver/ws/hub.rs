/// Central WebSocket Hub - registry owner and broadcaster
///
/// The hub is an actor: a single task owns the client registry and
/// processes commands one at a time from one channel. Registration,
/// removal and fan-out are therefore totally ordered, and the registry
/// needs no lock.
///
/// `WsHub` is the cloneable handle everybody else holds. Producers only
/// ever call `broadcast`; connection tasks call `register` and
/// `unregister`.
///
/// Backpressure: fan-out uses `try_send`. A client whose queue is full is
/// evicted on the spot. The registry holds the only sender for each
/// queue, so removing the entry is what closes the queue.
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::WebsocketConfig;
use crate::errors::HubError;
use crate::logger::{self, LogTag};

use super::message::{Envelope, Frame};
use super::metrics::HubMetrics;

// ============================================================================
// HUB TYPES
// ============================================================================

/// Client ID (unique per connection, never reused)
pub type ClientId = u64;

/// Sending side of a client's outbound queue; held only by the registry
type ClientSender = mpsc::Sender<Frame>;

/// Hub sizing
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Outbound queue capacity per client (frames)
    pub queue_capacity: usize,

    /// Command channel capacity
    pub command_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            command_buffer: 1024,
        }
    }
}

impl From<&WebsocketConfig> for HubConfig {
    fn from(config: &WebsocketConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            command_buffer: config.command_buffer,
        }
    }
}

/// Receiving side of a registered client's outbound queue
///
/// `recv` returns `None` once the hub has removed the client.
#[derive(Debug)]
pub struct ClientQueue {
    pub id: ClientId,
    pub receiver: mpsc::Receiver<Frame>,
}

enum HubCommand {
    Register {
        id: ClientId,
        sender: ClientSender,
    },
    Unregister {
        id: ClientId,
    },
    Broadcast {
        kind: String,
        frame: Frame,
    },
    ClientCount {
        reply: oneshot::Sender<usize>,
    },
    CloseAll {
        reply: oneshot::Sender<usize>,
    },
}

// ============================================================================
// WS HUB HANDLE
// ============================================================================

/// Cloneable handle to the hub actor
#[derive(Clone)]
pub struct WsHub {
    commands: mpsc::Sender<HubCommand>,
    next_client_id: Arc<AtomicU64>,
    metrics: Arc<HubMetrics>,
    queue_capacity: usize,
}

impl WsHub {
    /// Start the hub actor
    ///
    /// The actor runs until every handle has been dropped.
    pub fn spawn(config: HubConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let metrics = HubMetrics::new();

        let actor = HubActor {
            clients: HashMap::new(),
            commands: rx,
            metrics: Arc::clone(&metrics),
        };
        let task = tokio::spawn(actor.run());

        let hub = Self {
            commands: tx,
            next_client_id: Arc::new(AtomicU64::new(1)),
            metrics,
            queue_capacity: config.queue_capacity.max(1),
        };
        (hub, task)
    }

    /// Register a new client
    ///
    /// The client receives only broadcasts issued after this call returns.
    pub async fn register(&self) -> Result<ClientQueue, HubError> {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        self.send(HubCommand::Register { id, sender }).await?;
        Ok(ClientQueue { id, receiver })
    }

    /// Remove a client and close its queue
    ///
    /// Unknown or already removed ids are ignored.
    pub async fn unregister(&self, id: ClientId) -> Result<(), HubError> {
        self.send(HubCommand::Unregister { id }).await
    }

    /// Serialize the envelope once and fan it out to every registered client
    ///
    /// Never waits on a client. Slow clients are evicted by the hub and
    /// that is not reported back to the caller.
    pub async fn broadcast(&self, envelope: &Envelope) -> Result<(), HubError> {
        let frame = envelope.to_frame()?;
        self.send(HubCommand::Broadcast {
            kind: envelope.kind.clone(),
            frame,
        })
        .await
    }

    /// Registry size, observed after every previously issued command
    pub async fn client_count(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::ClientCount { reply }).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Remove every client and close every queue
    ///
    /// Returns how many clients were removed. Used at shutdown; the hub
    /// keeps accepting commands afterwards.
    pub async fn close_all(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::CloseAll { reply }).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    pub fn metrics(&self) -> Arc<HubMetrics> {
        Arc::clone(&self.metrics)
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::Closed)
    }
}

// ============================================================================
// HUB ACTOR
// ============================================================================

struct HubActor {
    clients: HashMap<ClientId, ClientSender>,
    commands: mpsc::Receiver<HubCommand>,
    metrics: Arc<HubMetrics>,
}

impl HubActor {
    async fn run(mut self) {
        logger::debug(LogTag::Hub, "Hub started");

        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }

        logger::debug(
            LogTag::Hub,
            &format!(
                "Hub stopped, all handles dropped (clients={})",
                self.clients.len()
            ),
        );
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { id, sender } => self.register(id, sender),
            HubCommand::Unregister { id } => self.unregister(id),
            HubCommand::Broadcast { kind, frame } => self.broadcast(&kind, frame),
            HubCommand::ClientCount { reply } => {
                let _ = reply.send(self.clients.len());
            }
            HubCommand::CloseAll { reply } => {
                let closed = self.clients.len();
                for _ in self.clients.drain() {
                    self.metrics.client_removed();
                }
                logger::debug(
                    LogTag::Hub,
                    &format!("Closed all client queues ({} clients)", closed),
                );
                let _ = reply.send(closed);
            }
        }
    }

    fn register(&mut self, id: ClientId, sender: ClientSender) {
        match self.clients.entry(id) {
            Entry::Occupied(_) => {
                // The new sender is dropped here, which closes the duplicate queue
                logger::warning(
                    LogTag::Hub,
                    &format!("Rejected duplicate registration of client {}", id),
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(sender);
                self.metrics.client_registered();
                logger::debug(
                    LogTag::Hub,
                    &format!(
                        "Client {} registered (active={})",
                        id,
                        self.clients.len()
                    ),
                );
            }
        }
    }

    fn unregister(&mut self, id: ClientId) {
        if self.clients.remove(&id).is_some() {
            self.metrics.client_removed();
            logger::debug(
                LogTag::Hub,
                &format!(
                    "Client {} unregistered (active={})",
                    id,
                    self.clients.len()
                ),
            );
        }
    }

    fn broadcast(&mut self, kind: &str, frame: Frame) {
        if self.clients.is_empty() {
            self.metrics.broadcast_sent(0);
            return;
        }

        let mut queued = 0u64;
        let mut evicted = Vec::new();
        let mut gone = Vec::new();

        for (id, sender) in &self.clients {
            match sender.try_send(Arc::clone(&frame)) {
                Ok(()) => queued += 1,
                Err(mpsc::error::TrySendError::Full(_)) => evicted.push(*id),
                Err(mpsc::error::TrySendError::Closed(_)) => gone.push(*id),
            }
        }

        for id in evicted {
            self.clients.remove(&id);
            self.metrics.client_evicted();
            logger::warning(
                LogTag::Hub,
                &format!("Client {} evicted: outbound queue full", id),
            );
        }

        // Receiver already dropped; the connection task is on its way out
        for id in gone {
            self.clients.remove(&id);
            self.metrics.client_removed();
        }

        self.metrics.broadcast_sent(queued);

        logger::verbose(
            LogTag::Hub,
            &format!(
                "Broadcast {} queued for {} clients (active={})",
                kind,
                queued,
                self.clients.len()
            ),
        );
    }
}
