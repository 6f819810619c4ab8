/// WebSocket metrics collection
///
/// Hub-level counters shared by the hub actor, connection tasks and the
/// health route, plus per-connection counters logged when a client leaves.
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// HUB METRICS
// ============================================================================

/// Hub-level metrics (aggregate across all clients)
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Clients ever registered
    total_clients: AtomicU64,

    /// Clients currently in the registry
    active_clients: AtomicUsize,

    /// Broadcasts fanned out
    broadcasts: AtomicU64,

    /// Frames accepted into client queues
    frames_queued: AtomicU64,

    /// Clients dropped because their queue was full
    evictions: AtomicU64,

    /// Upgraded sockets whose connection task has not finished yet
    open_sockets: AtomicUsize,
}

impl HubMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn client_registered(&self) {
        self.total_clients.fetch_add(1, Ordering::Relaxed);
        self.active_clients.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn client_removed(&self) {
        self.active_clients.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn client_evicted(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.client_removed();
    }

    pub(crate) fn broadcast_sent(&self, frames_queued: u64) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.frames_queued.fetch_add(frames_queued, Ordering::Relaxed);
    }

    /// Track an upgraded socket until the returned guard is dropped
    pub fn socket_opened(self: &Arc<Self>) -> SocketGuard {
        self.open_sockets.fetch_add(1, Ordering::AcqRel);
        SocketGuard {
            metrics: Arc::clone(self),
        }
    }

    pub fn open_sockets(&self) -> usize {
        self.open_sockets.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> HubMetricsSnapshot {
        HubMetricsSnapshot {
            total_clients: self.total_clients.load(Ordering::Relaxed),
            active_clients: self.active_clients.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            frames_queued: self.frames_queued.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            open_sockets: self.open_sockets.load(Ordering::Relaxed),
        }
    }
}

/// Decrements the open socket gauge on drop
#[derive(Debug)]
pub struct SocketGuard {
    metrics: Arc<HubMetrics>,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        self.metrics.open_sockets.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Hub metrics snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HubMetricsSnapshot {
    pub total_clients: u64,
    pub active_clients: usize,
    pub broadcasts: u64,
    pub frames_queued: u64,
    pub evictions: u64,
    pub open_sockets: usize,
}

// ============================================================================
// CONNECTION METRICS
// ============================================================================

/// Per-connection metrics, owned by the connection task
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    /// Envelopes written to the socket
    frames_written: AtomicU64,

    /// Text messages written (one per batch)
    messages_written: AtomicU64,

    /// Largest batch written in a single message
    peak_batch: AtomicUsize,

    /// Liveness probes sent
    pings_sent: AtomicU64,

    /// Frames received from the peer (any type)
    frames_received: AtomicU64,
}

impl ConnectionMetrics {
    pub fn batch_written(&self, frames: usize) {
        self.frames_written.fetch_add(frames as u64, Ordering::Relaxed);
        self.messages_written.fetch_add(1, Ordering::Relaxed);
        self.peak_batch.fetch_max(frames, Ordering::Relaxed);
    }

    pub fn ping_sent(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConnectionMetricsSnapshot {
        ConnectionMetricsSnapshot {
            frames_written: self.frames_written.load(Ordering::Relaxed),
            messages_written: self.messages_written.load(Ordering::Relaxed),
            peak_batch: self.peak_batch.load(Ordering::Relaxed),
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionMetricsSnapshot {
    pub frames_written: u64,
    pub messages_written: u64,
    pub peak_batch: usize,
    pub pings_sent: u64,
    pub frames_received: u64,
}
