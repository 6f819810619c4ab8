/// Centralized WebSocket Hub Module
///
/// Every client gets the same multiplexed stream of envelopes over a
/// single `/ws` connection. There is no per-client filtering.
///
/// ## Architecture
/// - One hub actor owns the client registry and fans out broadcasts
/// - Per-client bounded queues; a full queue evicts its client
/// - Interval-driven producers, one per collaborator, feed the hub
/// - Per-connection liveness via server pings and a read deadline
///
/// ## Key Components
/// - `hub`: registry owner and broadcaster
/// - `connection`: inbound/outbound pump pair for one upgraded socket
/// - `message`: envelope schema and typed event payloads
/// - `producers`: `EventSource` trait and the producer loop
/// - `sources`: built-in event sources
/// - `health`: liveness timings and deadline tracking
/// - `metrics`: hub and per-connection counters
pub mod connection;
pub mod health;
pub mod hub;
pub mod message;
pub mod metrics;
pub mod producers;
pub mod sources;

pub use connection::ConnectionConfig;
pub use hub::{HubConfig, WsHub};
pub use message::{Envelope, Event, EventKind};
pub use producers::{EventSource, Producer};
