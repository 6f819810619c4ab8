/// Shared application state for the webserver
///
/// Everything a route handler needs is passed in here explicitly; there
/// is no global instance.
use chrono::{DateTime, Utc};

use crate::webserver::ws::sources::PlaybookRunNotifier;
use crate::webserver::ws::{ConnectionConfig, WsHub};

/// Shared application state passed to all route handlers
#[derive(Clone)]
pub struct AppState {
    /// Central WebSocket hub
    pub hub: WsHub,

    /// Per-connection liveness and batching settings
    pub connection: ConnectionConfig,

    /// Feed for finished playbook runs (consumed by the ansible-exec producer)
    ///
    /// Playbook execution lives outside this server; whatever runs playbooks
    /// reports results through this handle.
    pub runs: PlaybookRunNotifier,

    /// Server startup time
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(hub: WsHub, connection: ConnectionConfig, runs: PlaybookRunNotifier) -> Self {
        Self {
            hub,
            connection,
            runs,
            startup_time: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        (Utc::now() - self.startup_time).num_seconds().max(0) as u64
    }
}
