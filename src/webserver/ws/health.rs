/// WebSocket health monitoring
///
/// Liveness is a read deadline: every inbound frame pushes it forward by
/// `pong_wait`. The server pings every `ping_interval`, so a peer that
/// answers pings never hits the deadline.
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::config::WebsocketConfig;
use crate::errors::ConfigError;

// ============================================================================
// HEALTH CONFIG
// ============================================================================

/// Liveness timings for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthConfig {
    /// Server ping period
    pub ping_interval: Duration,

    /// Read deadline, refreshed by any inbound frame
    pub pong_wait: Duration,

    /// Upper bound on a single socket write
    pub write_wait: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(54),
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
        }
    }
}

impl HealthConfig {
    /// Build and check the ping/deadline relation
    pub fn new(
        ping_interval: Duration,
        pong_wait: Duration,
        write_wait: Duration,
    ) -> Result<Self, ConfigError> {
        if ping_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "ping_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if ping_interval >= pong_wait {
            return Err(ConfigError::Invalid {
                field: "ping_interval",
                reason: format!(
                    "must be shorter than pong_wait ({:?} >= {:?})",
                    ping_interval, pong_wait
                ),
            });
        }
        if write_wait.is_zero() {
            return Err(ConfigError::Invalid {
                field: "write_wait",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            ping_interval,
            pong_wait,
            write_wait,
        })
    }

    /// Ping ticker; the first ping goes out one interval after connect
    pub fn ping_ticker(&self) -> Interval {
        let mut ticker = interval_at(Instant::now() + self.ping_interval, self.ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}

impl TryFrom<&WebsocketConfig> for HealthConfig {
    type Error = ConfigError;

    fn try_from(config: &WebsocketConfig) -> Result<Self, Self::Error> {
        Self::new(
            Duration::from_secs(config.ping_interval_secs),
            Duration::from_secs(config.pong_wait_secs),
            Duration::from_secs(config.write_wait_secs),
        )
    }
}

// ============================================================================
// LIVENESS TRACKER
// ============================================================================

/// Read deadline for one connection
#[derive(Debug)]
pub struct Liveness {
    pong_wait: Duration,
    deadline: Instant,
}

impl Liveness {
    pub fn new(pong_wait: Duration) -> Self {
        Self {
            pong_wait,
            deadline: Instant::now() + pong_wait,
        }
    }

    /// Record inbound activity
    pub fn refresh(&mut self) {
        self.deadline = Instant::now() + self.pong_wait;
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}
