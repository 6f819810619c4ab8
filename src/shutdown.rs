use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::logger::{self, LogTag};
use crate::webserver::ws::metrics::HubMetrics;

// ═══════════════════════════════════════════════════════════════════════════════
// SHUTDOWN
// ═══════════════════════════════════════════════════════════════════════════════
//
// Sequence (driven by `run`):
// 1. OS signal received (or caller triggers)
// 2. Listener stops accepting; producers stop at their next await point
// 3. Hub closes every client queue; outbound pumps send Close
// 4. Wait for open sockets to reach zero, bounded by the grace period
// ═══════════════════════════════════════════════════════════════════════════════

/// Cloneable, level-triggered shutdown signal
///
/// Once triggered it stays triggered; late waiters return immediately.
#[derive(Clone, Debug)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once `trigger` has been called by any clone
    pub async fn wait(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives as long as `self`, so this cannot fail
        let _ = receiver.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for a termination signal (SIGINT, SIGTERM, SIGQUIT or Ctrl-C)
#[cfg(unix)]
pub async fn wait_for_os_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for Ctrl-C
#[cfg(not(unix))]
pub async fn wait_for_os_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Wait until every upgraded socket has finished, or `grace` elapses
///
/// Returns the number of sockets still open when it gave up.
pub async fn drain_connections(metrics: &HubMetrics, grace: Duration) -> usize {
    let deadline = Instant::now() + grace;
    let poll = Duration::from_millis(25);

    loop {
        let open = metrics.open_sockets();
        if open == 0 {
            return 0;
        }
        if Instant::now() >= deadline {
            logger::warning(
                LogTag::System,
                &format!(
                    "Shutdown grace period elapsed with {} sockets still open",
                    open
                ),
            );
            return open;
        }
        tokio::time::sleep(poll.min(deadline - Instant::now())).await;
    }
}
