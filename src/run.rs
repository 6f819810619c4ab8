use anyhow::{anyhow, Context};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::{
    collectors::{CommandRunner, ProcessRunner},
    config::Config,
    logger::{self, LogTag},
    shutdown::{self, Shutdown},
    webserver::{
        self,
        state::AppState,
        ws::{
            producers,
            sources::{self, ansible_exec},
            ConnectionConfig, HubConfig, WsHub,
        },
    },
};

/// Run the server until an OS signal arrives or the listener fails
///
/// Startup order: hub, producers, listener. Shutdown order: stop the
/// listener and producers, close every client queue, then wait for open
/// sockets to finish within the grace period.
pub async fn run(config: Config) -> anyhow::Result<()> {
    logger::info(
        LogTag::System,
        &format!("controlwire {} starting up...", env!("CARGO_PKG_VERSION")),
    );

    let connection = ConnectionConfig::try_from(&config.websocket)
        .context("Invalid websocket configuration")?;
    let grace = Duration::from_secs(config.server.shutdown_grace_secs);

    // 1. Bind first so a busy port fails before anything is spawned
    let listener = webserver::bind(&config.server).await?;

    // 2. Hub
    let (hub, hub_task) = WsHub::spawn(HubConfig::from(&config.websocket));
    let shutdown = Shutdown::new();

    // 3. Producers
    let (runs, run_source) = ansible_exec::channel(config.producers.ansible_exec.feed_capacity);
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::default());
    let producer_tasks = producers::start_all(
        sources::build_producers(&config.producers, runner, run_source),
        &hub,
        &shutdown,
    );

    // 4. Listener
    let state = Arc::new(AppState::new(hub.clone(), connection, runs));
    let mut server_task = tokio::spawn(webserver::serve(listener, state, shutdown.clone()));

    logger::info(LogTag::System, "controlwire is running (Ctrl-C to stop)");

    let mut signal_error = None;
    let server_exit = tokio::select! {
        signal = shutdown::wait_for_os_signal() => {
            match signal {
                Ok(()) => logger::info(LogTag::System, "Shutdown signal received"),
                Err(e) => signal_error = Some(e),
            }
            None
        }
        joined = &mut server_task => Some(joined),
    };

    // ── Shutdown sequence ──
    shutdown.trigger();
    join_producers(producer_tasks, grace).await;

    match hub.close_all().await {
        Ok(closed) => logger::info(
            LogTag::System,
            &format!("Closed {} client connections", closed),
        ),
        Err(e) => logger::warning(LogTag::System, &format!("Hub close failed: {}", e)),
    }
    let metrics = hub.metrics();
    shutdown::drain_connections(&metrics, grace).await;

    let server_result = match server_exit {
        Some(joined) => joined,
        None => match timeout(grace, &mut server_task).await {
            Ok(joined) => joined,
            Err(_) => {
                server_task.abort();
                logger::warning(LogTag::Webserver, "Webserver did not stop within the grace period");
                Ok(Ok(()))
            }
        },
    };

    let snapshot = metrics.snapshot();
    logger::info(
        LogTag::System,
        &format!(
            "Hub totals: clients={} broadcasts={} frames_queued={} evictions={}",
            snapshot.total_clients, snapshot.broadcasts, snapshot.frames_queued, snapshot.evictions
        ),
    );

    // Last handle; the actor exits once it is gone
    drop(hub);
    if timeout(grace, hub_task).await.is_err() {
        logger::warning(LogTag::Hub, "Hub actor did not stop within the grace period");
    }

    if let Some(e) = signal_error {
        return Err(anyhow!(e).context("Failed to listen for shutdown signals"));
    }
    server_result.context("Webserver task panicked")??;

    logger::info(LogTag::System, "controlwire stopped");
    Ok(())
}

async fn join_producers(tasks: Vec<JoinHandle<()>>, grace: Duration) {
    let joined = timeout(grace, futures::future::join_all(tasks)).await;
    match joined {
        Ok(results) => {
            for result in results {
                if let Err(e) = result {
                    logger::error(LogTag::Producer, &format!("Producer task failed: {}", e));
                }
            }
        }
        Err(_) => logger::warning(
            LogTag::Producer,
            "Producers did not stop within the grace period",
        ),
    }
}
