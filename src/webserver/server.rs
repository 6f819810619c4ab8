/// Axum webserver implementation
///
/// Binding, serving and graceful termination of the HTTP listener. The
/// hub and producers are started by the caller and reach the routes
/// through `AppState`.
use anyhow::{anyhow, Context};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::{
    config::ServerConfig,
    logger::{self, LogTag},
    shutdown::Shutdown,
    webserver::{routes, state::AppState},
};

/// Bind the listener
pub async fn bind(config: &ServerConfig) -> anyhow::Result<TcpListener> {
    let addr = format!("{}:{}", config.host, config.port);

    TcpListener::bind(addr.as_str()).await.map_err(|e| {
        // Provide helpful error message for common cases
        match e.kind() {
            std::io::ErrorKind::AddrInUse => anyhow!(
                "Failed to bind to {}: Address already in use\n\
                 \n\
                 Another controlwire instance (or another service) is using this port.\n\
                 Stop it, or choose a different port with --port or [server].port.",
                addr
            ),
            std::io::ErrorKind::PermissionDenied => anyhow!(
                "Failed to bind to {}: Permission denied\n\
                 \n\
                 Port {} requires elevated privileges on this system.\n\
                 Consider using a port above 1024 or running with appropriate permissions.",
                addr,
                config.port
            ),
            _ => anyhow!("Failed to bind to {}: {}", addr, e),
        }
    })
}

/// Serve until `shutdown` is triggered
///
/// Returning only means the listener stopped accepting; upgraded sockets
/// are closed through the hub.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Shutdown,
) -> anyhow::Result<()> {
    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;

    logger::info(
        LogTag::Webserver,
        &format!("Webserver listening on http://{} (ws://{}/ws)", addr, addr),
    );

    let app = build_app(state);

    let shutdown_signal = async move {
        shutdown.wait().await;
        logger::debug(
            LogTag::Webserver,
            "Received shutdown signal, stopping webserver...",
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    logger::debug(LogTag::Webserver, "Webserver stopped gracefully");
    Ok(())
}

/// Build the Axum application with all routes
pub fn build_app(state: Arc<AppState>) -> Router {
    routes::create_router(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ws::health::HealthConfig;
    use crate::webserver::ws::message::{parse_message, Event};
    use crate::webserver::ws::message::{PlaybookRun, RunStatus};
    use crate::webserver::ws::sources::{ansible_exec, PlaybookRunSource, SystemMetricsSource};
    use crate::webserver::ws::{ConnectionConfig, HubConfig, Producer, WsHub};
    use futures::StreamExt;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::{timeout, timeout_at, Instant};
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    struct TestServer {
        addr: SocketAddr,
        hub: WsHub,
        state: Arc<AppState>,
        runs_source: PlaybookRunSource,
        shutdown: Shutdown,
        task: tokio::task::JoinHandle<anyhow::Result<()>>,
    }

    async fn start(connection: ConnectionConfig) -> TestServer {
        let (hub, _hub_task) = WsHub::spawn(HubConfig::default());
        let (runs, runs_source) = ansible_exec::channel(4);
        let state = Arc::new(AppState::new(hub.clone(), connection, runs));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(serve(listener, Arc::clone(&state), shutdown.clone()));

        TestServer {
            addr,
            hub,
            state,
            runs_source,
            shutdown,
            task,
        }
    }

    async fn wait_for_clients(hub: &WsHub, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while hub.client_count().await.unwrap() != expected {
            assert!(
                Instant::now() < deadline,
                "expected {} clients, have {}",
                expected,
                hub.client_count().await.unwrap()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            path, addr
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn scaled_liveness() -> ConnectionConfig {
        ConnectionConfig {
            health: HealthConfig::new(
                Duration::from_millis(54),
                Duration::from_millis(60),
                Duration::from_millis(10),
            )
            .unwrap(),
            max_batch: 64,
        }
    }

    #[tokio::test]
    async fn test_one_metrics_frame_per_interval() {
        let server = start(ConnectionConfig::default()).await;
        let (mut client, _) = connect_async(format!("ws://{}/ws", server.addr))
            .await
            .unwrap();
        wait_for_clients(&server.hub, 1).await;

        let unit = Duration::from_millis(400);
        let _producer = Producer::new(unit, Box::new(SystemMetricsSource::new()))
            .spawn(server.hub.clone(), server.shutdown.clone());

        let deadline = Instant::now() + unit * 3 / 2;
        let mut envelopes = Vec::new();
        loop {
            match timeout_at(deadline, client.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    envelopes.extend(parse_message(&text).unwrap());
                }
                Ok(Some(Ok(_))) => {}
                Ok(other) => panic!("connection ended early: {:?}", other),
                Err(_) => break,
            }
        }

        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].kind, "metrics");
        assert!(matches!(envelopes[0].event().unwrap(), Some(Event::Metrics(_))));

        server.shutdown.trigger();
    }

    #[tokio::test]
    async fn test_liveness_keeps_answering_client_and_drops_silent_one() {
        let server = start(scaled_liveness()).await;
        let url = format!("ws://{}/ws", server.addr);

        // Reading drives tungstenite's automatic pong replies
        let (answering, _) = connect_async(url.as_str()).await.unwrap();
        let answering_closed = Arc::new(AtomicBool::new(false));
        let closed_flag = Arc::clone(&answering_closed);
        let reader = tokio::spawn(async move {
            let (_sink, mut stream) = answering.split();
            let mut pings = 0u32;
            loop {
                match stream.next().await {
                    Some(Ok(Message::Ping(_))) => pings += 1,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            closed_flag.store(true, Ordering::SeqCst);
            pings
        });

        // Never reads, so never answers a ping
        let (mut silent, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_clients(&server.hub, 2).await;

        // Past ten full ping cycles
        tokio::time::sleep(Duration::from_millis(650)).await;
        assert_eq!(server.hub.client_count().await.unwrap(), 1);
        assert!(
            !answering_closed.load(Ordering::SeqCst),
            "answering client must still be connected"
        );

        // The silent client was the one dropped: its socket ends in a close
        let silent_closed = timeout(Duration::from_secs(2), async {
            loop {
                match silent.next().await {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(silent_closed.is_ok(), "silent client should have been closed");

        server.shutdown.trigger();
        server.hub.close_all().await.unwrap();
        let pings = timeout(Duration::from_secs(2), reader)
            .await
            .expect("answering client should see the close")
            .unwrap();
        assert!(pings >= 10, "only {} pings observed", pings);
    }

    #[tokio::test]
    async fn test_client_that_stops_answering_is_dropped() {
        let server = start(scaled_liveness()).await;
        let (mut client, _) = connect_async(format!("ws://{}/ws", server.addr))
            .await
            .unwrap();
        wait_for_clients(&server.hub, 1).await;

        // Answer three pings, then stop reading but keep the socket open
        let mut pings = 0u32;
        timeout(Duration::from_secs(2), async {
            while pings < 3 {
                if let Some(Ok(Message::Ping(_))) = client.next().await {
                    pings += 1;
                }
            }
        })
        .await
        .expect("three pings in time");
        let stopped = Instant::now();
        assert_eq!(server.hub.client_count().await.unwrap(), 1);

        // Last pong went out no later than `stopped`; pong_wait is 60ms
        let limit = Duration::from_millis(60 + 150);
        while server.hub.client_count().await.unwrap() != 0 {
            assert!(
                stopped.elapsed() < limit,
                "client still registered {:?} after its last read",
                stopped.elapsed()
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        server.shutdown.trigger();
        drop(client);
    }

    #[tokio::test]
    async fn test_reported_run_reaches_clients() {
        let server = start(ConnectionConfig::default()).await;
        let (mut client, _) = connect_async(format!("ws://{}/ws", server.addr))
            .await
            .unwrap();
        wait_for_clients(&server.hub, 1).await;

        // Long interval: only the report's wake can trigger the poll
        let _producer = Producer::new(Duration::from_secs(3600), Box::new(server.runs_source))
            .spawn(server.hub.clone(), server.shutdown.clone());

        let reported = server.state.runs.report(PlaybookRun {
            id: "run-42".to_string(),
            playbook: "deploy.yml".to_string(),
            status: RunStatus::Success,
            exit_code: 0,
            started_at: chrono::Utc::now(),
            finished_at: Some(chrono::Utc::now()),
            hosts: vec!["web-1".to_string()],
            output: String::new(),
        });
        assert!(reported);

        let envelope = timeout(Duration::from_secs(2), async {
            loop {
                match client.next().await {
                    Some(Ok(Message::Text(text))) => {
                        break parse_message(&text).unwrap().remove(0);
                    }
                    Some(Ok(_)) => {}
                    other => panic!("connection ended early: {:?}", other),
                }
            }
        })
        .await
        .expect("run frame in time");

        assert_eq!(envelope.kind, "ansible-exec");
        match envelope.event().unwrap() {
            Some(Event::AnsibleExec(run)) => {
                assert_eq!(run.id, "run-42");
                assert_eq!(run.playbook, "deploy.yml");
            }
            other => panic!("unexpected event {:?}", other),
        }

        server.shutdown.trigger();
    }

    #[tokio::test]
    async fn test_failed_upgrade_does_not_affect_server() {
        let server = start(ConnectionConfig::default()).await;

        let response = http_get(server.addr, "/ws").await;
        assert!(response.starts_with("HTTP/1.1 4"), "got: {}", response);

        let (_client, _) = connect_async(format!("ws://{}/ws", server.addr))
            .await
            .unwrap();
        wait_for_clients(&server.hub, 1).await;

        server.shutdown.trigger();
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = start(ConnectionConfig::default()).await;
        let (_client, _) = connect_async(format!("ws://{}/ws", server.addr))
            .await
            .unwrap();
        wait_for_clients(&server.hub, 1).await;

        let response = http_get(server.addr, "/api/health").await;
        assert!(response.starts_with("HTTP/1.1 200"));

        let body = response.split("\r\n\r\n").nth(1).unwrap();
        let health: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["hub"]["active_clients"], 1);

        server.shutdown.trigger();
    }

    #[tokio::test]
    async fn test_shutdown_closes_clients_and_listener() {
        let server = start(ConnectionConfig::default()).await;
        let (mut client, _) = connect_async(format!("ws://{}/ws", server.addr))
            .await
            .unwrap();
        wait_for_clients(&server.hub, 1).await;

        server.shutdown.trigger();
        assert_eq!(server.hub.close_all().await.unwrap(), 1);

        let closed = timeout(Duration::from_secs(2), async {
            loop {
                match client.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "client should be closed by the server");

        timeout(Duration::from_secs(2), server.task)
            .await
            .expect("listener should stop")
            .unwrap()
            .unwrap();
        assert!(TcpStream::connect(server.addr).await.is_err());
    }
}
