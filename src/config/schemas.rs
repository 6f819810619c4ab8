/// Configuration schemas - all config structures defined once with defaults
///
/// Each struct is defined using the config_struct! macro which provides
/// embedded defaults and serde support.
use crate::config_struct;

// ============================================================================
// SERVER CONFIGURATION
// ============================================================================

config_struct! {
    /// HTTP/WebSocket listener configuration
    pub struct ServerConfig {
        /// Host/IP address to bind
        host: String = "127.0.0.1".to_string(),

        /// Port to bind
        port: u16 = 9090,

        /// How long shutdown waits for open sockets to close
        shutdown_grace_secs: u64 = 5,
    }
}

// ============================================================================
// WEBSOCKET CONFIGURATION
// ============================================================================

config_struct! {
    /// Hub and per-client connection settings
    pub struct WebsocketConfig {
        /// Outbound queue capacity per client (frames)
        queue_capacity: usize = 256,

        /// Liveness probe period, must be shorter than pong_wait_secs
        ping_interval_secs: u64 = 54,

        /// Read deadline; refreshed by every inbound frame
        pong_wait_secs: u64 = 60,

        /// Upper bound on a single socket write
        write_wait_secs: u64 = 10,

        /// Maximum frames coalesced into one outbound message
        max_batch: usize = 64,

        /// Hub command channel capacity
        command_buffer: usize = 1024,
    }
}

// ============================================================================
// PRODUCER CONFIGURATION
// ============================================================================

config_struct! {
    /// Host metrics sampler
    pub struct MetricsProducerConfig {
        enabled: bool = true,
        interval_secs: u64 = 1,
    }
}

config_struct! {
    /// Per-container log tailer
    pub struct DockerLogsProducerConfig {
        enabled: bool = true,
        interval_secs: u64 = 3,

        /// Container runtime CLI
        docker_bin: String = "docker".to_string(),

        /// Upper bound on lines fetched per container per tick
        tail_lines: usize = 100,
    }
}

config_struct! {
    /// Orchestrator event poller
    pub struct K8sEventsProducerConfig {
        enabled: bool = true,
        interval_secs: u64 = 5,

        /// Orchestrator CLI
        kubectl_bin: String = "kubectl".to_string(),

        /// Namespace to watch (empty = all namespaces)
        namespace: String = String::new(),
    }
}

config_struct! {
    /// Playbook execution notifier (fallback poll interval)
    pub struct AnsibleExecProducerConfig {
        enabled: bool = true,
        interval_secs: u64 = 2,

        /// Finished runs buffered between polls
        feed_capacity: usize = 64,
    }
}

config_struct! {
    /// All producer settings
    pub struct ProducersConfig {
        metrics: MetricsProducerConfig = MetricsProducerConfig::default(),
        docker_logs: DockerLogsProducerConfig = DockerLogsProducerConfig::default(),
        k8s_events: K8sEventsProducerConfig = K8sEventsProducerConfig::default(),
        ansible_exec: AnsibleExecProducerConfig = AnsibleExecProducerConfig::default(),
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration
    pub struct Config {
        server: ServerConfig = ServerConfig::default(),
        websocket: WebsocketConfig = WebsocketConfig::default(),
        producers: ProducersConfig = ProducersConfig::default(),
    }
}
