//! Built-in event sources, one per collaborator class
//!
//! - `metrics`: host sampler, `metrics`
//! - `docker_logs`: container runtime logs, `docker-log`
//! - `k8s_events`: orchestrator events, `k8s-event`
//! - `ansible_exec`: finished playbook runs, `ansible-exec`
pub mod ansible_exec;
pub mod docker_logs;
pub mod k8s_events;
pub mod metrics;

pub use ansible_exec::{PlaybookRunNotifier, PlaybookRunSource};
pub use docker_logs::DockerLogSource;
pub use k8s_events::KubeEventSource;
pub use metrics::SystemMetricsSource;

use std::sync::Arc;
use std::time::Duration;

use crate::collectors::{CommandRunner, DockerCli, KubectlCli};
use crate::config::ProducersConfig;
use crate::logger::{self, LogTag};

use super::producers::Producer;

/// Build the enabled producers
///
/// `runs` is the source half of the playbook feed; it is dropped when the
/// ansible-exec producer is disabled, which makes every report a no-op.
pub fn build_producers(
    config: &ProducersConfig,
    runner: Arc<dyn CommandRunner>,
    runs: PlaybookRunSource,
) -> Vec<Producer> {
    let mut producers = Vec::new();

    if config.metrics.enabled {
        producers.push(Producer::new(
            Duration::from_secs(config.metrics.interval_secs),
            Box::new(SystemMetricsSource::new()),
        ));
    }

    if config.docker_logs.enabled {
        let docker = DockerCli::new(Arc::clone(&runner), config.docker_logs.docker_bin.clone());
        producers.push(Producer::new(
            Duration::from_secs(config.docker_logs.interval_secs),
            Box::new(DockerLogSource::new(docker, config.docker_logs.tail_lines)),
        ));
    }

    if config.k8s_events.enabled {
        let kubectl = KubectlCli::new(
            Arc::clone(&runner),
            config.k8s_events.kubectl_bin.clone(),
            config.k8s_events.namespace.clone(),
        );
        producers.push(Producer::new(
            Duration::from_secs(config.k8s_events.interval_secs),
            Box::new(KubeEventSource::new(kubectl)),
        ));
    }

    if config.ansible_exec.enabled {
        producers.push(Producer::new(
            Duration::from_secs(config.ansible_exec.interval_secs),
            Box::new(runs),
        ));
    }

    if producers.is_empty() {
        logger::warning(
            LogTag::Producer,
            "All producers are disabled; clients will only receive pings",
        );
    }

    producers
}
