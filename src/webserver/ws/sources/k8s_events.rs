use async_trait::async_trait;
use std::collections::HashSet;

use crate::collectors::KubectlCli;
use crate::errors::CollectorError;
use crate::logger::{self, LogTag};
use crate::webserver::ws::message::Event;
use crate::webserver::ws::producers::EventSource;

/// Orchestrator events not seen on the previous tick, one `k8s-event` each
///
/// The first successful poll only records what already exists, so a
/// restart does not replay the cluster's event history.
pub struct KubeEventSource {
    kubectl: KubectlCli,
    /// Keys of the last listing; replaced wholesale every tick
    seen: HashSet<String>,
    primed: bool,
}

impl KubeEventSource {
    pub fn new(kubectl: KubectlCli) -> Self {
        Self {
            kubectl,
            seen: HashSet::new(),
            primed: false,
        }
    }
}

#[async_trait]
impl EventSource for KubeEventSource {
    fn name(&self) -> &'static str {
        "k8s-events"
    }

    async fn poll(&mut self) -> Result<Vec<Event>, CollectorError> {
        let observed = self.kubectl.events().await?;

        let mut current = HashSet::with_capacity(observed.len());
        let mut events = Vec::new();
        for item in observed {
            if self.primed && !self.seen.contains(&item.key) {
                events.push(Event::K8sEvent(item.event));
            }
            current.insert(item.key);
        }

        if !self.primed {
            logger::debug(
                LogTag::Collector,
                &format!("kubectl: primed with {} existing events", current.len()),
            );
            self.primed = true;
        }
        self.seen = current;

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::command::testing::ScriptedRunner;
    use std::sync::Arc;

    fn listing(items: &[(&str, &str, &str)]) -> String {
        let items: Vec<serde_json::Value> = items
            .iter()
            .map(|(uid, version, reason)| {
                serde_json::json!({
                    "metadata": {"name": format!("ev-{}", uid), "namespace": "default", "uid": uid, "resourceVersion": version},
                    "type": "Normal",
                    "reason": reason,
                    "message": "",
                    "involvedObject": {"kind": "Pod", "name": "web-0"},
                    "lastTimestamp": "2024-05-01T12:00:00Z"
                })
            })
            .collect();
        serde_json::json!({ "items": items }).to_string()
    }

    fn reasons(events: &[Event]) -> Vec<String> {
        events
            .iter()
            .map(|event| match event {
                Event::K8sEvent(e) => e.reason.clone(),
                other => panic!("unexpected event {:?}", other),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_reports_only_new_events() {
        let runner = Arc::new(ScriptedRunner::default());
        let mut source = KubeEventSource::new(KubectlCli::new(runner.clone(), "kubectl", ""));

        runner.push_stdout(&listing(&[("u1", "1", "Scheduled")]));
        assert!(source.poll().await.unwrap().is_empty());

        runner.push_stdout(&listing(&[("u1", "1", "Scheduled"), ("u2", "5", "Pulled")]));
        assert_eq!(reasons(&source.poll().await.unwrap()), vec!["Pulled"]);

        // Updated object (new resourceVersion) is reported again
        runner.push_stdout(&listing(&[("u1", "1", "Scheduled"), ("u2", "6", "Pulled")]));
        assert_eq!(reasons(&source.poll().await.unwrap()), vec!["Pulled"]);

        // Expired events leave the seen-set
        runner.push_stdout(&listing(&[("u2", "6", "Pulled")]));
        assert!(source.poll().await.unwrap().is_empty());
        assert_eq!(source.seen.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_state() {
        let runner = Arc::new(ScriptedRunner::default());
        let mut source = KubeEventSource::new(KubectlCli::new(runner.clone(), "kubectl", ""));

        runner.push_stdout(&listing(&[("u1", "1", "Scheduled")]));
        source.poll().await.unwrap();

        runner.push_error(CollectorError::Timeout {
            collaborator: "kubectl",
            seconds: 10,
        });
        assert!(source.poll().await.is_err());

        runner.push_stdout(&listing(&[("u1", "1", "Scheduled")]));
        assert!(source.poll().await.unwrap().is_empty());
    }
}
