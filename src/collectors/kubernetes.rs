/// Orchestrator client (kubectl CLI)
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::errors::CollectorError;
use crate::webserver::ws::message::{ClusterEvent, ObjectRef};

use super::command::CommandRunner;

const COLLABORATOR: &str = "kubectl";

/// A cluster event together with its identity
///
/// `key` changes whenever the event object is updated (count bump,
/// new message), so a repeated warning is reported again.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedEvent {
    pub key: String,
    pub event: ClusterEvent,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    metadata: RawMetadata,
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    involved_object: RawObjectRef,
    #[serde(default)]
    count: Option<u32>,
    #[serde(default)]
    last_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    event_time: Option<DateTime<Utc>>,
    #[serde(default)]
    first_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    uid: String,
    #[serde(default)]
    resource_version: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawObjectRef {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    name: String,
}

impl RawEvent {
    fn into_observed(self) -> ObservedEvent {
        let identity = if self.metadata.uid.is_empty() {
            format!("{}/{}", self.metadata.namespace, self.metadata.name)
        } else {
            self.metadata.uid.clone()
        };
        let key = format!("{}/{}", identity, self.metadata.resource_version);

        ObservedEvent {
            key,
            event: ClusterEvent {
                namespace: self.metadata.namespace,
                name: self.metadata.name,
                event_type: self.event_type,
                reason: self.reason,
                message: self.message,
                object: ObjectRef {
                    kind: self.involved_object.kind,
                    name: self.involved_object.name,
                },
                count: self.count.unwrap_or(1),
                last_seen: self
                    .last_timestamp
                    .or(self.event_time)
                    .or(self.first_timestamp),
            },
        }
    }
}

#[derive(Clone)]
pub struct KubectlCli {
    runner: Arc<dyn CommandRunner>,
    bin: String,
    /// Empty means all namespaces
    namespace: String,
}

impl KubectlCli {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        bin: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            bin: bin.into(),
            namespace: namespace.into(),
        }
    }

    /// Current event list, oldest first
    pub async fn events(&self) -> Result<Vec<ObservedEvent>, CollectorError> {
        let mut args = vec!["get".to_string(), "events".to_string()];
        if self.namespace.is_empty() {
            args.push("--all-namespaces".to_string());
        } else {
            args.push("-n".to_string());
            args.push(self.namespace.clone());
        }
        args.push("-o".to_string());
        args.push("json".to_string());

        let output = self.runner.run(&self.bin, &args).await?;
        parse_events(&output.stdout)
    }
}

fn parse_events(stdout: &str) -> Result<Vec<ObservedEvent>, CollectorError> {
    let list: EventList = serde_json::from_str(stdout).map_err(|e| CollectorError::Parse {
        collaborator: COLLABORATOR,
        reason: format!("event list: {}", e),
    })?;

    let mut events: Vec<ObservedEvent> = list
        .items
        .into_iter()
        .map(RawEvent::into_observed)
        .collect();
    events.sort_by_key(|observed| observed.event.last_seen);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::command::testing::ScriptedRunner;

    const EVENTS_JSON: &str = r#"{
        "apiVersion": "v1",
        "kind": "List",
        "items": [
            {
                "metadata": {"name": "web.17a", "namespace": "default", "uid": "u-2", "resourceVersion": "900"},
                "type": "Warning",
                "reason": "BackOff",
                "message": "Back-off restarting failed container",
                "involvedObject": {"kind": "Pod", "name": "web-0"},
                "count": 4,
                "lastTimestamp": "2024-05-01T12:05:00Z"
            },
            {
                "metadata": {"name": "web.17b", "namespace": "default", "uid": "u-1", "resourceVersion": "800"},
                "type": "Normal",
                "reason": "Scheduled",
                "message": "Successfully assigned default/web-0",
                "involvedObject": {"kind": "Pod", "name": "web-0"},
                "lastTimestamp": null,
                "eventTime": "2024-05-01T12:00:00.000000Z"
            }
        ]
    }"#;

    #[test]
    fn test_parse_events() {
        let events = parse_events(EVENTS_JSON).unwrap();
        assert_eq!(events.len(), 2);

        // Oldest first
        assert_eq!(events[0].event.reason, "Scheduled");
        assert_eq!(events[0].event.count, 1);
        assert_eq!(events[0].key, "u-1/800");
        assert_eq!(events[1].event.event_type, "Warning");
        assert_eq!(events[1].event.object.name, "web-0");
        assert_eq!(events[1].event.count, 4);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_events("").is_err());
        assert!(parse_events(r#"{"items": []}"#).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_namespace_args() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.push_stdout(r#"{"items": []}"#);
        runner.push_stdout(r#"{"items": []}"#);

        KubectlCli::new(runner.clone(), "kubectl", "")
            .events()
            .await
            .unwrap();
        KubectlCli::new(runner.clone(), "kubectl", "prod")
            .events()
            .await
            .unwrap();

        let calls = runner.calls();
        assert!(calls[0].contains(&"--all-namespaces".to_string()));
        assert_eq!(calls[1][3..5], ["-n".to_string(), "prod".to_string()]);
    }
}
