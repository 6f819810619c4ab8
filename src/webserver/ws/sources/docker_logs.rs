use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::collectors::DockerCli;
use crate::errors::CollectorError;
use crate::logger::{self, LogTag};
use crate::webserver::ws::message::{ContainerLogs, Event, LogLine};
use crate::webserver::ws::producers::EventSource;

/// New log lines of every running container, one `docker-log` event per
/// container that produced output since the previous tick
///
/// A container seen for the first time gets its last `tail_lines` lines;
/// after that only lines newer than its cursor are reported.
pub struct DockerLogSource {
    docker: DockerCli,
    tail_lines: usize,
    /// Last reported line timestamp per container id
    cursors: HashMap<String, DateTime<Utc>>,
}

impl DockerLogSource {
    pub fn new(docker: DockerCli, tail_lines: usize) -> Self {
        Self {
            docker,
            tail_lines,
            cursors: HashMap::new(),
        }
    }

    async fn container_logs(
        &mut self,
        id: &str,
        name: &str,
    ) -> Result<Option<ContainerLogs>, CollectorError> {
        let since = self.cursors.get(id).copied();
        let lines = self.docker.logs(id, self.tail_lines, since).await?;

        let fresh: Vec<LogLine> = lines
            .into_iter()
            .filter(|line| match (since, line.timestamp) {
                (Some(cursor), Some(stamp)) => stamp > cursor,
                _ => true,
            })
            .collect();

        if let Some(latest) = fresh.iter().filter_map(|line| line.timestamp).max() {
            self.cursors.insert(id.to_string(), latest);
        }

        if fresh.is_empty() {
            return Ok(None);
        }
        Ok(Some(ContainerLogs {
            container_id: id.to_string(),
            container_name: name.to_string(),
            lines: fresh,
        }))
    }
}

#[async_trait]
impl EventSource for DockerLogSource {
    fn name(&self) -> &'static str {
        "docker-logs"
    }

    async fn poll(&mut self) -> Result<Vec<Event>, CollectorError> {
        let containers = self.docker.running_containers().await?;

        let running: HashSet<&str> = containers.iter().map(|c| c.id.as_str()).collect();
        self.cursors.retain(|id, _| running.contains(id.as_str()));

        let mut events = Vec::new();
        let mut first_error = None;
        let mut failed = 0usize;

        for container in &containers {
            match self.container_logs(&container.id, &container.name).await {
                Ok(Some(logs)) => events.push(Event::DockerLog(logs)),
                Ok(None) => {}
                Err(e) => {
                    failed += 1;
                    logger::debug(
                        LogTag::Collector,
                        &format!("docker logs {} failed: {}", container.name, e),
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        // Partial failure still reports what was fetched
        if failed == containers.len() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::command::testing::ScriptedRunner;
    use std::sync::Arc;

    const PS_ONE: &str = r#"{"ID":"c1","Names":"web","Image":"nginx","State":"running","Status":"Up"}"#;

    fn source(runner: &Arc<ScriptedRunner>) -> DockerLogSource {
        DockerLogSource::new(DockerCli::new(runner.clone(), "docker"), 50)
    }

    fn logs_of(event: &Event) -> &ContainerLogs {
        match event {
            Event::DockerLog(logs) => logs,
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_only_new_lines_are_reported() {
        let runner = Arc::new(ScriptedRunner::default());
        let mut source = source(&runner);

        // Tick 1: first sight, tail
        runner.push_stdout(PS_ONE);
        runner.push_stdout("2024-05-01T12:00:00Z a\n2024-05-01T12:00:01Z b\n");
        let events = source.poll().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(logs_of(&events[0]).container_name, "web");
        assert_eq!(logs_of(&events[0]).lines.len(), 2);

        // Tick 2: runtime repeats the line at the cursor
        runner.push_stdout(PS_ONE);
        runner.push_stdout("2024-05-01T12:00:01Z b\n2024-05-01T12:00:02Z c\n");
        let events = source.poll().await.unwrap();
        let lines = &logs_of(&events[0]).lines;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].message, "c");

        // Tick 3: nothing new, no event
        runner.push_stdout(PS_ONE);
        runner.push_stdout("2024-05-01T12:00:02Z c\n");
        assert!(source.poll().await.unwrap().is_empty());

        let calls = runner.calls();
        assert!(!calls[1].contains(&"--since".to_string()));
        assert!(calls[3].contains(&"--since".to_string()));
    }

    #[tokio::test]
    async fn test_cursors_pruned_for_stopped_containers() {
        let runner = Arc::new(ScriptedRunner::default());
        let mut source = source(&runner);

        runner.push_stdout(PS_ONE);
        runner.push_stdout("2024-05-01T12:00:00Z a\n");
        source.poll().await.unwrap();
        assert!(source.cursors.contains_key("c1"));

        runner.push_stdout("");
        assert!(source.poll().await.unwrap().is_empty());
        assert!(source.cursors.is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_is_an_error() {
        let runner = Arc::new(ScriptedRunner::default());
        let mut source = source(&runner);

        runner.push_error(CollectorError::CommandFailed {
            command: "docker ps".to_string(),
            status: 1,
            stderr: "Cannot connect to the Docker daemon".to_string(),
        });
        let err = source.poll().await.unwrap_err();
        assert!(err.is_transient());
    }
}
