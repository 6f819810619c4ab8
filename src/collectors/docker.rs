/// Container runtime client (docker CLI)
///
/// Two calls are used per tick: `docker ps` to list running containers,
/// then `docker logs --timestamps` for each of them.
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::errors::CollectorError;
use crate::webserver::ws::message::{LogLine, LogStream};

use super::command::CommandRunner;

const COLLABORATOR: &str = "docker";

/// One running container as reported by `docker ps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
}

/// Row of `docker ps --format '{{json .}}'`
#[derive(Debug, Deserialize)]
struct PsRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names", default)]
    names: String,
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Status", default)]
    status: String,
}

#[derive(Clone)]
pub struct DockerCli {
    runner: Arc<dyn CommandRunner>,
    bin: String,
}

impl DockerCli {
    pub fn new(runner: Arc<dyn CommandRunner>, bin: impl Into<String>) -> Self {
        Self {
            runner,
            bin: bin.into(),
        }
    }

    /// List running containers
    pub async fn running_containers(&self) -> Result<Vec<ContainerSummary>, CollectorError> {
        let args = vec![
            "ps".to_string(),
            "--no-trunc".to_string(),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        let output = self.runner.run(&self.bin, &args).await?;
        parse_ps(&output.stdout)
    }

    /// Fetch log lines of one container
    ///
    /// Without `since` the last `tail` lines are returned. With `since`
    /// only lines from that instant on; the runtime may repeat the line
    /// stamped exactly at `since`, callers filter it out.
    pub async fn logs(
        &self,
        container_id: &str,
        tail: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LogLine>, CollectorError> {
        let mut args = vec![
            "logs".to_string(),
            "--timestamps".to_string(),
            "--tail".to_string(),
            tail.to_string(),
        ];
        if let Some(since) = since {
            args.push("--since".to_string());
            args.push(since.to_rfc3339_opts(SecondsFormat::Nanos, true));
        }
        args.push(container_id.to_string());

        let output = self.runner.run(&self.bin, &args).await?;

        let mut lines = parse_log_output(&output.stdout, LogStream::Stdout);
        lines.extend(parse_log_output(&output.stderr, LogStream::Stderr));
        // Stable: lines of one stream keep their order when stamps collide
        lines.sort_by_key(|line| line.timestamp);
        Ok(lines)
    }
}

fn parse_ps(stdout: &str) -> Result<Vec<ContainerSummary>, CollectorError> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let row: PsRow = serde_json::from_str(line).map_err(|e| CollectorError::Parse {
                collaborator: COLLABORATOR,
                reason: format!("docker ps row: {}", e),
            })?;
            // Multiple names are comma separated; the first is the primary
            let name = row.names.split(',').next().unwrap_or_default().to_string();
            Ok(ContainerSummary {
                id: row.id,
                name,
                image: row.image,
                state: row.state,
                status: row.status,
            })
        })
        .collect()
}

/// Parse `--timestamps` output: `<RFC3339Nano> <message>` per line
fn parse_log_output(output: &str, stream: LogStream) -> Vec<LogLine> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| match split_timestamp(line) {
            Some((timestamp, message)) => LogLine {
                timestamp: Some(timestamp),
                stream,
                message: message.to_string(),
            },
            None => LogLine {
                timestamp: None,
                stream,
                message: line.to_string(),
            },
        })
        .collect()
}

fn split_timestamp(line: &str) -> Option<(DateTime<Utc>, &str)> {
    let (stamp, message) = line.split_once(' ').unwrap_or((line, ""));
    let timestamp = DateTime::parse_from_rfc3339(stamp).ok()?;
    Some((timestamp.with_timezone(&Utc), message))
}
