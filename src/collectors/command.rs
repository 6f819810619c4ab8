/// External command execution
///
/// `CommandRunner` is the seam between the CLI-backed collectors and the
/// operating system, so the collectors can be tested with canned output.
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::errors::CollectorError;
use crate::logger::{self, LogTag};

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion
    ///
    /// A non-zero exit status is an error.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CollectorError>;
}

/// Runs commands as child processes, killed if they outlive `timeout`
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CollectorError> {
        let command_line = display_command(program, args);
        logger::verbose(LogTag::Collector, &format!("Running `{}`", command_line));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CollectorError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        // Dropping the future on timeout drops the child, which kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CollectorError::Timeout {
                collaborator: collaborator_name(program),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|source| CollectorError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(CollectorError::CommandFailed {
                command: command_line,
                status: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

fn display_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Static label for timeout errors; anything unknown is reported as "command"
fn collaborator_name(program: &str) -> &'static str {
    let base = program.rsplit('/').next().unwrap_or(program);
    match base {
        "docker" | "podman" => "docker",
        "kubectl" | "oc" => "kubectl",
        _ => "command",
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned results and records every invocation
    #[derive(Default)]
    pub struct ScriptedRunner {
        responses: Mutex<VecDeque<Result<CommandOutput, CollectorError>>>,
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        pub fn push_stdout(&self, stdout: &str) {
            self.responses.lock().unwrap().push_back(Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
            }));
        }

        pub fn push_output(&self, stdout: &str, stderr: &str) {
            self.responses.lock().unwrap().push_back(Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }));
        }

        pub fn push_error(&self, error: CollectorError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            program: &str,
            args: &[String],
        ) -> Result<CommandOutput, CollectorError> {
            let mut call = vec![program.to_string()];
            call.extend(args.iter().cloned());
            self.calls.lock().unwrap().push(call);

            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CommandOutput::default()))
        }
    }
}
