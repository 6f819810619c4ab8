/// Error types for controlwire
///
/// Each layer has its own enum; nothing in the broadcast core is fatal,
/// so only configuration errors ever stop the process.
use thiserror::Error;

// =============================================================================
// CONFIGURATION ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// =============================================================================
// COLLECTOR ERRORS
// =============================================================================

/// Failure of one collaborator call during one producer tick
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Timed out after {seconds}s waiting for {collaborator}")]
    Timeout {
        collaborator: &'static str,
        seconds: u64,
    },

    #[error("Unexpected {collaborator} output: {reason}")]
    Parse {
        collaborator: &'static str,
        reason: String,
    },
}

impl CollectorError {
    /// Whether the next tick has a reasonable chance of succeeding
    ///
    /// A missing binary or unparseable output will usually repeat until
    /// an operator intervenes; everything else is expected to clear up.
    pub fn is_transient(&self) -> bool {
        match self {
            CollectorError::Spawn { source, .. } => {
                source.kind() != std::io::ErrorKind::NotFound
                    && source.kind() != std::io::ErrorKind::PermissionDenied
            }
            CollectorError::Parse { .. } => false,
            CollectorError::Unavailable { .. }
            | CollectorError::CommandFailed { .. }
            | CollectorError::Timeout { .. } => true,
        }
    }
}

// =============================================================================
// HUB ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum HubError {
    /// The hub actor is gone; no further commands can be processed
    #[error("Hub command channel closed")]
    Closed,

    #[error("Failed to serialize envelope: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let missing = CollectorError::Spawn {
            command: "docker ps".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(!missing.is_transient());

        let failed = CollectorError::CommandFailed {
            command: "kubectl get events".to_string(),
            status: 1,
            stderr: "connection refused".to_string(),
        };
        assert!(failed.is_transient());

        let garbled = CollectorError::Parse {
            collaborator: "kubectl",
            reason: "expected object".to_string(),
        };
        assert!(!garbled.is_transient());
    }

    #[test]
    fn test_display() {
        let err = CollectorError::Timeout {
            collaborator: "docker",
            seconds: 10,
        };
        assert_eq!(err.to_string(), "Timed out after 10s waiting for docker");
    }
}
