//! Collaborator clients used by the event sources
//!
//! - `command`: external process runner (`CommandRunner`)
//! - `docker`: container runtime CLI (`docker ps`, `docker logs`)
//! - `kubernetes`: orchestrator CLI (`kubectl get events`)
//! - `system`: local host sampler
//!
//! Every call returns `CollectorError` on failure; none of them retry.
//! Retrying is the producer's job, one attempt per tick.
pub mod command;
pub mod docker;
pub mod kubernetes;
pub mod system;

pub use command::{CommandOutput, CommandRunner, ProcessRunner};
pub use docker::{ContainerSummary, DockerCli};
pub use kubernetes::KubectlCli;
pub use system::HostSampler;
