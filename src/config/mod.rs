//! Configuration system
//!
//! - `macros`: the `config_struct!` macro (struct + defaults in one place)
//! - `schemas`: every configuration section
//! - `utils`: loading, validation and CLI overrides
//!
//! The loaded `Config` is passed explicitly to whoever needs it; there is
//! no global instance.
pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{
    AnsibleExecProducerConfig, Config, DockerLogsProducerConfig, K8sEventsProducerConfig,
    MetricsProducerConfig, ProducersConfig, ServerConfig, WebsocketConfig,
};
pub use utils::{apply_cli_overrides, load_config_from_path, validate_config};
