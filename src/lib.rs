pub mod arguments;
pub mod collectors;
pub mod config;
pub mod errors;
pub mod logger;
pub mod run;
pub mod shutdown;
pub mod webserver;
