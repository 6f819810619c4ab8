//! HTTP and WebSocket surface
//!
//! - `server`: listener binding and graceful serving
//! - `routes`: `/ws` upgrade and `/api/health`
//! - `state`: shared `AppState`
//! - `ws`: hub, connections, producers and event sources
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use server::{bind, build_app, serve};
pub use state::AppState;
