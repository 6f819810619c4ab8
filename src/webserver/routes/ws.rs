/// WebSocket endpoint
///
/// `GET /ws` upgrades and hands the socket to `ws::connection::serve`.
/// Every client receives the full multiplexed envelope stream.
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::{
    logger::{self, LogTag},
    webserver::{state::AppState, ws::connection},
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_hub_handler))
}

/// Upgrade handler; a failed handshake only affects this request
pub async fn ws_hub_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            logger::debug(
                LogTag::Webserver,
                &format!("Rejected WebSocket upgrade: {}", rejection),
            );
            return rejection.into_response();
        }
    };

    let hub = state.hub.clone();
    let config = state.connection;

    upgrade
        .on_failed_upgrade(|e| {
            logger::warning(
                LogTag::Webserver,
                &format!("WebSocket upgrade failed: {}", e),
            );
        })
        .on_upgrade(move |socket| connection::serve(socket, hub, config))
}
