use std::time::Duration;

use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use peer_signal_protocol::PeerId;
use serde::Deserialize;

use crate::config::Config;
use crate::connection::peer_connected;
use crate::relay::{Relay, RelayStats};

#[derive(Clone)]
pub struct ServerState {
    relay: Relay,
    idle_timeout: Option<Duration>,
}

impl ServerState {
    pub const fn new(relay: Relay, idle_timeout: Option<Duration>) -> Self {
        Self {
            relay,
            idle_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Relay::new(config.mode), config.idle_timeout())
    }

    pub const fn relay(&self) -> &Relay {
        &self.relay
    }
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    uuid: Option<PeerId>,
}

#[allow(clippy::unused_async)]
async fn health_handler() -> &'static str {
    "OK"
}

async fn stats_handler(State(state): State<ServerState>) -> Json<RelayStats> {
    Json(state.relay.stats().await)
}

#[allow(clippy::unused_async)]
async fn signaling_handler(
    State(state): State<ServerState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let claimed = params.uuid.filter(|uuid| !uuid.as_str().is_empty());
    ws.on_upgrade(move |socket| {
        peer_connected(socket, state.relay, claimed, state.idle_timeout)
    })
}

pub fn create(server_state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/ws", get(signaling_handler))
        .with_state(server_state)
}
