//! Server façade for the agent session protocol.
//!
//! Hosts one axum route, `/v1/sessions/ws`, which upgrades to a WebSocket
//! and hands the connection to a per-session [`agent_core::Orchestrator`].
//! Everything reasoning-loop-shaped lives in `agent-core`; this crate is
//! wiring: config, auth, routing, and the concrete [`SessionStorage`] and
//! [`Provider`] the binary runs with.
//!
//! [`SessionStorage`]: agent_core::SessionStorage
//! [`Provider`]: agent_core::Provider

pub mod cli;
pub mod config;
pub mod providers;
pub mod state;
pub mod storage;
pub mod ws;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/sessions/ws", get(ws::sessions_ws))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
