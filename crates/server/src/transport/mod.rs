// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport (spec.md §4.1): the secured, text-framed WebSocket endpoint
//! that both Clients and Operators connect to, and TLS certificate loading.

pub mod tls;
pub mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::ServerState;

/// Build the axum `Router` serving the single combined control-plane socket.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let endpoint = state.config.endpoint_path.clone();
    Router::new()
        .route("/healthz", get(health))
        .route(&endpoint, get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
