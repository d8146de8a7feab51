//! Router configuration and setup.

use axum::{routing::get, Router};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{config::ApiConfig, middleware, routes, state::ApiState};

/// Build the router: signaling and observer sockets plus health.
pub fn configure_routes(mut state: ApiState, config: &ApiConfig) -> Router {
    state.max_message_bytes = config.max_message_bytes;

    Router::new()
        .route("/signal", get(routes::signal::signal_upgrade))
        .route("/observer", get(routes::observer::observer_upgrade))
        .route("/health", get(routes::health::health))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::cors_layer(config))
        .with_state(state)
}
