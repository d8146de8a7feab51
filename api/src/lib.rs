//! Reflect API Crate
//!
//! HTTP layer of the video reflector using Axum.
//!
//! # Routes
//!
//! - `GET /signal`: WebSocket carrying the browser's offer in and the answer out
//! - `GET /observer`: WebSocket streaming SDP and stats envelopes to monitors
//! - `GET /health`: session state as JSON
//!
//! # Usage
//!
//! ```rust,no_run
//! use reflect_api::{run_server, ApiConfig, ApiState};
//! use reflect_webrtc::{signaling_channel, ReflectConfig, Reflector};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reflector = Reflector::new(ReflectConfig::default());
//!     let session = reflector.start().await?;
//!     let (channel, bridge) = signaling_channel();
//!
//!     let state = ApiState::new(bridge, reflector.observer(), session.control());
//!     tokio::spawn(run_server(state, ApiConfig::default()));
//!
//!     session.negotiate(channel).await?;
//!     session.terminated().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod config;
mod error;
mod middleware;
mod router;
mod routes;
mod state;

// Re-export public API
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ProblemDetails};
pub use routes::health::HealthResponse;
pub use state::ApiState;

use axum::Router;
use tokio::net::TcpListener;

/// Build the router without binding a socket.
///
/// Useful for driving the routes with `tower::ServiceExt::oneshot` in tests.
pub fn build_router(state: ApiState, config: &ApiConfig) -> Router {
    router::configure_routes(state, config)
}

/// Bind `config.listen_addr()` and serve until `state.shutdown` is cancelled.
///
/// Fails if the address cannot be bound or the accept loop dies.
pub async fn run_server(state: ApiState, config: ApiConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.listen_addr()).await?;
    serve(listener, state, config).await
}

/// Serve on an already bound listener until `state.shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    config: ApiConfig,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Reflect signaling server listening on http://{}", addr);
    tracing::info!("Signaling socket:  ws://{}/signal", addr);
    tracing::info!("Observer socket:   ws://{}/observer", addr);

    let shutdown = state.shutdown.clone();
    let app = router::configure_routes(state, &config);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Signaling server stopped");
    Ok(())
}
