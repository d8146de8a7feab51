//! Process bootstrap: one reflector session behind one signaling server.

use anyhow::{anyhow, Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use reflect_api::{ApiConfig, ApiState};
use reflect_webrtc::{
    signaling_channel, ChannelSignaling, ObserverHub, ReflectError, ReflectResult,
    ReflectSession, Reflector, TerminationReason,
};

use crate::config::ServerConfig;

const API_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the process is stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The peer connection reported a terminal failure
    ConnectivityFailure,
    /// The session was closed from inside the process
    SessionClosed,
    /// The shutdown signal fired
    Interrupted,
}

/// Run the reflector until the session ends or `shutdown` resolves.
///
/// Handshake failures and a dying signaling server are errors; every other way
/// out is an [`Outcome`].
pub async fn run<F>(config: ServerConfig, shutdown: F) -> Result<Outcome>
where
    F: Future<Output = ()>,
{
    let reflector = Reflector::new(config.reflect.clone());
    let session = reflector
        .start()
        .await
        .context("Failed to initialize the media session")?;

    let outcome = run_session(session, reflector.observer(), &config.api, shutdown).await;

    match &outcome {
        Ok(reason) => info!(outcome = ?reason, "Reflector stopped"),
        Err(e) => error!(error = %e, "Reflector stopped with an error"),
    }
    outcome
}

/// Serve `session` behind the signaling server, then close it on every path.
pub async fn run_session<F>(
    session: ReflectSession,
    observer: Arc<ObserverHub>,
    api_config: &ApiConfig,
    shutdown: F,
) -> Result<Outcome>
where
    F: Future<Output = ()>,
{
    let outcome = serve_session(&session, observer, api_config, shutdown).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close session cleanly");
    }
    outcome
}

async fn serve_session<F>(
    session: &ReflectSession,
    observer: Arc<ObserverHub>,
    api_config: &ApiConfig,
    shutdown: F,
) -> Result<Outcome>
where
    F: Future<Output = ()>,
{
    let listener = TcpListener::bind(api_config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind signaling port {}", api_config.port))?;

    let (channel, bridge) = signaling_channel();
    let api_shutdown = CancellationToken::new();
    let state =
        ApiState::new(bridge, observer, session.control()).with_shutdown(api_shutdown.clone());
    let mut api = tokio::spawn(reflect_api::serve(listener, state, api_config.clone()));

    tokio::pin!(shutdown);
    let outcome = tokio::select! {
        ended = lifecycle(session, channel) => ended,
        _ = &mut shutdown => {
            info!("Shutdown signal received");
            Ok(Outcome::Interrupted)
        }
        joined = &mut api => match joined {
            Ok(Ok(())) => Err(anyhow!("Signaling server stopped unexpectedly")),
            Ok(Err(e)) => Err(e.context("Signaling server failed")),
            Err(e) => Err(anyhow!("Signaling server task panicked: {}", e)),
        },
    };

    api_shutdown.cancel();
    if !api.is_finished() && tokio::time::timeout(API_DRAIN_TIMEOUT, &mut api).await.is_err() {
        warn!("Signaling server did not stop in time");
        api.abort();
    }
    outcome
}

/// Negotiate, then wait for the session to end
async fn lifecycle(session: &ReflectSession, channel: ChannelSignaling) -> Result<Outcome> {
    let ended = match session.negotiate(channel).await {
        Ok(_) => {
            info!(session_id = %session.id(), "Session established, reflecting media");
            Ok(session.terminated().await)
        }
        Err(e) => Err(e),
    };
    outcome_of(ended)
}

fn outcome_of(ended: ReflectResult<TerminationReason>) -> Result<Outcome> {
    match ended {
        Ok(TerminationReason::ConnectivityFailure) => Ok(Outcome::ConnectivityFailure),
        Ok(TerminationReason::Closed) => Ok(Outcome::SessionClosed),
        Err(ReflectError::ConnectivityFailure) => {
            warn!("Connection failed before the handshake finished");
            Ok(Outcome::ConnectivityFailure)
        }
        Err(e) => Err(anyhow::Error::new(e).context("Signaling handshake failed")),
    }
}
