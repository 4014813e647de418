//! Router assembly and the serve loop.

use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::ServerResult;
use crate::routes;
use crate::signals::ShutdownHandle;
use crate::state::AppState;

/// Builds the HTTP application.
pub fn app(state: AppState) -> Router {
    routes::router()
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Serves until `shutdown` fires, then stops every channel.
///
/// Channel teardown is bounded by the configured shutdown timeout.
pub async fn serve(state: AppState, shutdown: ShutdownHandle) -> ServerResult<()> {
    let addr = state.config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    if state.auth.is_authorized() {
        // Tokens were persisted by an earlier run; resume watching.
        match state.register_channel().await {
            Ok(channel) => info!(channel_id = %channel.channel_id, "resumed watching calendar"),
            Err(e) => warn!(error = %e, "could not resume watching, visit / to re-authorize"),
        }
    } else {
        info!(url = %format!("http://{}/", addr), "open this page to authorize");
    }

    let renewal = tokio::spawn(renewal_loop(state.clone(), shutdown.clone()));

    let signal = shutdown.clone();
    axum::serve(listener, app(state.clone()))
        .with_graceful_shutdown(async move { signal.wait().await })
        .await?;

    // Covers the case where the server stopped on its own.
    shutdown.trigger();
    let _ = renewal.await;

    teardown(&state).await;
    Ok(())
}

async fn teardown(state: &AppState) {
    let budget = state.config.shutdown_timeout;
    match tokio::time::timeout(budget, state.unsubscribe_all()).await {
        Ok(report) if report.is_clean() => {
            info!(stopped = report.stopped.len(), "shutdown complete");
        }
        Ok(report) => {
            warn!(
                stopped = report.stopped.len(),
                failed = report.failed.len(),
                "shutdown complete, some channels were left open"
            );
        }
        Err(_) => warn!(timeout = ?budget, "channel teardown timed out"),
    }
}

/// Periodically renews channels that are about to expire.
async fn renewal_loop(state: AppState, shutdown: ShutdownHandle) {
    let period = state.config.renew_interval.max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = interval.tick() => {
                match state.renew_channels().await {
                    Ok(0) => {}
                    Ok(renewed) => info!(renewed, "channels renewed"),
                    Err(e) => warn!(error = %e, "channel renewal failed"),
                }
            }
        }
    }
    debug!("renewal task stopped");
}
