use crate::api::Connector;
use crate::commands::Out;
use crate::server::{build_router, AppState};
use crate::{Config, Result};
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Serves the HTTP API on `bind` until the process receives ctrl-c or SIGTERM.
pub async fn serve(
    config: Config,
    connector: Arc<dyn Connector>,
    bind: SocketAddr,
) -> Result<Out<()>> {
    let app = build_router(AppState::new(Arc::new(config), connector));
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Unable to listen on {bind}"))?;
    info!("Listening on http://{bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("The server stopped unexpectedly")?;

    Ok(Out::new_message("Server stopped"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Unable to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
