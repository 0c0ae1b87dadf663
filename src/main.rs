use std::sync::Arc;

use anyhow::Context;
use payment_chat_gateway::{
    config::Config,
    routes,
    services::{assistant::PaymentAssistant, session_manager::spawn_session_sweeper},
    state::AppState,
    telemetry,
};
use tokio::{net::TcpListener, signal};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    telemetry::init_tracing(&config.log_level);

    let assistant = Arc::new(PaymentAssistant::new(config.session_ttl()));
    spawn_session_sweeper(assistant.sessions().clone(), config.sweep_interval());

    let cors = routes::cors_layer(&config.allow_origins).context("invalid ALLOW_ORIGINS entry")?;
    let state = Arc::new(AppState::new(assistant));
    let app = routes::create_router(&config.static_dir)
        .with_state(state)
        .layer(cors);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(
        %addr,
        static_dir = %config.static_dir.display(),
        version = env!("CARGO_PKG_VERSION"),
        "payment chat gateway listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
