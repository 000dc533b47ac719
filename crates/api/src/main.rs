use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orchestra_api::config::ServerConfig;
use orchestra_api::engine::StatusReconciler;
use orchestra_api::router::build_app_router;
use orchestra_api::state::AppState;
use orchestra_db::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = orchestra_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    orchestra_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    orchestra_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let store = Arc::new(PgStore::new(pool));

    // --- Registries ---
    let schedulers = orchestra_scheduler::default_registry();
    let scheduler = schedulers
        .get(&config.scheduler)
        .with_context(|| format!("Unknown scheduler {:?}", config.scheduler))?;

    let messengers = Arc::new(
        orchestra_messenger::build_registry(&config.messenger)
            .await
            .context("Failed to build messenger registry")?,
    );
    let status_messenger = messengers
        .get(&config.status_messenger)
        .with_context(|| format!("Status messenger {:?} is not enabled", config.status_messenger))?;

    // --- Status reconciler ---
    let cancel = CancellationToken::new();
    let reconciler = Arc::new(StatusReconciler::new(store.clone()));
    let reconciler_handle = {
        let cancel = cancel.clone();
        let subscription = config.status_subscription.clone();
        tokio::spawn(async move {
            tracing::info!(subscription = %subscription, "Status reconciler started");
            if let Err(e) = status_messenger
                .subscribe(&subscription, reconciler, None, &cancel)
                .await
            {
                tracing::error!(error = %e, "Status subscription failed");
            }
        })
    };

    // --- App state ---
    let state = AppState {
        store,
        scheduler,
        messengers,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().context("Invalid HOST address")?,
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, reconciler_handle).await.is_err() {
        tracing::warn!("Status reconciler did not stop in time");
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// `RUST_LOG` selects levels; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "orchestra_api=debug,orchestra_messenger=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
