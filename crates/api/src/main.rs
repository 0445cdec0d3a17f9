use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vinspect_api::config::ServerConfig;
use vinspect_api::router::build_app_router;
use vinspect_api::state::AppState;
use vinspect_db::{InspectionStore, LocalObjectStore, MemoryInspectionStore, PgInspectionStore};
use vinspect_events::InspectionBus;
use vinspect_live::{HotStore, InspectionService, LiveConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vinspect_api=debug,vinspect_live=debug,tower_http=debug".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let live_config = LiveConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        hot_ttl_secs = live_config.hot_ttl.as_secs(),
        flush_debounce_ms = live_config.flush.debounce.as_millis() as u64,
        subscriber_queue_capacity = live_config.subscriber_queue_capacity,
        "Loaded live core configuration"
    );

    // --- Durable store ---
    let durable: Arc<dyn InspectionStore> = match &config.database_url {
        Some(database_url) => {
            let pool = vinspect_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            vinspect_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            vinspect_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgInspectionStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-process store (data is lost on exit)");
            Arc::new(MemoryInspectionStore::new())
        }
    };

    // --- Object storage ---
    let objects = Arc::new(LocalObjectStore::new(
        &config.object_storage_root,
        &config.object_storage_base_url,
    ));

    // --- Live core ---
    let hot = Arc::new(HotStore::new(live_config.hot_ttl));
    let bus = InspectionBus::new(live_config.subscriber_queue_capacity);
    let service = Arc::new(InspectionService::new(hot, bus, durable, objects, live_config));
    tracing::info!("Live inspection core started");

    let sweeper_cancel = CancellationToken::new();
    let sweeper_handle = tokio::spawn(vinspect_live::sweeper::run(
        Arc::clone(&service),
        sweeper_cancel.clone(),
    ));

    // --- Router ---
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let app = build_app_router(AppState {
        service: Arc::clone(&service),
        config: Arc::new(config),
    });

    // --- Start server ---
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweeper_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await;

    // Flush every pending mutation before the process exits.
    service.shutdown(shutdown_timeout).await;

    tracing::info!("Shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
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
