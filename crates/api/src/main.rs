use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use schoolsite_api::config::ServerConfig;
use schoolsite_api::router::build_app_router;
use schoolsite_api::state::AppState;
use schoolsite_api::storage::build_blob_store;
use schoolsite_core::storage::StorageBackendType;
use schoolsite_pipeline::preview::PreviewServer;
use schoolsite_pipeline::{Orchestrator, PgSiteStore, PipelineConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "schoolsite_api=debug,schoolsite_pipeline=debug,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        storage = config.storage.backend.name(),
        themes_dir = %pipeline_config.themes_dir.display(),
        sites_dir = %pipeline_config.sites_dir.display(),
        generator = %pipeline_config.generator.program,
        "Loaded server configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = schoolsite_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    schoolsite_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    schoolsite_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Pipeline ---
    let blobs = build_blob_store(&config.storage)
        .await
        .context("Failed to configure blob storage")?;
    tokio::fs::create_dir_all(&pipeline_config.sites_dir)
        .await
        .context("Failed to create sites directory")?;

    let store = Arc::new(PgSiteStore::new(pool.clone()));
    let mut orchestrator = Orchestrator::new(store, blobs, &pipeline_config)
        .context("Failed to initialise the build pipeline")?;
    if config.storage.backend == StorageBackendType::Local {
        orchestrator = orchestrator.with_asset_mount_root(config.storage.upload_dir.clone());
    }
    let preview = Arc::new(PreviewServer::new(pipeline_config.preview_addr));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        orchestrator: Arc::new(orchestrator),
        preview: Arc::clone(&preview),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config
            .host
            .parse::<std::net::IpAddr>()
            .context("Invalid HOST address")?,
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, "Starting server");

    // In-flight requests get `shutdown_timeout_secs` to drain after a signal.
    let shutdown_grace = Duration::from_secs(config.shutdown_timeout_secs);
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    let drain_deadline = async move {
        match signalled_rx.await {
            Ok(()) => tokio::time::sleep(shutdown_grace).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => result.context("Server error")?,
        () = drain_deadline => {
            tracing::warn!(grace_secs = config.shutdown_timeout_secs, "In-flight requests did not drain in time");
        }
    }

    // --- Post-shutdown cleanup ---
    if let Some(stopped) = preview.stop().await {
        tracing::info!(website_id = stopped.website_id, "Preview stopped on shutdown");
    }
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
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
