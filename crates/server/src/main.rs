use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvester_core::{
    config_fingerprint, create_audit_system, load_config, validate_config, AuditStore, Collector,
    HarvestDriver, JobExecutor, SqliteAuditStore, SqliteProbeCollector, SqliteWarehouse,
    TaskExecutor, UnconfiguredCollector, WorkCatalog,
};

use harvester_server::{api::create_router, state::AppState};

/// Buffer size for the audit record channel
const AUDIT_BUFFER_SIZE: usize = 100;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("HARVESTER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_hash = config_fingerprint(&config);
    info!("Configuration loaded successfully (fingerprint {})", config_hash);
    info!("Database path: {:?}", config.database.path);
    info!(
        "Driver: batch_size={}, time_zone={}, max_concurrent_jobs={}",
        config.driver.batch_size, config.driver.time_zone, config.driver.max_concurrent_jobs
    );

    // Warehouse holds the catalog and the collection targets
    let warehouse = Arc::new(
        SqliteWarehouse::new(&config.database.path).context("Failed to open warehouse")?,
    );
    info!("Warehouse initialized");

    // Create SQLite audit store
    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    info!("Audit store initialized");

    // Create audit system
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);

    // Spawn audit writer task
    let writer_handle = tokio::spawn(audit_writer.run());

    // Create collector
    let collector: Arc<dyn Collector> = match &config.source {
        Some(source) => {
            info!("Probing source database at {:?}", source.path);
            Arc::new(SqliteProbeCollector::new(&source.path))
        }
        None => {
            warn!("No source configured; every job will fail until [source] is set");
            Arc::new(UnconfiguredCollector)
        }
    };

    let executor = Arc::new(TaskExecutor::new(
        collector,
        config.driver.max_concurrent_jobs,
    ));

    // The warehouse doubles as the work catalog
    let catalog: Arc<dyn WorkCatalog> = warehouse.clone();
    let job_executor: Arc<dyn JobExecutor> = executor.clone();
    let driver = HarvestDriver::new(&config.driver, catalog, job_executor, Arc::clone(&warehouse))
        .context("Failed to create driver")?
        .with_audit(audit_handle.with_config_hash(config_hash));

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        driver,
        Arc::clone(&executor),
        warehouse,
        audit_store,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    executor.close();

    // The router (and the driver's AuditHandle inside AppState) is dropped by now,
    // so the writer drains its channel and exits.
    let _ = writer_handle.await;
    info!("Audit writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
