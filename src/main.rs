use anyhow::anyhow;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use telemetry_relay::{
    app::{DEVICE_SOCKET_PATH, VIEWER_SOCKET_PATH},
    build_router,
    cli::{Cli, Commands},
    storage::{DisabledStore, DurableStore, PostgresTelemetryStore},
    RelayConfig, RelayState,
};
use tokio::time;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telemetry_relay=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = RelayConfig::from_env()?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }

    // Lazy pool: an unreachable database must not stop the relay from starting
    let postgres = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(config.store_timeout())
                .connect_lazy(url)?;
            Some(PostgresTelemetryStore::new(pool))
        }
        None => None,
    };

    // Handle CLI commands
    match cli.command {
        Some(Commands::InitDb) => {
            let store = postgres.ok_or_else(|| anyhow!("DATABASE_URL is not set"))?;
            store.initialize().await?;
            println!("Durable schema initialized");
            return Ok(());
        }
        Some(Commands::Logs { limit }) => {
            let store = postgres.ok_or_else(|| anyhow!("DATABASE_URL is not set"))?;
            let events = time::timeout(config.store_timeout(), store.recent_detections(limit))
                .await
                .map_err(|_| {
                    anyhow!(
                        "durable store did not answer within {} ms",
                        config.store_timeout_ms
                    )
                })??;

            println!("{:<16} {:<26} {:>14}", "ID", "Detected at", "Sensor value");
            println!("{}", "-".repeat(58));
            for event in events {
                println!(
                    "{:<16} {:<26} {:>14.2}",
                    event.id,
                    event.detected_at.format("%Y-%m-%d %H:%M:%S%.3f"),
                    event.sensor_value
                );
            }
            return Ok(());
        }
        Some(Commands::Serve) | None => {
            // Continue to run server
        }
    }

    // Server mode
    info!("🚀 Starting Telemetry Relay v{}", VERSION);
    info!("📋 Configuration loaded:");
    info!("   Port: {}", config.port);
    info!("   Bind address: {}", config.bind_addr);
    info!("   Retention: {}s", config.retention_seconds);
    info!(
        "   Ledger: {} events (compacts to {})",
        config.ledger_capacity, config.ledger_compact_to
    );
    info!("   Store timeout: {} ms", config.store_timeout_ms);

    let durable_store = postgres.is_some();
    let store: Arc<dyn DurableStore> = match postgres {
        Some(store) => {
            match time::timeout(config.store_timeout(), store.initialize()).await {
                Ok(Ok(())) => info!("✅ Durable store connected and schema initialized"),
                Ok(Err(e)) => warn!("Durable store unavailable at startup: {}", e),
                Err(_) => warn!(
                    "Durable store did not answer within {} ms, continuing",
                    config.store_timeout_ms
                ),
            }
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, running with in-memory history only");
            Arc::new(DisabledStore)
        }
    };

    // Create relay state
    let state = Arc::new(RelayState::new(config.clone(), store, durable_store));

    // Spawn background task to evict expired samples between ingests
    {
        let state = state.clone();
        let every = Duration::from_secs(config.sweep_interval_seconds);
        tokio::spawn(async move {
            let mut interval = time::interval(every);
            loop {
                interval.tick().await;
                let removed = state.pipeline.evict_expired();
                if removed > 0 {
                    info!("Evicted {} expired samples", removed);
                }
            }
        });
    }

    let app = build_router(state);

    // Start server
    let addr: SocketAddr = config.bind_address().parse()?;
    info!("🎧 Listening on http://{}", addr);
    info!("📡 WS (viewer): ws://{}{}", addr, VIEWER_SOCKET_PATH);
    info!("📡 WS (device): ws://{}{}", addr, DEVICE_SOCKET_PATH);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Telemetry Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
