mod app;
mod config;
mod error;
mod routes;
mod seed;
mod storage;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use app::AppState;
use config::AppConfig;

#[derive(Parser)]
#[command(
    name = "tenantnotes-server",
    about = "Multi-tenant notes server",
    version
)]
struct Cli {
    /// SQLite data directory (overrides TENANTNOTES_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Listen port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create the schema and seed the demo tenants and users
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenantnotes_server=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
        Commands::Seed => {
            let db = storage::init_db(&config.data_dir)?;
            let report = seed::seed_database(&db, &config.seed_password, config.password_iterations)
                .context("seeding database")?;
            tracing::info!(
                "seed complete: {} tenants, {} users created",
                report.created_tenants.len(),
                report.created_users.len()
            );
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    config.require_jwt_secret()?;

    tracing::info!("data directory: {}", config.data_dir.display());
    let db = storage::init_db(&config.data_dir)?;
    tracing::info!("database initialized");

    if config.seed_on_start {
        // A failed seed is logged; the server still starts.
        match seed::seed_database(&db, &config.seed_password, config.password_iterations) {
            Ok(report) => tracing::info!(
                "startup seed: {} tenants, {} users created",
                report.created_tenants.len(),
                report.created_users.len()
            ),
            Err(e) => tracing::error!("startup seed failed: {e}"),
        }
    }

    let port = config.port;
    let app = app::build_router(AppState {
        db,
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
