//! `pcbtraced`: read-only HTTP query service over imported manufacturing records.
//!
//! Usage:
//!   pcbtraced [-c <config.toml>] [--listen <addr>] [--db <path>]
//!
//! Command-line flags override values from the config file.

mod bootstrap;
mod routes;

use std::path::PathBuf;

use clap::Parser;
use pcbtrace_core::Module;
use pcbtrace_records::{RecordService, RecordsModule};
use tracing::info;

/// Manufacturing records query server.
#[derive(Parser, Debug)]
#[command(name = "pcbtraced", version, about = "Manufacturing records query server")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Listen address (overrides the config file, default 0.0.0.0:5000).
    #[arg(long = "listen")]
    listen: Option<String>,

    /// SQLite database path (overrides the config file).
    #[arg(long = "db")]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = bootstrap::load_config(cli.config.as_deref(), cli.listen, cli.db)?;
    let sql = bootstrap::open_store(&config)?;

    let records = RecordsModule::new(RecordService::new(sql));
    info!("{} module initialized", records.name());

    let module_routes = vec![(records.name(), records.routes())];
    let app = routes::build_router(&config.server, module_routes);

    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    info!(
        listen = %config.server.listen,
        timeout_secs = config.server.request_timeout_secs,
        "pcbtraced listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pcbtraced stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
