//! `twtrd` — the twtr server binary.
//!
//! Usage:
//!   twtrd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/twtr/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod bootstrap;
mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use twtr_core::Module;

use config::ServerConfig;

/// twtr server.
#[derive(Parser, Debug)]
#[command(name = "twtrd", about = "twtr server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides default 0.0.0.0:8080).
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;

    bootstrap::verify_config(&server_config)?;

    let stores = bootstrap::open_stores(&server_config)?;
    let mailer = bootstrap::mailer(&server_config, &stores.kv);
    info!("Mail transport: {:?}", server_config.mail.transport);

    let social_module = twtr_social::SocialModule::new(
        Arc::clone(&stores.sql),
        Arc::clone(&stores.blob),
        mailer,
        bootstrap::social_config(&server_config),
        server_config.server.max_upload_bytes,
    )?;
    info!("Social module initialized");

    let module_routes = vec![(social_module.name(), social_module.routes())];
    let app = routes::build_router(module_routes);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!("twtr server listening on {}", cli.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("twtr server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
