//! scrawl server binary.
//!
//! Reads `scrawl.toml` (or the path specified with `--config`) plus the
//! environment, connects the report store, and serves the report API over
//! HTTP until interrupted.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use scrawl_api::ReportHandler;
use scrawl_discord::DiscordNotifier;
use scrawl_server::ServerConfig;
use scrawl_store_sql::SqlStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "scrawl report server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "scrawl.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let config = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  let store = SqlStore::connect(&config.database_url, &config.pool_settings())
    .await
    .context("failed to connect to the report store")?;
  let store = Arc::new(store);

  let mut handler = ReportHandler::<SqlStore, DiscordNotifier>::new(store.clone())
    .with_normalizer(config.normalizer.build());

  if let Some(discord) = config.discord_config() {
    let notifier = DiscordNotifier::new(discord).context("failed to build Discord client")?;
    handler = handler.with_notifier(Arc::new(notifier), config.notify_policy());
    tracing::info!(policy = ?config.notify_policy(), "forwarding new reports to Discord");
  }

  let app = scrawl_server::app(Arc::new(handler), &config);
  let address = config.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .with_graceful_shutdown(shutdown_signal())
  .await
  .context("server error")?;

  store.close().await;
  tracing::info!("shut down");
  Ok(())
}

/// Resolve on Ctrl-C. If the signal handler cannot be installed, never
/// resolve.
async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
}
