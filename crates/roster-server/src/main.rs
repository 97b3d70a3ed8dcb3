//! rosterd server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, serves the JSON API, and runs the periodic
//! batch pass.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use roster_core::store::RosterStore as _;
use roster_server::ServerConfig;
use roster_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Roster enrolment reconciliation server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
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

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ROSTER"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store with the assembled engine configuration.
  let store = SqliteStore::open(&store_path, server_cfg.engine_config())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  // Periodic batch pass.
  if server_cfg.sync_interval_secs > 0 {
    let sync_store = store.clone();
    let every = Duration::from_secs(server_cfg.sync_interval_secs);
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      ticker
        .set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      // The first tick fires immediately; skip it so startup stays quiet.
      ticker.tick().await;
      loop {
        ticker.tick().await;
        match sync_store.run_sync().await {
          Ok(report) => {
            if !report.applied.is_empty()
              || !report.is_clean()
              || report.orphans_removed > 0
            {
              tracing::info!(
                applied = report.applied.len(),
                deferred = report.deferred.len(),
                dropped = report.dropped.len(),
                orphans_removed = report.orphans_removed,
                "batch pass finished"
              );
            }
          }
          Err(e) => tracing::warn!("batch pass failed: {e}"),
        }
      }
    });
  }

  let app = Router::new()
    .nest("/api", roster_api::api_router(store))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
