//! cbme server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `CBME__*` environment variables, opens one SQLite store per curriculum
//! version, and serves the JSON API under `/api`.
//!
//! # Rebuilding search indexes
//!
//! ```
//! cargo run -p cbme-server --bin server -- --rebuild-index
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use cbme_server::{ServerConfig, open_catalogs, rebuild_all, router};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Competency catalog search server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Rebuild every version's search index and exit.
  #[arg(long)]
  rebuild_index: bool,
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
    .add_source(config::Environment::with_prefix("CBME").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let catalogs = open_catalogs(&server_cfg)
    .await
    .context("failed to open catalog stores")?;

  if cli.rebuild_index {
    let entries = rebuild_all(&catalogs)
      .await
      .context("failed to rebuild search indexes")?;
    tracing::info!(entries, "rebuild complete");
    return Ok(());
  }

  if server_cfg.admin_enabled {
    tracing::warn!("admin routes are enabled");
  }

  let app = router(catalogs, server_cfg.admin_enabled);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
