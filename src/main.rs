mod api;
mod app;
mod cache;
mod commands;
mod config;
mod entity;
mod event;
mod logging;
mod query;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sce")]
#[command(about = "A terminal admin console for the electoral control system")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./sce.yaml, then $XDG_CONFIG_HOME/sce/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL, overriding the config file
  #[arg(short, long)]
  api_url: Option<String>,

  /// Entity screen to open first (resource name or alias)
  #[arg(short, long)]
  view: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Keep the guard alive so buffered log lines are flushed on exit
  let _log_guard = logging::init()?;

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override API URL if specified on command line
  if let Some(url) = args.api_url {
    config.api.url = url;
  }
  info!("starting against {}", config.api.url);

  // Initialize and run the app
  let mut app = app::App::new(config, args.view).await?;
  app.run().await?;

  Ok(())
}
