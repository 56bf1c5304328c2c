mod app;
mod canvas;
mod input;
mod render;
mod runtime;
mod terminal;
mod theme;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatscope_core::color::Theme;
use chatscope_core::config::{CoreConfig, FilterPolicy};
use chatscope_core::storage::FetchOptions;
use chatscope_core::tracing_setup::init_tracing;
use chatscope_core::SnapshotPipeline;
use clap::Parser;
use tracing::info;

use crate::app::App;
use crate::runtime::run_app;

#[derive(Parser, Debug)]
#[command(name = "chatscope")]
#[command(about = "Browse a chat message snapshot as an interactive time scatter")]
struct Args {
    /// Snapshot URL (parquet)
    #[arg(long, env = "CHATSCOPE_SNAPSHOT_URL")]
    url: Option<String>,

    /// Directory for the snapshot cache and logs
    #[arg(long, env = "CHATSCOPE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Clear the cache and download the snapshot again
    #[arg(long)]
    fresh: bool,

    /// Neither read nor write the snapshot cache
    #[arg(long)]
    no_cache: bool,

    /// Light color theme
    #[arg(long, env = "CHATSCOPE_LIGHT")]
    light: bool,

    /// How non-matching points are shown: `dim` or `hide`
    #[arg(long, env = "CHATSCOPE_FILTER_POLICY", default_value = "dim", value_parser = parse_policy)]
    filter_policy: FilterPolicy,

    /// Log file; stdout belongs to the terminal UI
    #[arg(long, env = "CHATSCOPE_LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn parse_policy(value: &str) -> Result<FilterPolicy, String> {
    FilterPolicy::parse(value).ok_or_else(|| format!("unknown filter policy '{value}' (expected dim or hide)"))
}

fn build_config(args: &Args) -> CoreConfig {
    let mut config = CoreConfig::from_env();
    if let Some(url) = &args.url {
        config.snapshot_url = url.clone();
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    config.viz.filter_policy = args.filter_policy;
    if args.light {
        config.viz.theme = Theme::Light;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = build_config(&args);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| config.data_dir.join("chatscope.log"));
    init_tracing(Some(log_file.as_path()))?;
    info!(url = %config.snapshot_url, data_dir = %config.data_dir.display(), "starting chatscope");

    let fetch = FetchOptions {
        max_retries: config.fetch.max_retries,
        use_cache: !args.no_cache,
        force_fresh: args.fresh,
        progress: None,
    };
    let pipeline = Arc::new(SnapshotPipeline::new(config).context("building snapshot pipeline")?);

    terminal::install_panic_hook();
    let (mut app, events_rx) = App::new(Arc::clone(&pipeline), fetch);
    let mut terminal = terminal::init()?;

    let result = run_app(&mut terminal, &mut app, events_rx).await;

    app.viz.destroy();
    pipeline.shutdown().await;
    terminal::restore()?;

    if let Err(err) = result {
        eprintln!("Error: {err}");
    }

    Ok(())
}
