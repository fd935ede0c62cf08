mod cli;
mod config;
mod enrich;
mod logging;
mod pagination;
mod presentation;
mod session;
mod tui;
mod venddy;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use dotenvy::dotenv;
use tokio::sync::mpsc::unbounded_channel;
use tracing::info;

use crate::config::AppConfig;
use crate::session::{ChannelPresenter, Dispatcher, SearchPipeline};
use crate::tui::TuiApp;

#[derive(Parser, Debug, Clone)]
#[command(name = "vds", version, about = "Search the Venddy vendor directory (CLI/TUI)")]
pub struct Cli {
    /// Use plain CLI mode (disable TUI)
    #[arg(long, action = ArgAction::SetTrue)]
    no_tui: bool,

    /// Venddy data API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Results per page
    #[arg(long)]
    page_size: Option<u64>,

    /// Log level (error,warn,info,debug,trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Log file path
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    let cfg = AppConfig::from_cli(cli)?;
    logging::init_logging(&cfg.log_level, &cfg.log_file)?;
    info!(?cfg, "app config");

    let (tx, rx) = unbounded_channel();
    let presenter = Arc::new(ChannelPresenter::new(tx));
    let pipeline =
        SearchPipeline::from_config(&cfg, presenter).context("build search pipeline")?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(pipeline)));

    if cfg.no_tui {
        cli::run_cli_loop(dispatcher, rx).await
    } else {
        let mut app = TuiApp::new("vds - type a search, Enter to open, Esc to quit");
        app.push_log("Welcome to Venddy search");
        app.push_log("Type a vendor, product or category and press Enter");
        app.run(dispatcher, rx).await
    }
}
