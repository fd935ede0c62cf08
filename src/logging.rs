use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Log to a file; the terminal belongs to the UI.
pub fn init_logging(level: &str, log_file: &Path) -> Result<()> {
    let file = std::fs::File::create(log_file)
        .with_context(|| format!("create log file: {}", log_file.display()))?;
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::sync::Arc::new(file))
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    info!(path=%log_file.display(), "logging initialized");
    Ok(())
}
