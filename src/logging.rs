use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Where log lines should go for this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    /// One-shot subcommands: stderr is free
    Stderr,
    /// Interactive chat: the terminal belongs to the UI, so log to the
    /// configured file or not at all
    File,
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global tracing subscriber.
pub fn init(config: &LoggingConfig, sink: LogSink) -> Result<()> {
    let filter = env_filter(config);

    match (sink, config.file.as_ref()) {
        (LogSink::Stderr, _) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))
                .context("Failed to install log subscriber")?;
        }
        (LogSink::File, Some(path)) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .context("Failed to create log directory")?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))
                .context("Failed to install log subscriber")?;
        }
        (LogSink::File, None) => {
            // Nothing may write to the terminal while the UI is drawn.
        }
    }

    Ok(())
}
