use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod error;
mod events;
mod logging;
mod session;
mod transport;
mod ui;

use config::{Config, RenderMode, ResponseShape};
use logging::LogSink;

#[derive(Parser)]
#[command(name = "slm-chat")]
#[command(version)]
#[command(about = "Terminal chat client for a math-solving language model server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Solver server base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Response contract spoken by the server
    #[arg(long, global = true, value_enum)]
    shape: Option<ResponseShape>,

    /// Config file to use instead of ~/.slm-chat/config.toml
    #[arg(long, global = true, env = "SLM_CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Show replies as plain text instead of rendered Markdown
    #[arg(long, global = true)]
    plain: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Send one problem and print the reply
    Solve { problem: String },
    /// Check whether the server is up
    Health,
    /// List the tools the server exposes
    Tools,
    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

impl Cli {
    /// Command-line flags win over the config file and environment.
    fn apply_to(&self, config: &mut Config) {
        if let Some(base_url) = &self.base_url {
            config.transport.base_url = base_url.clone();
        }
        if let Some(shape) = self.shape {
            config.transport.shape = shape;
        }
        if self.plain {
            config.ui.render_mode = RenderMode::Plain;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let mut config = Config::load(Some(&config_path))?;
    cli.apply_to(&mut config);

    let command = cli.command.unwrap_or(Commands::Chat);
    let sink = match command {
        Commands::Chat => LogSink::File,
        _ => LogSink::Stderr,
    };
    logging::init(&config.logging, sink)?;

    match command {
        Commands::Chat => ui::run(&config),
        Commands::Solve { problem } => commands::solve(&config, &problem).await,
        Commands::Health => commands::health(&config).await,
        Commands::Tools => commands::tools(&config).await,
        Commands::Config { init } => commands::show_config(&config, &config_path, init),
    }
}
