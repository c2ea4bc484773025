use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::session::{ChatSession, RejectReason, SubmitOutcome};
use crate::transport::HttpTransport;

/// Run a single turn through a chat session and print the reply.
pub async fn solve(config: &Config, problem: &str) -> Result<()> {
    let transport = Arc::new(HttpTransport::new(config.transport.clone()));
    let mut session = ChatSession::from_config(config, transport);

    if let Some(handle) = session.start_remote_reset() {
        // Let the memory wipe land before the first problem.
        let _ = handle.await;
    }

    if let SubmitOutcome::Rejected(reason) = session.submit(problem) {
        let why = match reason {
            RejectReason::EmptyInput => "the problem text is empty",
            RejectReason::AwaitingResponse => "a request is already in flight",
        };
        bail!("❌ Nothing sent: {}.", why);
    }

    session.settle().await;

    if let Some(reply) = session.messages().last() {
        println!("{}", reply.content);
    }

    Ok(())
}

pub async fn health(config: &Config) -> Result<()> {
    let transport = HttpTransport::new(config.transport.clone());
    let report = transport
        .health()
        .await
        .with_context(|| format!("Health check against {} failed", config.transport.base_url))?;

    let marker = if report.is_healthy() { "✅" } else { "⚠️" };
    println!("{} {} — {}", marker, config.transport.base_url, report.status);
    for (key, value) in &report.details {
        println!("   {}: {}", key, value);
    }

    Ok(())
}

pub async fn tools(config: &Config) -> Result<()> {
    let transport = HttpTransport::new(config.transport.clone());
    let listing = transport
        .tools()
        .await
        .with_context(|| format!("Could not list tools at {}", config.transport.base_url))?;

    println!("🧰 Tools available at {}:\n", config.transport.base_url);
    match listing.get("tools").and_then(|t| t.as_object()) {
        Some(tools) if !tools.is_empty() => {
            for (name, description) in tools {
                let description = description
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| description.to_string());
                println!("  • {}: {}", name, description);
            }
        }
        Some(_) => println!("  (none)"),
        None => println!("{}", serde_json::to_string_pretty(&listing)?),
    }

    Ok(())
}

/// Print the effective configuration, or write the defaults with `--init`.
pub fn show_config(config: &Config, config_path: &Path, init: bool) -> Result<()> {
    if init {
        if config_path.exists() {
            println!("⚠️ {} already exists, leaving it untouched.", config_path.display());
            return Ok(());
        }
        Config::default().save(config_path)?;
        println!("📝 Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    println!("📍 Config file: {}", config_path.display());
    println!("📁 Home: {}", config.home.display());
    println!();
    println!("{}", toml::to_string_pretty(config).context("Failed to serialize config")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_problem_fails_without_sending() {
        let mut config = Config::default();
        config.transport.base_url = "http://127.0.0.1:9".into();

        let err = solve(&config, "   ").await.unwrap_err();
        assert!(err.to_string().contains("the problem text is empty"));
    }
}
