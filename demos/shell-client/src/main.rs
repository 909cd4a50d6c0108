//! Interactive observed-shell client.
//!
//! Run with: cargo run -p shell-client-demo
//!
//! Configuration via environment:
//! - `OBSH_API_URL`: message endpoint for input reporting and fetches
//! - `OBSH_CHANNEL_URL`: ws(s) push channel endpoint (optional; without
//!   it the session runs local-only)
//! - `OBSH_CHANNEL`: channel name to focus (default "shell")

use std::sync::Arc;

use anyhow::Context as _;
use obsh_channel::{ChannelClient, ChannelConfig, HttpRemote};
use obsh_core::{HistoryStore, Notifier};
use obsh_executor::ExecutionBridge;
use obsh_prompt::{LinePrompt, PromptOptions};
use obsh_session::SessionCoordinator;
use regex::Regex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the prompt and the spawned
    // processes.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let api_url = std::env::var("OBSH_API_URL").context("OBSH_API_URL is required")?;
    let channel_name = std::env::var("OBSH_CHANNEL").unwrap_or_else(|_| "shell".to_string());

    let history = Arc::new(HistoryStore::new());
    let remote = Arc::new(HttpRemote::new(&api_url).context("invalid OBSH_API_URL")?);
    let bridge = Arc::new(ExecutionBridge::new(
        Arc::clone(&remote) as Arc<dyn Notifier>,
        Arc::clone(&history),
    ));

    let mut options = PromptOptions::default();
    // Annotations stay out of recall.
    options.exclusions.push(Regex::new(r"^\s*#")?);
    let prompt = LinePrompt::new(options, Arc::clone(&history));

    let mut coordinator = SessionCoordinator::new(prompt, bridge, Arc::clone(&history), remote);

    match std::env::var("OBSH_CHANNEL_URL") {
        Ok(channel_url) => {
            let client = ChannelClient::connect(ChannelConfig::new(channel_url))
                .context("invalid OBSH_CHANNEL_URL")?;
            coordinator.attach_channel(client, &channel_name);
        }
        Err(_) => {
            tracing::warn!("OBSH_CHANNEL_URL not set; running without a push channel");
        }
    }

    let code = coordinator.run().await?;
    std::process::exit(code);
}
