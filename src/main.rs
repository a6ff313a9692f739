use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

mod config;
mod core;
mod discord;
mod render;
mod services;

use crate::config::BotConfig;
use crate::core::service::{ServiceOptions, WelcomeService};
use crate::discord::SerenityPlatform;
use crate::services::assets::HttpAssetProvider;
use crate::services::storage::ConfigStore;

#[derive(Parser, Debug)]
#[command(name = "welcome-bot", about = "Discord welcome image bot")]
struct Args {
    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    token: String,

    /// Settings file (created with defaults if missing)
    #[arg(short, long, env = "WELCOME_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Command prefix
    #[arg(long, default_value = "!")]
    prefix: String,

    /// Maximum seconds spent compositing one welcome image
    #[arg(long, default_value_t = 30)]
    compose_timeout: u64,

    /// Timeout in seconds for avatar/background downloads
    #[arg(long, default_value_t = 20)]
    fetch_timeout: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn bot_config(&self) -> BotConfig {
        BotConfig {
            token: self.token.clone(),
            command_prefix: self.prefix.clone(),
            config_path: self.config.clone(),
            compose_timeout: Duration::from_secs(self.compose_timeout),
            fetch_timeout: Duration::from_secs(self.fetch_timeout),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.parse().unwrap_or_default()),
        )
        .init();

    info!("welcome-bot v{} starting", env!("CARGO_PKG_VERSION"));

    let config = args.bot_config();
    let store = ConfigStore::open(&config.config_path);
    info!("Using settings file {}", store.path().display());
    let assets =
        HttpAssetProvider::new(config.fetch_timeout).context("Failed to build HTTP client")?;

    let (event_tx, event_rx) = mpsc::channel(64);
    let mut client = discord::build_client(&config.token, &config.command_prefix, event_tx)
        .await
        .context("Failed to create Discord client")?;

    let platform = SerenityPlatform::new(client.http.clone(), client.cache.clone());
    let service = WelcomeService::new(
        store,
        platform,
        assets,
        ServiceOptions {
            command_prefix: config.command_prefix.clone(),
            compose_timeout: config.compose_timeout,
            ..ServiceOptions::default()
        },
    );
    let service_handle = tokio::spawn(service.run(event_rx));

    // Stop the gateway on Ctrl-C
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Connecting to Discord...");
    client
        .start()
        .await
        .context("Discord client stopped with an error")?;

    service_handle.abort();
    info!("welcome-bot shutdown");
    Ok(())
}
