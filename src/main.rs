use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use role_bot::bot::{self, RoleBot, Startup};
use role_bot::config::{self as cfg, JsonFileStore};
use role_bot::platform::{ChatPlatform, DiscordGateway, DryRunPlatform};

/// Capacity of the platform event channel.
const EVENT_BUFFER: usize = 256;

/// Role bot CLI
#[derive(Debug, Parser)]
#[command(
    name = role_bot::PKG_NAME,
    version = role_bot::PKG_VERSION,
    about = "Keeps reaction-role messages in sync with a JSON config"
)]
struct Args {
    /// Path to the JSON configuration file (default: ~/.config/role-bot/config.json)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// File containing the bot token (overrides `bot_token` from the config)
    #[arg(long = "token-file")]
    token_file: Option<PathBuf>,

    /// Enable dry-run mode: still connect to receive reactions, but log every
    /// message, reaction and role change instead of performing it
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for the configuration and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    role_bot::init_tracing(args.log_level.as_deref());

    if args.print_schema {
        cfg::write_schema_to_writer(std::io::stdout().lock())?;
        println!();
        return Ok(());
    }

    let config_path = match args.config {
        Some(path) => path,
        None => cfg::default_config_path()?,
    };
    info!(
        version = role_bot::PKG_VERSION,
        config = %config_path.display(),
        dry_run = args.dry_run,
        "Starting role bot"
    );

    let store = Arc::new(JsonFileStore::new(&config_path));
    let config = match bot::load_or_init(store.as_ref()).await? {
        Startup::Loaded(config) => config,
        Startup::TemplateWritten => {
            println!("Config not found; generated a new template at {}", config_path.display());
            println!("Edit it with your bot token, channel IDs and roles, then restart.");
            return Ok(());
        }
    };
    debug!(channels = config.channels.len(), "Configuration loaded successfully");

    let token = bot::resolve_token(&config, args.token_file.as_deref())?;

    let gateway = DiscordGateway::connect(&token, EVENT_BUFFER)
        .await
        .context("Failed to connect to Discord")?;
    let (discord, events, gateway_task) = gateway.into_parts();
    // Dry-run keeps the gateway for inbound events and swaps out the outbound half.
    let platform: Arc<dyn ChatPlatform> = if args.dry_run {
        Arc::new(DryRunPlatform::new())
    } else {
        discord
    };

    let bot = RoleBot::new(platform, config, store);
    bot.reconcile_all().await;

    let cancel = CancellationToken::new();
    let _hot_reload = bot.spawn_hot_reload(config_path, cancel.clone());

    info!("Bot is running. Press Ctrl+C to exit.");
    tokio::select! {
        _ = bot.dispatch(events, cancel.clone()) => {
            info!("Event stream ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    cancel.cancel();
    gateway_task.abort();
    info!("Role bot exited");
    Ok(())
}
