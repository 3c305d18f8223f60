use anyhow::{Context, Result, anyhow};
use schemars::{Schema, schema_for};
use serde_valid::Validate;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

use super::models::BotConfig;

/// Why a config document was rejected.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to parse JSON config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load configuration from raw JSON bytes (the contents of a config file).
pub fn load_from_slice(bytes: &[u8]) -> Result<BotConfig, LoadError> {
    let cfg: BotConfig = serde_json::from_slice(bytes)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Per-user config location: `~/.config/role-bot/config.json` on every platform.
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine the home directory"))?;
    Ok(home.join(".config").join("role-bot").join("config.json"))
}

/// Generate the JSON Schema for the config model (for editors and external tooling).
pub fn generate_schema() -> Schema {
    schema_for!(BotConfig)
}

/// Write the JSON Schema for the config model to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// Validate a loaded config.
/// - Field rules declared on the models (non-empty channel and role ids).
/// - Ambiguous emoji inside one channel are reported but accepted; the first entry wins
///   when routing.
pub fn validate_config(cfg: &BotConfig) -> Result<(), LoadError> {
    cfg.validate()
        .map_err(|errors| LoadError::Invalid(errors.to_string()))?;

    for channel in &cfg.channels {
        let mut seen = HashMap::new();
        for (idx, role) in channel.roles.iter().enumerate() {
            let identity = role.identity();
            if let Some(first) = seen.get(&identity) {
                warn!(
                    target: "role_bot::config",
                    channel_id = %channel.channel_id,
                    emoji = %identity,
                    first_index = *first,
                    duplicate_index = idx,
                    "Emoji mapped more than once in this channel; only the first entry will be used"
                );
            } else {
                seen.insert(identity, idx);
            }
        }
    }

    Ok(())
}
