//! Configuration module for the role bot.
//!
//! This module wires together the data models, loading/validation helpers and the
//! persistent store used throughout the crate.
//!
//! Example:
//! use role_bot::config::load_from_slice;
//!
//! let cfg = load_from_slice(br#"{"bot_token": "...", "channels": []}"#)?;

pub mod loader;
pub mod models;
pub mod store;

// Re-export core data models
pub use models::{
    BotConfig, ChannelConfig, EmojiDescriptor, PLACEHOLDER_TOKEN, RoleEntry, is_usable_token,
};

// Re-export loader utilities
pub use loader::{
    LoadError, default_config_path, generate_schema, load_from_slice, validate_config,
    write_schema_to_writer,
};

pub use store::{ConfigStore, EntrySlot, JsonFileStore, SharedConfig, StoreError};
