#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Role bot: keeps "reaction role" messages in sync with a JSON config.
//!
//! A tracked message per channel lists emoji-to-role mappings; reacting grants the role,
//! removing the reaction revokes it. The crate is organized as:
//! - `config`: Configuration models, loader, validation and the persistent store.
//! - `emoji`: Emoji identity resolution (unicode vs. custom server emoji).
//! - `render`: Role message text.
//! - `reconcile`: Creates/edits tracked messages and attaches reactions.
//! - `router`: Maps reaction events to role grants and revocations.
//! - `watcher`: Config hot reload (filesystem watch, debounce, reconcile).
//! - `platform`: Chat platform seam, Discord adapter, dry-run platform.
//! - `bot`: Startup sequence and event dispatch.
//!
//! Use `role_bot::prelude::*` to bring commonly used items into scope quickly.

/// Public module: configuration (models, loader, store).
pub mod config;
/// Public module: emoji identity resolution.
pub mod emoji;
/// Public module: role message rendering.
pub mod render;
/// Public module: reconciliation of channels against the platform.
pub mod reconcile;
/// Public module: reaction event routing.
pub mod router;
/// Public module: config hot reload.
pub mod watcher;
/// Public module: chat platform seam and adapters.
pub mod platform;
/// Public module: startup and dispatch.
pub mod bot;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse a level name (trace|debug|info|warn|error).
pub fn parse_level(s: &str) -> Option<tracing::Level> {
    use tracing::Level;
    match s.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging) with a reasonable default.
/// - `level` wins when given and valid.
/// - Otherwise honors the `RUST_LOG` environment variable if set to a plain level.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing(level: Option<&str>) {
    use tracing_subscriber::fmt;

    let level = level
        .and_then(parse_level)
        .or_else(|| std::env::var("RUST_LOG").ok().as_deref().and_then(parse_level))
        .unwrap_or(tracing::Level::INFO);

    // Ignore the error if the global subscriber was already set.
    let _ = fmt().with_max_level(level).try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use role_bot::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Serialization
    pub use serde::{Deserialize, Serialize};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    pub use crate as role_bot;

    // Frequently used internal items
    pub use crate::bot::RoleBot;
    pub use crate::config::{BotConfig, ChannelConfig, RoleEntry, SharedConfig};
    pub use crate::platform::{ChatPlatform, PlatformEvent, ReactionEvent};
    pub use crate::reconcile::Reconciler;
    pub use crate::router::{RoleAction, Router};
    pub use crate::{config, emoji, platform, reconcile, render, router, watcher};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("WARN"), Some(tracing::Level::WARN));
        assert_eq!(parse_level("warning"), Some(tracing::Level::WARN));
        assert_eq!(parse_level(" debug "), Some(tracing::Level::DEBUG));
        assert_eq!(parse_level("loud"), None);
    }
}
