/*!
Chat platform seam.

The engine never talks to a chat client directly. It consumes:

- [`ChatPlatform`]: the outbound capabilities (post/edit messages, add/remove reactions,
  add/remove member roles), addressed with the platform's string ids.
- [`PlatformEvent`]: inbound reaction events, delivered through a Tokio channel by
  whatever adapter owns the real connection.

Implementations in this module:

- `discord.rs` -> `DiscordGateway` / `DiscordPlatform` (serenity)
- `dry_run.rs` -> `DryRunPlatform` (logs instead of mutating)

Adapters are responsible for:
- Translating ids and emoji between the platform's types and plain strings
- Forwarding events via `Sender<PlatformEvent>` while respecting backpressure
- Logging errors and continuing (never panicking inside tasks)
*/

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::emoji::{EmojiIdentity, EventEmoji};

pub mod discord;
pub mod dry_run;

pub use discord::{DiscordGateway, DiscordPlatform};
pub use dry_run::DryRunPlatform;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("invalid {kind} id '{value}'")]
    InvalidId { kind: &'static str, value: String },
    #[error("platform request failed: {0}")]
    Request(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("dry-run: {0} not performed")]
    DryRun(&'static str),
}

/// Outbound capabilities of the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Post a message and return its id.
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String, PlatformError>;

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), PlatformError>;

    /// Add the bot's own reaction. Adding an existing reaction is a no-op.
    async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &EmojiIdentity,
    ) -> Result<(), PlatformError>;

    /// Remove `user_id`'s reaction.
    async fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &EmojiIdentity,
        user_id: &str,
    ) -> Result<(), PlatformError>;

    async fn add_member_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), PlatformError>;

    async fn remove_member_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), PlatformError>;
}

/// A reaction added to or removed from some message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub channel_id: String,
    pub message_id: String,
    pub guild_id: String,
    pub user_id: String,
    pub emoji: EventEmoji,
}

/// Events produced by a platform adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    ReactionAdded(ReactionEvent),
    ReactionRemoved(ReactionEvent),
}
