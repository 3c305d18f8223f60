//! Dry-run platform.
//!
//! Every outbound call is logged and dropped. Message creation reports an error so
//! the reconciler never records (and persists) a message id that does not exist.

use async_trait::async_trait;
use tracing::info;

use super::{ChatPlatform, PlatformError};
use crate::emoji::EmojiIdentity;

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunPlatform;

impl DryRunPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatPlatform for DryRunPlatform {
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String, PlatformError> {
        info!(target: "role_bot::platform", %channel_id, %content, "DRY-RUN send_message");
        Err(PlatformError::DryRun("send_message"))
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), PlatformError> {
        info!(target: "role_bot::platform", %channel_id, %message_id, %content, "DRY-RUN edit_message");
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &EmojiIdentity,
    ) -> Result<(), PlatformError> {
        info!(target: "role_bot::platform", %channel_id, %message_id, %emoji, "DRY-RUN add_reaction");
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &EmojiIdentity,
        user_id: &str,
    ) -> Result<(), PlatformError> {
        info!(target: "role_bot::platform", %channel_id, %message_id, %emoji, %user_id, "DRY-RUN remove_reaction");
        Ok(())
    }

    async fn add_member_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), PlatformError> {
        info!(target: "role_bot::platform", %guild_id, %user_id, %role_id, "DRY-RUN add_member_role");
        Ok(())
    }

    async fn remove_member_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), PlatformError> {
        info!(target: "role_bot::platform", %guild_id, %user_id, %role_id, "DRY-RUN remove_member_role");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_is_refused_everything_else_succeeds() {
        let p = DryRunPlatform::new();
        assert!(matches!(
            p.send_message("1", "hi").await,
            Err(PlatformError::DryRun("send_message"))
        ));
        let emoji = EmojiIdentity::literal("🔥");
        p.edit_message("1", "2", "hi").await.unwrap();
        p.add_reaction("1", "2", &emoji).await.unwrap();
        p.remove_reaction("1", "2", &emoji, "3").await.unwrap();
        p.add_member_role("g", "u", "r").await.unwrap();
        p.remove_member_role("g", "u", "r").await.unwrap();
    }
}
