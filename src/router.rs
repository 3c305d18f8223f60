//! Reaction event routing.
//!
//! Deciding what to do with a reaction is a pure function of a config snapshot and
//! the event ([`plan_reaction_added`], [`plan_reaction_removed`]). [`Router`] takes the
//! current snapshot, plans, and executes the resulting [`RoleAction`] against the
//! platform. Platform failures are logged and the event is dropped; nothing is retried.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::config::{BotConfig, ChannelConfig, RoleEntry, SharedConfig};
use crate::emoji::EmojiIdentity;
use crate::platform::{ChatPlatform, PlatformEvent, ReactionEvent};

/// Action resulting from a reaction event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleAction {
    Grant {
        guild_id: String,
        user_id: String,
        role_id: String,
        label: String,
    },
    Revoke {
        guild_id: String,
        user_id: String,
        role_id: String,
        label: String,
    },
    /// Remove a reaction that does not map to any configured role.
    StripReaction {
        channel_id: String,
        message_id: String,
        user_id: String,
        emoji: EmojiIdentity,
    },
}

/// The channel whose tracked message received the reaction, if any.
fn tracked_channel<'a>(config: &'a BotConfig, event: &ReactionEvent) -> Option<&'a ChannelConfig> {
    config.channels.iter().find(|c| {
        c.channel_id == event.channel_id && c.message_id.as_deref() == Some(event.message_id.as_str())
    })
}

/// First role entry matching the event emoji, in configured order.
fn matching_role<'a>(channel: &'a ChannelConfig, event: &ReactionEvent) -> Option<&'a RoleEntry> {
    channel
        .roles
        .iter()
        .find(|role| role.identity().matches(&event.emoji))
}

/// Plan the action for a reaction being added.
pub fn plan_reaction_added(config: &BotConfig, event: &ReactionEvent) -> Option<RoleAction> {
    let channel = tracked_channel(config, event)?;
    Some(match matching_role(channel, event) {
        Some(role) => RoleAction::Grant {
            guild_id: event.guild_id.clone(),
            user_id: event.user_id.clone(),
            role_id: role.role_id.clone(),
            label: role.label.clone(),
        },
        None => RoleAction::StripReaction {
            channel_id: channel.channel_id.clone(),
            message_id: event.message_id.clone(),
            user_id: event.user_id.clone(),
            emoji: event.emoji.identity(),
        },
    })
}

/// Plan the action for a reaction being removed. Unknown emoji are ignored.
pub fn plan_reaction_removed(config: &BotConfig, event: &ReactionEvent) -> Option<RoleAction> {
    let channel = tracked_channel(config, event)?;
    let role = matching_role(channel, event)?;
    Some(RoleAction::Revoke {
        guild_id: event.guild_id.clone(),
        user_id: event.user_id.clone(),
        role_id: role.role_id.clone(),
        label: role.label.clone(),
    })
}

/// Routes platform reaction events to role grants and revocations.
#[derive(Clone)]
pub struct Router {
    platform: Arc<dyn ChatPlatform>,
    config: SharedConfig,
}

impl Router {
    pub fn new(platform: Arc<dyn ChatPlatform>, config: SharedConfig) -> Self {
        Self { platform, config }
    }

    /// Dispatch any platform event to the matching entry point.
    pub async fn handle(&self, event: &PlatformEvent) -> Option<RoleAction> {
        match event {
            PlatformEvent::ReactionAdded(e) => self.on_reaction_added(e).await,
            PlatformEvent::ReactionRemoved(e) => self.on_reaction_removed(e).await,
        }
    }

    pub async fn on_reaction_added(&self, event: &ReactionEvent) -> Option<RoleAction> {
        let snapshot = self.config.snapshot().await;
        let action = plan_reaction_added(&snapshot, event);
        self.finish(event, action).await
    }

    pub async fn on_reaction_removed(&self, event: &ReactionEvent) -> Option<RoleAction> {
        let snapshot = self.config.snapshot().await;
        let action = plan_reaction_removed(&snapshot, event);
        self.finish(event, action).await
    }

    async fn finish(&self, event: &ReactionEvent, action: Option<RoleAction>) -> Option<RoleAction> {
        match &action {
            Some(action) => self.execute(action).await,
            None => trace!(
                target: "role_bot::router",
                channel_id = %event.channel_id,
                message_id = %event.message_id,
                "Reaction not relevant; ignoring"
            ),
        }
        action
    }

    /// Perform a planned action. Failures are logged, never propagated.
    pub async fn execute(&self, action: &RoleAction) {
        match action {
            RoleAction::Grant {
                guild_id,
                user_id,
                role_id,
                label,
            } => match self
                .platform
                .add_member_role(guild_id, user_id, role_id)
                .await
            {
                Ok(()) => info!(target: "role_bot::router", %user_id, %role_id, %label, "Added role"),
                Err(e) => warn!(
                    target: "role_bot::router",
                    %guild_id, %user_id, %role_id, error = %e,
                    "Failed to add role"
                ),
            },
            RoleAction::Revoke {
                guild_id,
                user_id,
                role_id,
                label,
            } => match self
                .platform
                .remove_member_role(guild_id, user_id, role_id)
                .await
            {
                Ok(()) => info!(target: "role_bot::router", %user_id, %role_id, %label, "Removed role"),
                Err(e) => warn!(
                    target: "role_bot::router",
                    %guild_id, %user_id, %role_id, error = %e,
                    "Failed to remove role"
                ),
            },
            RoleAction::StripReaction {
                channel_id,
                message_id,
                user_id,
                emoji,
            } => match self
                .platform
                .remove_reaction(channel_id, message_id, emoji, user_id)
                .await
            {
                Ok(()) => debug!(
                    target: "role_bot::router",
                    %channel_id, %user_id, %emoji,
                    "Removed unconfigured reaction"
                ),
                Err(e) => warn!(
                    target: "role_bot::router",
                    %channel_id, %message_id, %user_id, %emoji, error = %e,
                    "Failed to remove unconfigured reaction"
                ),
            },
        }
    }
}
