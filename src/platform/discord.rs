//! Discord adapter (serenity).
//!
//! `DiscordGateway::connect` builds the serenity client, spawns the gateway task and
//! waits until Discord reports the session ready. Reaction events are translated into
//! [`PlatformEvent`]s and pushed into a bounded channel; the bot's own reactions and
//! reactions outside of a guild never leave this module.
//!
//! `DiscordPlatform` is the outbound half: a thin [`ChatPlatform`] over serenity's
//! HTTP client. Ids travel through the engine as strings and are parsed into
//! snowflakes here.

use std::num::NonZeroU64;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serenity::builder::{CreateMessage, EditMessage};
use serenity::client::{Client, Context, EventHandler};
use serenity::http::Http;
use serenity::model::channel::{Reaction, ReactionType};
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::model::id::{ChannelId, EmojiId, GuildId, MessageId, RoleId, UserId};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use super::{ChatPlatform, PlatformError, PlatformEvent, ReactionEvent};
use crate::emoji::{EmojiIdentity, EventEmoji};

impl From<serenity::Error> for PlatformError {
    fn from(err: serenity::Error) -> Self {
        PlatformError::Request(err.to_string())
    }
}

/// Outbound Discord capabilities.
#[derive(Clone)]
pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String, PlatformError> {
        let channel = ChannelId::new(parse_id("channel", channel_id)?);
        let message = channel
            .send_message(&self.http, CreateMessage::new().content(content))
            .await?;
        Ok(message.id.to_string())
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), PlatformError> {
        let channel = ChannelId::new(parse_id("channel", channel_id)?);
        let message = MessageId::new(parse_id("message", message_id)?);
        channel
            .edit_message(&self.http, message, EditMessage::new().content(content))
            .await?;
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &EmojiIdentity,
    ) -> Result<(), PlatformError> {
        let channel = ChannelId::new(parse_id("channel", channel_id)?);
        let message = MessageId::new(parse_id("message", message_id)?);
        let reaction = reaction_type(emoji)?;
        self.http.create_reaction(channel, message, &reaction).await?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &EmojiIdentity,
        user_id: &str,
    ) -> Result<(), PlatformError> {
        let channel = ChannelId::new(parse_id("channel", channel_id)?);
        let message = MessageId::new(parse_id("message", message_id)?);
        let user = UserId::new(parse_id("user", user_id)?);
        let reaction = reaction_type(emoji)?;
        self.http
            .delete_reaction(channel, message, user, &reaction)
            .await?;
        Ok(())
    }

    async fn add_member_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), PlatformError> {
        let (guild, user, role) = member_role_ids(guild_id, user_id, role_id)?;
        self.http.add_member_role(guild, user, role, None).await?;
        Ok(())
    }

    async fn remove_member_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), PlatformError> {
        let (guild, user, role) = member_role_ids(guild_id, user_id, role_id)?;
        self.http.remove_member_role(guild, user, role, None).await?;
        Ok(())
    }
}

/// A live gateway connection: outbound platform, inbound events, and the task
/// driving the websocket.
pub struct DiscordGateway {
    platform: Arc<DiscordPlatform>,
    events: mpsc::Receiver<PlatformEvent>,
    task: JoinHandle<()>,
}

impl DiscordGateway {
    /// Gateway intents needed to see reactions on guild messages.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGE_REACTIONS
    }

    /// Connect and wait for the session to become ready.
    ///
    /// `buffer` bounds the event channel; when the consumer lags, the gateway task
    /// waits instead of dropping events.
    #[instrument(skip(token), fields(token_len = token.len()))]
    pub async fn connect(token: &str, buffer: usize) -> Result<Self, PlatformError> {
        let (event_tx, event_rx) = mpsc::channel(buffer.max(1));
        let (ready_tx, ready_rx) = oneshot::channel();
        let handler = ReactionHandler::new(event_tx, ready_tx);

        info!(target: "role_bot::platform", intents = ?Self::intents(), "Building Discord client");
        let mut client = Client::builder(token, Self::intents())
            .event_handler(handler)
            .await
            .map_err(|e| PlatformError::Connection(format!("failed to build client: {e}")))?;
        let http = Arc::clone(&client.http);

        let (failed_tx, failed_rx) = oneshot::channel::<String>();
        let task = tokio::spawn(async move {
            match client.start().await {
                Ok(()) => info!(target: "role_bot::platform", "Discord gateway stopped"),
                Err(e) => {
                    error!(target: "role_bot::platform", error = %e, "Discord gateway failed");
                    let _ = failed_tx.send(e.to_string());
                }
            }
        });

        tokio::select! {
            ready = ready_rx => {
                if ready.is_err() {
                    task.abort();
                    return Err(PlatformError::Connection(
                        "gateway closed before the session was ready".to_string(),
                    ));
                }
            }
            failed = failed_rx => {
                let reason = failed.unwrap_or_else(|_| "gateway stopped before the session was ready".to_string());
                return Err(PlatformError::Connection(reason));
            }
        }

        Ok(Self {
            platform: Arc::new(DiscordPlatform::new(http)),
            events: event_rx,
            task,
        })
    }

    pub fn into_parts(
        self,
    ) -> (
        Arc<DiscordPlatform>,
        mpsc::Receiver<PlatformEvent>,
        JoinHandle<()>,
    ) {
        (self.platform, self.events, self.task)
    }
}

/// serenity event handler that forwards reactions into the engine's channel.
struct ReactionHandler {
    events: mpsc::Sender<PlatformEvent>,
    ready: Mutex<Option<oneshot::Sender<UserId>>>,
    bot_user: OnceLock<UserId>,
}

impl ReactionHandler {
    fn new(events: mpsc::Sender<PlatformEvent>, ready: oneshot::Sender<UserId>) -> Self {
        Self {
            events,
            ready: Mutex::new(Some(ready)),
            bot_user: OnceLock::new(),
        }
    }

    fn to_event(&self, reaction: &Reaction) -> Option<ReactionEvent> {
        reaction_event(
            reaction.channel_id,
            reaction.message_id,
            reaction.guild_id,
            reaction.user_id,
            &reaction.emoji,
            self.bot_user.get().copied(),
        )
    }

    async fn forward(&self, event: PlatformEvent) {
        if let Err(e) = self.events.send(event).await {
            warn!(target: "role_bot::platform", error = %e, "Event channel closed; dropping reaction event");
        }
    }
}

#[async_trait]
impl EventHandler for ReactionHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            target: "role_bot::platform",
            bot_user = %ready.user.name,
            bot_id = %ready.user.id,
            guilds = ready.guilds.len(),
            "Bot connected to Discord"
        );
        let _ = self.bot_user.set(ready.user.id);
        if let Some(tx) = self.ready.lock().await.take() {
            let _ = tx.send(ready.user.id);
        }
    }

    async fn reaction_add(&self, _ctx: Context, reaction: Reaction) {
        match self.to_event(&reaction) {
            Some(event) => self.forward(PlatformEvent::ReactionAdded(event)).await,
            None => trace!(target: "role_bot::platform", message_id = %reaction.message_id, "Ignoring reaction add"),
        }
    }

    async fn reaction_remove(&self, _ctx: Context, reaction: Reaction) {
        match self.to_event(&reaction) {
            Some(event) => self.forward(PlatformEvent::ReactionRemoved(event)).await,
            None => trace!(target: "role_bot::platform", message_id = %reaction.message_id, "Ignoring reaction remove"),
        }
    }
}

/// Build an engine event from the parts of a serenity reaction.
///
/// `None` for reactions outside a guild, without a user, or made by the bot itself.
fn reaction_event(
    channel_id: ChannelId,
    message_id: MessageId,
    guild_id: Option<GuildId>,
    user_id: Option<UserId>,
    emoji: &ReactionType,
    bot_user: Option<UserId>,
) -> Option<ReactionEvent> {
    let guild_id = guild_id?;
    let user_id = user_id?;
    if bot_user == Some(user_id) {
        debug!(target: "role_bot::platform", %message_id, "Skipping the bot's own reaction");
        return None;
    }
    Some(ReactionEvent {
        channel_id: channel_id.to_string(),
        message_id: message_id.to_string(),
        guild_id: guild_id.to_string(),
        user_id: user_id.to_string(),
        emoji: event_emoji(emoji),
    })
}

fn event_emoji(reaction: &ReactionType) -> EventEmoji {
    match reaction {
        ReactionType::Custom { id, name, .. } => EventEmoji {
            name: name.clone(),
            id: Some(id.to_string()),
        },
        ReactionType::Unicode(name) => EventEmoji::unicode(name.clone()),
        #[allow(unreachable_patterns)]
        _ => EventEmoji::default(),
    }
}

fn reaction_type(emoji: &EmojiIdentity) -> Result<ReactionType, PlatformError> {
    if emoji.is_custom() {
        Ok(ReactionType::Custom {
            animated: emoji.animated,
            id: EmojiId::new(parse_id("emoji", &emoji.id)?),
            name: Some(emoji.name.clone()),
        })
    } else {
        Ok(ReactionType::Unicode(emoji.name.clone()))
    }
}

fn member_role_ids(
    guild_id: &str,
    user_id: &str,
    role_id: &str,
) -> Result<(GuildId, UserId, RoleId), PlatformError> {
    Ok((
        GuildId::new(parse_id("guild", guild_id)?),
        UserId::new(parse_id("user", user_id)?),
        RoleId::new(parse_id("role", role_id)?),
    ))
}

/// Parse a snowflake. Zero is rejected: serenity ids are non-zero.
fn parse_id(kind: &'static str, value: &str) -> Result<u64, PlatformError> {
    value
        .trim()
        .parse::<NonZeroU64>()
        .map(NonZeroU64::get)
        .map_err(|_| PlatformError::InvalidId {
            kind,
            value: value.to_string(),
        })
}
