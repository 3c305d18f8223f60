use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_valid::Validate;
use std::fmt;

use crate::emoji::{self, EmojiIdentity};

/// Token value written into freshly generated templates.
pub const PLACEHOLDER_TOKEN: &str = "PUT_YOUR_TOKEN_HERE";

/// Root configuration for the role bot.
///
/// Deserialized from the JSON config file. The bot mutates it in exactly one place:
/// filling in `message_id` once the tracked message of a channel has been created.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, Default, PartialEq)]
pub struct BotConfig {
    /// Bot token. May be overridden at startup with `--token-file`.
    #[serde(default)]
    pub bot_token: String,

    /// Channels holding a tracked role message, in reconciliation order.
    #[serde(default)]
    #[validate]
    pub channels: Vec<ChannelConfig>,
}

impl BotConfig {
    /// The config written on first run: placeholder token, one example channel.
    pub fn template() -> Self {
        Self {
            bot_token: PLACEHOLDER_TOKEN.to_string(),
            channels: vec![ChannelConfig {
                channel_id: "YOUR_CHANNEL_ID_HERE".to_string(),
                message_id: None,
                roles: vec![RoleEntry {
                    emoji: EmojiDescriptor::Literal("🔥".to_string()),
                    role_id: "ROLE_ID_HERE".to_string(),
                    label: "Example Role".to_string(),
                }],
            }],
        }
    }

    /// False when the token is unset or still the template placeholder.
    pub fn has_usable_token(&self) -> bool {
        is_usable_token(&self.bot_token)
    }
}

pub fn is_usable_token(token: &str) -> bool {
    let token = token.trim();
    !token.is_empty() && token != PLACEHOLDER_TOKEN
}

/// One channel and its tracked role message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, Default, PartialEq)]
pub struct ChannelConfig {
    #[validate(min_length = 1)]
    pub channel_id: String,

    /// Id of the tracked message. Absent (or `""` in hand-written files) until the
    /// bot has posted it.
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub message_id: Option<String>,

    /// Reaction to role mappings, in display order.
    #[serde(default)]
    #[validate]
    pub roles: Vec<RoleEntry>,
}

/// A single reaction -> role mapping.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
pub struct RoleEntry {
    pub emoji: EmojiDescriptor,

    #[validate(min_length = 1)]
    pub role_id: String,

    /// Text shown next to the emoji in the role message.
    #[serde(default)]
    pub label: String,
}

impl RoleEntry {
    pub fn identity(&self) -> EmojiIdentity {
        self.emoji.identity()
    }
}

/// Emoji as written in the config.
///
/// Either a plain string (`"🔥"`, `"<:fire:123456>"`) or an explicit custom emoji
/// object (`{ "name": "fire", "id": "123456" }`, with `"animated": true` for animated
/// emoji).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum EmojiDescriptor {
    Literal(String),
    Custom {
        name: String,
        id: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        animated: bool,
    },
}

impl EmojiDescriptor {
    pub fn identity(&self) -> EmojiIdentity {
        match self {
            EmojiDescriptor::Literal(raw) => emoji::resolve(raw),
            EmojiDescriptor::Custom { name, id, animated } => {
                EmojiIdentity::custom(name, id).with_animation(*animated)
            }
        }
    }
}

impl fmt::Display for EmojiDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmojiDescriptor::Literal(raw) => f.write_str(raw),
            EmojiDescriptor::Custom { name, id, animated } => {
                let prefix = if *animated { "a" } else { "" };
                write!(f, "<{prefix}:{name}:{id}>")
            }
        }
    }
}

impl From<&str> for EmojiDescriptor {
    fn from(raw: &str) -> Self {
        EmojiDescriptor::Literal(raw.to_string())
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_message_id_reads_as_absent() {
        let ch: ChannelConfig = serde_json::from_value(json!({
            "channel_id": "1",
            "message_id": "",
            "roles": []
        }))
        .unwrap();
        assert_eq!(ch.message_id, None);

        let ch: ChannelConfig =
            serde_json::from_value(json!({"channel_id": "1", "message_id": "77"})).unwrap();
        assert_eq!(ch.message_id.as_deref(), Some("77"));
    }

    #[test]
    fn emoji_descriptor_accepts_both_forms() {
        let entries: Vec<RoleEntry> = serde_json::from_value(json!([
            {"emoji": "🔥", "role_id": "R1", "label": "Fire"},
            {"emoji": {"name": "party", "id": "42"}, "role_id": "R2", "label": "Party"}
        ]))
        .unwrap();
        assert_eq!(entries[0].identity(), EmojiIdentity::literal("🔥"));
        assert_eq!(entries[1].identity(), EmojiIdentity::custom("party", "42"));
        assert_eq!(entries[1].emoji.to_string(), "<:party:42>");
    }

    #[test]
    fn structured_emoji_keeps_animation_flag() {
        let entry: RoleEntry = serde_json::from_value(json!(
            {"emoji": {"name": "party", "id": "42", "animated": true}, "role_id": "R"}
        ))
        .unwrap();
        assert!(entry.identity().animated);
        assert_eq!(entry.emoji.to_string(), "<a:party:42>");

        // A static emoji does not grow an `animated` key when saved.
        let value = serde_json::to_value(EmojiDescriptor::Custom {
            name: "fire".into(),
            id: "1".into(),
            animated: false,
        })
        .unwrap();
        assert_eq!(value, json!({"name": "fire", "id": "1"}));
    }

    #[test]
    fn template_needs_a_real_token() {
        let cfg = BotConfig::template();
        assert!(!cfg.has_usable_token());
        assert_eq!(cfg.channels.len(), 1);
        assert_eq!(cfg.channels[0].roles[0].role_id, "ROLE_ID_HERE");

        let cfg = BotConfig {
            bot_token: "abc".into(),
            ..BotConfig::template()
        };
        assert!(cfg.has_usable_token());
    }

    #[test]
    fn absent_message_id_is_not_serialized() {
        let value = serde_json::to_value(BotConfig::template()).unwrap();
        assert!(value["channels"][0].get("message_id").is_none());
    }
}
