//! Emoji identity resolution.
//!
//! Configured emoji come in two flavours:
//! - literal unicode emoji such as `"🔥"`
//! - custom server emoji, written either as the chat tag `<:fire:123456>`
//!   (or `<a:fire:123456>` when animated) or as a structured `{ "name", "id" }`
//!
//! Everything is reduced to an [`EmojiIdentity`]: a name plus an id that is empty for
//! literal emoji. Matching against incoming reaction events goes through
//! [`EmojiIdentity::matches`]. No unicode normalization happens anywhere; skin-tone
//! variants are different emoji.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Comparable identity of an emoji.
///
/// Equality and hashing look at `name` and `id` only; `animated` changes how a custom
/// emoji is shown, not which emoji it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmojiIdentity {
    pub name: String,
    /// Platform-assigned custom emoji id; empty for literal emoji.
    pub id: String,
    #[serde(default)]
    pub animated: bool,
}

impl PartialEq for EmojiIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.id == other.id
    }
}

impl Eq for EmojiIdentity {}

impl Hash for EmojiIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.id.hash(state);
    }
}

impl EmojiIdentity {
    pub fn literal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
            animated: false,
        }
    }

    pub fn custom(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            animated: false,
        }
    }

    /// Mark a custom emoji as animated. Ignored for literal emoji.
    #[must_use]
    pub fn with_animation(mut self, animated: bool) -> Self {
        self.animated = animated && self.is_custom();
        self
    }

    /// Whether this identity names a custom server emoji.
    #[inline]
    pub fn is_custom(&self) -> bool {
        !self.id.is_empty()
    }

    /// Does an emoji carried by a reaction event match this configured identity?
    ///
    /// Custom identities compare on id only (the event's name may differ, e.g. after
    /// the emoji was renamed). Literal identities compare on exact name.
    pub fn matches(&self, event: &EventEmoji) -> bool {
        if self.is_custom() {
            event.id.as_deref() == Some(self.id.as_str())
        } else {
            event.name.as_deref() == Some(self.name.as_str())
        }
    }

    /// The form used when asking the platform to add or remove a reaction:
    /// `name:id` for custom emoji, the bare name otherwise.
    pub fn reaction_form(&self) -> String {
        if self.is_custom() {
            format!("{}:{}", self.name, self.id)
        } else {
            self.name.clone()
        }
    }
}

impl fmt::Display for EmojiIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_custom() {
            let prefix = if self.animated { "a" } else { "" };
            write!(f, "<{prefix}:{}:{}>", self.name, self.id)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Emoji as delivered by a reaction event.
///
/// `name` may be missing for custom emoji the platform can no longer resolve,
/// `id` is only present for custom emoji.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEmoji {
    pub name: Option<String>,
    pub id: Option<String>,
}

impl EventEmoji {
    pub fn unicode(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            id: None,
        }
    }

    pub fn custom(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            id: Some(id.into()),
        }
    }

    /// Identity of the event emoji, used when the router has to strip it again.
    pub fn identity(&self) -> EmojiIdentity {
        EmojiIdentity {
            name: self.name.clone().unwrap_or_default(),
            id: self.id.clone().unwrap_or_default(),
            animated: false,
        }
    }
}

/// Resolve a raw configured emoji string into its identity.
///
/// `<:name:id>` and `<a:name:id>` yield a custom identity; anything else,
/// including malformed tags, is taken literally.
pub fn resolve(raw: &str) -> EmojiIdentity {
    parse_custom_tag(raw).unwrap_or_else(|| EmojiIdentity::literal(raw))
}

fn parse_custom_tag(raw: &str) -> Option<EmojiIdentity> {
    let inner = raw.strip_prefix('<')?.strip_suffix('>')?;
    let mut parts = inner.split(':');
    let (prefix, name, id) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || !(prefix.is_empty() || prefix == "a") {
        return None;
    }
    if name.is_empty() || id.is_empty() {
        return None;
    }
    Some(EmojiIdentity::custom(name, id).with_animation(prefix == "a"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_custom_tag() {
        assert_eq!(
            resolve("<:fire:123456>"),
            EmojiIdentity::custom("fire", "123456")
        );
        assert!(!resolve("<:fire:123456>").animated);
    }

    #[test]
    fn animated_tag_keeps_its_flag() {
        let party = resolve("<a:party:42>");
        assert!(party.animated);
        assert_eq!(party.to_string(), "<a:party:42>");
        assert_eq!(party.reaction_form(), "party:42");
        // Same emoji as the static tag for matching and duplicate detection.
        assert_eq!(party, EmojiIdentity::custom("party", "42"));
        assert!(party.matches(&EventEmoji::custom("party", "42")));
        assert!(!EmojiIdentity::literal("🔥").with_animation(true).animated);
    }

    #[test]
    fn resolves_literal() {
        let id = resolve("🔥");
        assert_eq!(id.name, "🔥");
        assert_eq!(id.id, "");
        assert!(!id.is_custom());
    }

    #[test]
    fn malformed_tags_are_literal() {
        for raw in ["<:fire>", "<:fire:1:2>", "<fire:1>", "<:fire:1", "<::1>", "<b:x:1>"] {
            let id = resolve(raw);
            assert_eq!(id.name, raw, "{raw}");
            assert!(!id.is_custom(), "{raw}");
        }
    }

    #[test]
    fn custom_matches_on_id_regardless_of_name() {
        let configured = resolve("<:fire:123456>");
        assert!(configured.matches(&EventEmoji::custom("renamed", "123456")));
        assert!(!configured.matches(&EventEmoji::custom("fire", "999")));
        assert!(!configured.matches(&EventEmoji::unicode("fire")));
    }

    #[test]
    fn literal_matches_on_exact_name_only() {
        let configured = resolve("👍");
        assert!(configured.matches(&EventEmoji::unicode("👍")));
        assert!(!configured.matches(&EventEmoji::unicode("👍🏽")));
        // A custom emoji that happens to share the name is still a match: only the
        // name is compared for literal identities.
        assert!(configured.matches(&EventEmoji::custom("👍", "1")));
    }

    #[test]
    fn reaction_and_display_forms() {
        let custom = EmojiIdentity::custom("fire", "1");
        assert_eq!(custom.reaction_form(), "fire:1");
        assert_eq!(custom.to_string(), "<:fire:1>");
        assert_eq!(EmojiIdentity::literal("🔥").reaction_form(), "🔥");
    }
}
