//! Role message rendering.
//!
//! The text is a pure function of the channel's role list. Every reconciliation pass
//! re-sends it, so an unchanged config always produces the same edit.

use std::fmt::Write as _;

use crate::config::ChannelConfig;

/// Text used for channels without any role.
pub const EMPTY_PLACEHOLDER: &str = "No roles configured yet.";

/// First line(s) of a non-empty role message.
pub const HEADER: &str = "React to assign or remove roles:\n\n";

/// Render the tracked message text for a channel.
pub fn render(channel: &ChannelConfig) -> String {
    if channel.roles.is_empty() {
        return EMPTY_PLACEHOLDER.to_string();
    }

    let mut out = String::from(HEADER);
    for role in &channel.roles {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{} → {}", role.emoji, role.label);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmojiDescriptor, RoleEntry};

    fn role(emoji: &str, label: &str) -> RoleEntry {
        RoleEntry {
            emoji: emoji.into(),
            role_id: format!("id-{label}"),
            label: label.to_string(),
        }
    }

    fn channel(roles: Vec<RoleEntry>) -> ChannelConfig {
        ChannelConfig {
            channel_id: "1".into(),
            message_id: None,
            roles,
        }
    }

    #[test]
    fn empty_roles_render_placeholder() {
        assert_eq!(render(&channel(vec![])), "No roles configured yet.");
    }

    #[test]
    fn renders_header_and_lines_in_order() {
        let text = render(&channel(vec![role("🔥", "Fire"), role("<:wave:9>", "Wave")]));
        assert_eq!(
            text,
            "React to assign or remove roles:\n\n🔥 → Fire\n<:wave:9> → Wave\n"
        );
    }

    #[test]
    fn structured_custom_emoji_renders_as_tag() {
        let custom = |animated| RoleEntry {
            emoji: EmojiDescriptor::Custom {
                name: "party".into(),
                id: "42".into(),
                animated,
            },
            role_id: "R".into(),
            label: "Party".into(),
        };
        let text = render(&channel(vec![custom(false)]));
        assert!(text.ends_with("<:party:42> → Party\n"));
        let text = render(&channel(vec![custom(true), role("<a:wave:9>", "Wave")]));
        assert!(text.contains("<a:party:42> → Party\n"));
        assert!(text.ends_with("<a:wave:9> → Wave\n"));
    }

    #[test]
    fn output_is_stable_and_order_sensitive() {
        let a = channel(vec![role("🔥", "Fire"), role("👍", "Thumbs")]);
        let b = channel(vec![role("👍", "Thumbs"), role("🔥", "Fire")]);
        assert_eq!(render(&a), render(&a.clone()));
        assert_ne!(render(&a), render(&b));
    }

    #[test]
    fn message_id_does_not_affect_text() {
        let mut a = channel(vec![role("🔥", "Fire")]);
        let before = render(&a);
        a.message_id = Some("55".into());
        assert_eq!(render(&a), before);
    }
}
