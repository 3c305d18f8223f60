//! Reconciliation of configured channels against the chat platform.
//!
//! For each channel the tracked message is created (first run) or edited to the
//! rendered text, then every configured emoji is attached as a reaction. Nothing here
//! is fatal: failures are logged and the channel stays unfixed until the next pass.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{ChannelConfig, ConfigStore, EntrySlot, SharedConfig};
use crate::platform::ChatPlatform;
use crate::render;

/// What happened to the tracked message during one `ensure` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// A new message was posted and its id recorded.
    Created { message_id: String, persisted: bool },
    CreateFailed,
    Edited { message_id: String },
    /// The edit was refused, e.g. the message was deleted by hand. The stale id is kept.
    EditFailed { message_id: String },
}

impl MessageOutcome {
    /// Id of the message reactions were attached to, if any.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            MessageOutcome::Created { message_id, .. }
            | MessageOutcome::Edited { message_id }
            | MessageOutcome::EditFailed { message_id } => Some(message_id),
            MessageOutcome::CreateFailed => None,
        }
    }
}

/// Summary of one channel reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub channel_id: String,
    pub message: MessageOutcome,
    pub reactions_attached: usize,
    pub reactions_failed: usize,
}

/// Makes live chat state match the configured channels.
#[derive(Clone)]
pub struct Reconciler {
    platform: Arc<dyn ChatPlatform>,
    config: SharedConfig,
    store: Arc<dyn ConfigStore>,
}

impl Reconciler {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        config: SharedConfig,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            platform,
            config,
            store,
        }
    }

    /// Reconcile every channel of the current snapshot, in configured order.
    pub async fn ensure_all(&self) -> Vec<ReconcileReport> {
        let (generation, snapshot) = self.config.versioned().await;
        info!(
            target: "role_bot::reconcile",
            channels = snapshot.channels.len(),
            generation,
            "Reconciling role messages"
        );
        let mut reports = Vec::with_capacity(snapshot.channels.len());
        for (index, channel) in snapshot.channels.iter().enumerate() {
            let slot = EntrySlot { generation, index };
            reports.push(self.ensure(slot, channel).await);
        }
        reports
    }

    /// Reconcile a single channel entry. `slot` says where `channel` sits in the
    /// config, so a newly created message id lands on this entry and no other.
    pub async fn ensure(&self, slot: EntrySlot, channel: &ChannelConfig) -> ReconcileReport {
        let content = render::render(channel);
        let channel_id = channel.channel_id.as_str();

        let message = match channel.message_id.as_deref() {
            None => self.create(slot, channel_id, &content).await,
            Some(message_id) => self.edit(channel_id, message_id, &content).await,
        };

        let mut report = ReconcileReport {
            channel_id: channel_id.to_string(),
            message,
            reactions_attached: 0,
            reactions_failed: 0,
        };

        let Some(message_id) = report.message.message_id().map(str::to_owned) else {
            return report;
        };

        for role in &channel.roles {
            let emoji = role.identity();
            match self
                .platform
                .add_reaction(channel_id, &message_id, &emoji)
                .await
            {
                Ok(()) => {
                    report.reactions_attached += 1;
                    debug!(target: "role_bot::reconcile", %channel_id, %message_id, %emoji, "Reaction attached");
                }
                Err(e) => {
                    report.reactions_failed += 1;
                    warn!(
                        target: "role_bot::reconcile",
                        %channel_id, %message_id, %emoji, error = %e,
                        "Failed to attach reaction"
                    );
                }
            }
        }

        report
    }

    async fn create(&self, slot: EntrySlot, channel_id: &str, content: &str) -> MessageOutcome {
        let message_id = match self.platform.send_message(channel_id, content).await {
            Ok(id) => id,
            Err(e) => {
                error!(
                    target: "role_bot::reconcile",
                    %channel_id, error = %e,
                    "Failed to create role message"
                );
                return MessageOutcome::CreateFailed;
            }
        };
        info!(target: "role_bot::reconcile", %channel_id, %message_id, "Created new role message");

        let persisted = match self.config.assign_message_id(slot, &message_id).await {
            Some(updated) => match self.store.write(&updated).await {
                Ok(()) => true,
                Err(e) => {
                    error!(
                        target: "role_bot::reconcile",
                        %channel_id, %message_id, store = %self.store.describe(), error = %e,
                        "Failed to persist message id; it is only kept in memory"
                    );
                    false
                }
            },
            None => {
                warn!(
                    target: "role_bot::reconcile",
                    %channel_id, %message_id,
                    "Channel no longer awaits a message (config reloaded?); id not recorded"
                );
                false
            }
        };

        MessageOutcome::Created {
            message_id,
            persisted,
        }
    }

    async fn edit(&self, channel_id: &str, message_id: &str, content: &str) -> MessageOutcome {
        match self
            .platform
            .edit_message(channel_id, message_id, content)
            .await
        {
            Ok(()) => {
                info!(target: "role_bot::reconcile", %channel_id, %message_id, "Updated role message");
                MessageOutcome::Edited {
                    message_id: message_id.to_string(),
                }
            }
            Err(e) => {
                warn!(
                    target: "role_bot::reconcile",
                    %channel_id, %message_id, error = %e,
                    "Failed to edit role message"
                );
                MessageOutcome::EditFailed {
                    message_id: message_id.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::store::MemoryStore;
    use crate::config::{BotConfig, RoleEntry};
    use crate::platform::testing::{Call, RecordingPlatform};

    fn role(emoji: &str, role_id: &str) -> RoleEntry {
        RoleEntry {
            emoji: emoji.into(),
            role_id: role_id.into(),
            label: role_id.into(),
        }
    }

    fn config(message_id: Option<&str>, roles: Vec<RoleEntry>) -> BotConfig {
        BotConfig {
            bot_token: "t".into(),
            channels: vec![ChannelConfig {
                channel_id: "100".into(),
                message_id: message_id.map(str::to_owned),
                roles,
            }],
        }
    }

    fn setup(
        platform: RecordingPlatform,
        cfg: BotConfig,
    ) -> (Arc<RecordingPlatform>, Arc<MemoryStore>, SharedConfig, Reconciler) {
        let platform = Arc::new(platform);
        let store = Arc::new(MemoryStore::with(cfg.clone()));
        let shared = SharedConfig::new(cfg);
        let reconciler = Reconciler::new(platform.clone(), shared.clone(), store.clone());
        (platform, store, shared, reconciler)
    }

    #[tokio::test]
    async fn creates_message_records_id_and_reacts() {
        let (platform, store, shared, rec) =
            setup(RecordingPlatform::new(), config(None, vec![role("👍", "R1")]));

        let reports = rec.ensure_all().await;
        assert_eq!(reports.len(), 1);
        let created_id = match &reports[0].message {
            MessageOutcome::Created { message_id, persisted } => {
                assert!(*persisted);
                message_id.clone()
            }
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(reports[0].reactions_attached, 1);

        assert_eq!(
            shared.snapshot().await.channels[0].message_id.as_deref(),
            Some(created_id.as_str())
        );
        assert_eq!(store.write_count(), 1);
        assert_eq!(
            store.current().unwrap().channels[0].message_id.as_deref(),
            Some(created_id.as_str())
        );

        let calls = platform.calls();
        assert!(matches!(&calls[0], Call::Send { channel, .. } if channel == "100"));
        assert_eq!(
            calls[1],
            Call::React {
                channel: "100".into(),
                message: created_id,
                emoji: "👍".into()
            }
        );
    }

    #[tokio::test]
    async fn create_failure_skips_reactions_and_persistence() {
        let platform = RecordingPlatform {
            fail_send: true,
            ..RecordingPlatform::new()
        };
        let (platform, store, shared, rec) = setup(platform, config(None, vec![role("👍", "R1")]));

        let reports = rec.ensure_all().await;
        assert_eq!(reports[0].message, MessageOutcome::CreateFailed);
        assert_eq!(platform.calls().len(), 1);
        assert_eq!(store.write_count(), 0);
        assert!(shared.snapshot().await.channels[0].message_id.is_none());
    }

    #[tokio::test]
    async fn ensure_twice_edits_with_identical_text_and_never_creates() {
        let (platform, store, _shared, rec) =
            setup(RecordingPlatform::new(), config(Some("555"), vec![role("🔥", "R1")]));

        rec.ensure_all().await;
        rec.ensure_all().await;

        let edits: Vec<_> = platform
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Edit { message, content, .. } => Some((message, content)),
                Call::Send { .. } => panic!("must not create a message"),
                _ => None,
            })
            .collect();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0], edits[1]);
        assert_eq!(edits[0].0, "555");
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn created_message_is_edited_on_the_next_pass() {
        let (platform, _store, _shared, rec) =
            setup(RecordingPlatform::new(), config(None, vec![role("👍", "R1")]));

        rec.ensure_all().await;
        platform.clear();
        let reports = rec.ensure_all().await;
        assert!(matches!(reports[0].message, MessageOutcome::Edited { .. }));
        assert!(!platform.calls().iter().any(|c| matches!(c, Call::Send { .. })));
    }

    #[tokio::test]
    async fn edit_failure_keeps_id_and_still_reacts() {
        let platform = RecordingPlatform {
            fail_edit: true,
            ..RecordingPlatform::new()
        };
        let (platform, _store, shared, rec) = setup(
            platform,
            config(Some("555"), vec![role("🔥", "R1"), role("👍", "R2")]),
        );

        let report = rec.ensure_all().await.remove(0);
        assert_eq!(
            report.message,
            MessageOutcome::EditFailed {
                message_id: "555".into()
            }
        );
        assert_eq!(report.reactions_attached, 2);
        assert_eq!(
            shared.snapshot().await.channels[0].message_id.as_deref(),
            Some("555")
        );
        assert_eq!(platform.calls().len(), 3);
    }

    #[tokio::test]
    async fn reaction_failures_do_not_abort_the_rest() {
        let mut platform = RecordingPlatform::new();
        platform.fail_reactions.insert("fire:1".to_string());
        let (platform, _store, _shared, rec) = setup(
            platform,
            config(
                Some("555"),
                vec![role("👍", "A"), role("<:fire:1>", "B"), role("🎉", "C")],
            ),
        );

        let report = rec.ensure_all().await.remove(0);
        assert_eq!(report.reactions_attached, 2);
        assert_eq!(report.reactions_failed, 1);
        let reacted: Vec<_> = platform
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::React { emoji, .. } => Some(emoji),
                _ => None,
            })
            .collect();
        assert_eq!(reacted, vec!["👍", "fire:1", "🎉"]);
    }

    #[tokio::test]
    async fn empty_channel_gets_placeholder() {
        let (platform, _store, _shared, rec) = setup(RecordingPlatform::new(), config(Some("9"), vec![]));
        rec.ensure_all().await;
        assert_eq!(
            platform.calls(),
            vec![Call::Edit {
                channel: "100".into(),
                message: "9".into(),
                content: render::EMPTY_PLACEHOLDER.into()
            }]
        );
    }

    #[tokio::test]
    async fn new_id_lands_on_the_entry_it_was_posted_for() {
        let platform = RecordingPlatform::new();
        *platform.fail_next_sends.lock().unwrap() = 1;
        let mut cfg = config(None, vec![role("🔥", "A")]);
        cfg.channels.push(ChannelConfig {
            channel_id: "100".into(),
            message_id: None,
            roles: vec![role("👍", "B")],
        });
        let (platform, store, shared, rec) = setup(platform, cfg);

        let reports = rec.ensure_all().await;
        assert_eq!(reports[0].message, MessageOutcome::CreateFailed);
        let posted = reports[1].message.message_id().unwrap().to_string();

        let snapshot = shared.snapshot().await;
        assert!(snapshot.channels[0].message_id.is_none());
        assert_eq!(snapshot.channels[1].message_id.as_deref(), Some(posted.as_str()));
        let saved = store.current().unwrap();
        assert!(saved.channels[0].message_id.is_none());
        assert_eq!(saved.channels[1].message_id.as_deref(), Some(posted.as_str()));

        // The posted message shows the second entry's roles.
        let sends: Vec<_> = platform
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { content, .. } => Some(content),
                _ => None,
            })
            .collect();
        assert!(sends[1].contains("👍"));

        // The next pass retries the first entry and edits the second.
        platform.clear();
        let reports = rec.ensure_all().await;
        assert!(matches!(reports[0].message, MessageOutcome::Created { .. }));
        assert_eq!(
            reports[1].message,
            MessageOutcome::Edited { message_id: posted }
        );
    }

    #[tokio::test]
    async fn reload_during_a_pass_drops_the_new_id() {
        let (_platform, store, shared, rec) =
            setup(RecordingPlatform::new(), config(None, vec![role("👍", "R1")]));
        let (generation, snapshot) = shared.versioned().await;
        shared.replace(config(None, vec![role("🎉", "R2")])).await;

        let report = rec
            .ensure(EntrySlot { generation, index: 0 }, &snapshot.channels[0])
            .await;
        assert!(matches!(
            report.message,
            MessageOutcome::Created { persisted: false, .. }
        ));
        assert!(shared.snapshot().await.channels[0].message_id.is_none());
        assert_eq!(store.write_count(), 0);
    }
}
