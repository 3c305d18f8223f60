//! Startup sequence and event dispatch.
//!
//! [`RoleBot`] owns the shared config handle and hands it, together with the platform
//! and the store, to the reconciler, the router and the hot reload tasks. The binary
//! drives it in this order:
//!
//! 1. [`load_or_init`] (writes a template and stops on first run)
//! 2. [`resolve_token`]
//! 3. connect the platform
//! 4. [`RoleBot::reconcile_all`]
//! 5. [`RoleBot::spawn_hot_reload`]
//! 6. [`RoleBot::dispatch`] until shutdown

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{BotConfig, ConfigStore, SharedConfig, is_usable_token};
use crate::platform::{ChatPlatform, PlatformEvent};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::router::Router;
use crate::watcher::{HotReload, ReloadWorker, spawn_hot_reload};

/// Result of loading the config at startup.
#[derive(Debug)]
pub enum Startup {
    Loaded(BotConfig),
    /// No config existed; a template was written and the process should stop.
    TemplateWritten,
}

/// Load the persisted config, or write the template when there is none.
pub async fn load_or_init(store: &dyn ConfigStore) -> Result<Startup> {
    match store
        .read()
        .await
        .with_context(|| format!("Failed to load config from {}", store.describe()))?
    {
        Some(cfg) => Ok(Startup::Loaded(cfg)),
        None => {
            store
                .write(&BotConfig::template())
                .await
                .with_context(|| format!("Failed to write config template to {}", store.describe()))?;
            info!(target: "role_bot", store = %store.describe(), "Generated config template");
            Ok(Startup::TemplateWritten)
        }
    }
}

/// The token to connect with: the trimmed contents of `token_file` when given,
/// otherwise the config's `bot_token`. The config itself is left untouched so the
/// secret is never written back into the config file.
pub fn resolve_token(config: &BotConfig, token_file: Option<&Path>) -> Result<String> {
    let token = match token_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file {}", path.display()))?
            .trim()
            .to_string(),
        None => config.bot_token.trim().to_string(),
    };
    if !is_usable_token(&token) {
        bail!("Set your bot_token in the config (or pass --token-file) before running");
    }
    Ok(token)
}

/// The assembled engine.
#[derive(Clone)]
pub struct RoleBot {
    config: SharedConfig,
    store: Arc<dyn ConfigStore>,
    reconciler: Reconciler,
    router: Router,
}

impl RoleBot {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        config: BotConfig,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        let config = SharedConfig::new(config);
        let reconciler = Reconciler::new(Arc::clone(&platform), config.clone(), Arc::clone(&store));
        let router = Router::new(platform, config.clone());
        Self {
            config,
            store,
            reconciler,
            router,
        }
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Startup reconciliation of every configured channel.
    pub async fn reconcile_all(&self) -> Vec<ReconcileReport> {
        let reports = self.reconciler.ensure_all().await;
        let unfixed = reports
            .iter()
            .filter(|r| r.message.message_id().is_none() || r.reactions_failed > 0)
            .count();
        if unfixed > 0 {
            warn!(target: "role_bot", unfixed, "Some channels are not fully reconciled");
        }
        reports
    }

    /// Start watching `config_path` and reconciling on change.
    pub fn spawn_hot_reload(&self, config_path: PathBuf, cancel: CancellationToken) -> HotReload {
        let worker = ReloadWorker::new(
            Arc::clone(&self.store),
            self.config.clone(),
            self.reconciler.clone(),
        );
        spawn_hot_reload(config_path, worker, cancel)
    }

    /// Route platform events until the channel closes or `cancel` fires.
    ///
    /// Every event is handled on its own task so a slow platform call never holds
    /// up the next reaction.
    pub async fn dispatch(&self, mut events: mpsc::Receiver<PlatformEvent>, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(e) => e,
                    None => break,
                },
            };
            let router = self.router.clone();
            tokio::spawn(async move {
                router.handle(&event).await;
            });
        }
        debug!(target: "role_bot", "Event dispatch stopped");
    }
}
