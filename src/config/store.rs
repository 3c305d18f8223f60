//! Config persistence and the shared in-memory snapshot.
//!
//! [`ConfigStore`] abstracts where the config lives; [`JsonFileStore`] is the single flat
//! JSON file used by the binary. [`SharedConfig`] is the handle every component holds:
//! readers get an `Arc<BotConfig>` snapshot, writers swap or patch it under a write lock
//! so nobody ever sees a half-updated channel list.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::loader::{LoadError, load_from_slice};
use super::models::BotConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode config: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Config {path} is invalid: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Abstract read/write access to the persisted config.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the whole config. `Ok(None)` means nothing has been persisted yet.
    async fn read(&self) -> Result<Option<BotConfig>, StoreError>;

    /// Persist the whole config, replacing what was there.
    async fn write(&self, config: &BotConfig) -> Result<(), StoreError>;

    /// Location shown in logs.
    fn describe(&self) -> String;
}

/// Config stored as one pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn read(&self) -> Result<Option<BotConfig>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        let cfg = load_from_slice(&bytes).map_err(|e| match e {
            LoadError::Parse(source) => StoreError::Parse {
                path: self.path.clone(),
                source,
            },
            LoadError::Invalid(message) => StoreError::Invalid {
                path: self.path.clone(),
                message,
            },
        })?;
        info!(target: "role_bot::config", path = %self.path.display(), "Config loaded");
        Ok(Some(cfg))
    }

    async fn write(&self, config: &BotConfig) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_string_pretty(config).map_err(StoreError::Encode)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_err(e))?;
        info!(target: "role_bot::config", path = %self.path.display(), "Config saved");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Position of one channel entry within a given config generation.
///
/// Every [`SharedConfig::replace`] starts a new generation, so a slot taken before a
/// reload no longer addresses anything after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySlot {
    pub generation: u64,
    pub index: usize,
}

#[derive(Debug)]
struct Current {
    generation: u64,
    config: Arc<BotConfig>,
}

/// Shared handle to the active config snapshot.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<Current>>,
}

impl SharedConfig {
    pub fn new(config: BotConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Current {
                generation: 0,
                config: Arc::new(config),
            })),
        }
    }

    /// A consistent view of the config as of now. Later reloads do not affect it.
    pub async fn snapshot(&self) -> Arc<BotConfig> {
        Arc::clone(&self.inner.read().await.config)
    }

    /// Like [`snapshot`](Self::snapshot), together with its generation.
    pub async fn versioned(&self) -> (u64, Arc<BotConfig>) {
        let current = self.inner.read().await;
        (current.generation, Arc::clone(&current.config))
    }

    /// Swap in a freshly loaded config.
    pub async fn replace(&self, config: BotConfig) {
        let mut current = self.inner.write().await;
        current.generation += 1;
        current.config = Arc::new(config);
    }

    /// Record the id of a newly created tracked message on the exact entry it was
    /// posted for.
    ///
    /// Returns the updated snapshot (for persisting), or `None` when the slot is gone:
    /// the config was reloaded since the slot was taken, or the entry already tracks
    /// a message.
    pub async fn assign_message_id(
        &self,
        slot: EntrySlot,
        message_id: &str,
    ) -> Option<Arc<BotConfig>> {
        let mut current = self.inner.write().await;
        if current.generation != slot.generation {
            debug!(
                target: "role_bot::config",
                expected = slot.generation,
                actual = current.generation,
                "Config reloaded; not assigning message id"
            );
            return None;
        }
        let channel = Arc::make_mut(&mut current.config)
            .channels
            .get_mut(slot.index)?;
        if channel.message_id.is_some() {
            return None;
        }
        channel.message_id = Some(message_id.to_string());
        debug!(
            target: "role_bot::config",
            channel_id = %channel.channel_id,
            index = slot.index,
            %message_id,
            "Assigned tracked message id"
        );
        Some(Arc::clone(&current.config))
    }
}

/// In-memory store for tests; counts writes.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    pub config: std::sync::Mutex<Option<BotConfig>>,
    pub writes: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with(config: BotConfig) -> Self {
        Self {
            config: std::sync::Mutex::new(Some(config)),
            writes: Default::default(),
        }
    }

    pub fn set(&self, config: BotConfig) {
        *self.config.lock().unwrap() = Some(config);
    }

    pub fn current(&self) -> Option<BotConfig> {
        self.config.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl ConfigStore for MemoryStore {
    async fn read(&self) -> Result<Option<BotConfig>, StoreError> {
        Ok(self.current())
    }

    async fn write(&self, config: &BotConfig) -> Result<(), StoreError> {
        self.set(config.clone());
        self.writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
