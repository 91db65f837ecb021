//! Position persistence across suspension

use crate::{types::SessionId, Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Scalars externalized when a player screen is suspended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub position_ms: u64,
    pub play_when_ready: bool,
    pub episode_index: usize,
    pub saved_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new(position_ms: u64, play_when_ready: bool, episode_index: usize) -> Self {
        Self {
            position_ms,
            play_when_ready,
            episode_index,
            saved_at: Utc::now(),
        }
    }
}

/// Restorable store keyed by screen instance
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save(&self, key: SessionId, snapshot: &SessionSnapshot) -> Result<()>;

    async fn load(&self, key: SessionId) -> Result<Option<SessionSnapshot>>;

    async fn remove(&self, key: SessionId) -> Result<()>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<SessionId, SessionSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn save(&self, key: SessionId, snapshot: &SessionSnapshot) -> Result<()> {
        self.entries.write().await.insert(key, snapshot.clone());
        Ok(())
    }

    async fn load(&self, key: SessionId) -> Result<Option<SessionSnapshot>> {
        Ok(self.entries.read().await.get(&key).cloned())
    }

    async fn remove(&self, key: SessionId) -> Result<()> {
        self.entries.write().await.remove(&key);
        Ok(())
    }
}

/// One JSON file per session in a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn save(&self, key: SessionId, snapshot: &SessionSnapshot) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(snapshot)?;

        // Write then rename so a crash never leaves a truncated snapshot
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), "Session snapshot written");
        Ok(())
    }

    async fn load(&self, key: SessionId) -> Result<Option<SessionSnapshot>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        let snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Store(format!("{}: {}", path.display(), e)))?;
        Ok(Some(snapshot))
    }

    async fn remove(&self, key: SessionId) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
