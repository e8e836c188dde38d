//! Checkpoint stores
//!
//! A checkpoint is a serialized [`SessionState`] keyed by the session id.
//! Saving is best-effort: the orchestrator turns store failures into session
//! warnings. [`FileCheckpointStore`] keeps one pretty-printed JSON file per
//! session:
//!
//! ```text
//! <dir>/
//! └── <session-id>.json
//! ```

use async_trait::async_trait;
use discovery_core::SessionState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

const CHECKPOINT_EXTENSION: &str = "json";

/// Opaque handle returned by a save and accepted by a load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointToken(String);

impl CheckpointToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Uuid> for CheckpointToken {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for CheckpointToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist the session. `None` means the store keeps nothing.
    async fn save(&self, state: &SessionState) -> Result<Option<CheckpointToken>>;

    async fn load(&self, token: &CheckpointToken) -> Result<SessionState>;
}

/// Store that discards every checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCheckpointStore;

#[async_trait]
impl CheckpointStore for NoopCheckpointStore {
    async fn save(&self, _state: &SessionState) -> Result<Option<CheckpointToken>> {
        Ok(None)
    }

    async fn load(&self, token: &CheckpointToken) -> Result<SessionState> {
        Err(OrchestratorError::CheckpointNotFound(token.to_string()))
    }
}

/// In-process store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    sessions: RwLock<HashMap<CheckpointToken, SessionState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, state: &SessionState) -> Result<Option<CheckpointToken>> {
        let token = CheckpointToken::from(state.id());
        self.sessions
            .write()
            .await
            .insert(token.clone(), state.clone());
        Ok(Some(token))
    }

    async fn load(&self, token: &CheckpointToken) -> Result<SessionState> {
        self.sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| OrchestratorError::CheckpointNotFound(token.to_string()))
    }
}

/// Store writing one JSON file per session into a directory.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a checkpoint file. Only session ids are accepted as tokens.
    fn checkpoint_path(&self, token: &CheckpointToken) -> Result<PathBuf> {
        let id = Uuid::parse_str(token.as_str()).map_err(|_| {
            OrchestratorError::Checkpoint(format!("Invalid checkpoint token: {}", token))
        })?;
        Ok(self
            .dir
            .join(format!("{}.{}", id, CHECKPOINT_EXTENSION)))
    }

    async fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
            debug!("Created checkpoint directory: {}", self.dir.display());
        }
        Ok(())
    }

    /// Tokens of every checkpoint in the directory.
    pub async fn list(&self) -> Result<Vec<CheckpointToken>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut tokens = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CHECKPOINT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if Uuid::parse_str(stem).is_ok() {
                    tokens.push(CheckpointToken::new(stem));
                }
            }
        }
        tokens.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(tokens)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, state: &SessionState) -> Result<Option<CheckpointToken>> {
        self.ensure_dir().await?;

        let token = CheckpointToken::from(state.id());
        let path = self.checkpoint_path(&token)?;
        let content = serde_json::to_string_pretty(state).map_err(|e| {
            OrchestratorError::Serialization(format!("Failed to serialize session: {}", e))
        })?;

        fs::write(&path, content).await?;
        debug!("Saved checkpoint to {}", path.display());
        Ok(Some(token))
    }

    async fn load(&self, token: &CheckpointToken) -> Result<SessionState> {
        let path = self.checkpoint_path(token)?;
        if !path.exists() {
            return Err(OrchestratorError::CheckpointNotFound(token.to_string()));
        }

        let content = fs::read_to_string(&path).await?;
        let state: SessionState = serde_json::from_str(&content).map_err(|e| {
            OrchestratorError::Serialization(format!("Failed to parse checkpoint {}: {}", token, e))
        })?;

        info!(
            session_id = %state.id(),
            completed = state.completed_count(),
            "Loaded checkpoint from {}",
            path.display()
        );
        Ok(state)
    }
}
