//! Process-wide knowledge-base session and ingestion orchestration.
//!
//! One [`SessionState`] holds the single knowledge-store slot for the
//! process: absent at startup, created by the first ingestion, grown by
//! later ones, cleared by reset. Ingestion takes the slot's write lock;
//! retrieval takes the read lock, so a search never observes a store
//! mid-mutation.

use anyhow::Result;
use std::path::Path;
use tokio::sync::{RwLock, RwLockReadGuard};
use uuid::Uuid;

use crate::chunk::split;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::loader::{load_document, LoadError};
use crate::store::KnowledgeStore;

/// Ingestion failure, split so the boundary can map each kind to its own
/// status code.
#[derive(Debug)]
pub enum IngestError {
    /// The document could not be loaded (missing path, unsupported
    /// format, malformed content).
    Load(LoadError),
    /// The embedding backend failed; the store keeps its prior state.
    Backend(anyhow::Error),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Load(e) => write!(f, "{}", e),
            IngestError::Backend(e) => write!(f, "embedding backend error: {:#}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<LoadError> for IngestError {
    fn from(e: LoadError) -> Self {
        IngestError::Load(e)
    }
}

/// Single-slot holder for the process-wide knowledge store.
pub struct SessionState {
    slot: RwLock<Option<KnowledgeStore>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Shared access for retrieval. Holds off ingestion until dropped.
    pub async fn slot(&self) -> RwLockReadGuard<'_, Option<KnowledgeStore>> {
        self.slot.read().await
    }

    pub async fn is_active(&self) -> bool {
        self.slot.read().await.is_some()
    }

    /// Route a chunk batch to store creation or append, depending on
    /// whether the slot is currently occupied. Returns `true` when a new
    /// store was created. On failure the slot keeps its prior state.
    pub async fn initialize_or_append(
        &self,
        chunks: Vec<crate::models::Chunk>,
        embedder: &dyn Embedder,
    ) -> Result<bool> {
        let mut slot = self.slot.write().await;
        match slot.as_mut() {
            Some(store) => {
                store.append(chunks, embedder).await?;
                Ok(false)
            }
            None => {
                let store = KnowledgeStore::create(chunks, embedder).await?;
                *slot = Some(store);
                Ok(true)
            }
        }
    }

    /// Clear the slot unconditionally. Idempotent; the discarded
    /// embeddings are not recoverable — rebuilding requires re-ingestion.
    pub async fn reset(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Full ingestion pipeline: load → chunk → embed → index.
///
/// Returns the operator-facing status message. Document loading (file IO
/// plus PDF/DOCX parsing) runs on the blocking pool.
pub async fn ingest_file(
    session: &SessionState,
    config: &Config,
    embedder: &dyn Embedder,
    path: &Path,
) -> Result<String, IngestError> {
    let owned = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || load_document(&owned))
        .await
        .map_err(|e| IngestError::Backend(anyhow::anyhow!("loader task failed: {}", e)))??;

    let document_id = Uuid::new_v4().to_string();
    let chunks = split(
        &document_id,
        &text,
        config.chunking.chunk_size,
        config.chunking.overlap,
    );

    let created = session
        .initialize_or_append(chunks, embedder)
        .await
        .map_err(IngestError::Backend)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(if created {
        format!("Knowledge base initialized. File: {}", file_name)
    } else {
        format!(
            "Appended new document. Knowledge base now includes: {}",
            file_name
        )
    })
}
