//! Core data models used throughout docqa.
//!
//! These types represent the chunks that flow through the ingestion and
//! retrieval pipeline, plus the JSON wire shapes of the HTTP API.

use serde::{Deserialize, Serialize};

/// A bounded span of a document's text — the atomic unit of embedding
/// and retrieval. Immutable once created.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// One prior conversation turn, supplied by the caller per request.
/// The server holds no conversation state of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

/// Request body for `POST /ai/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default = "default_enable_rag")]
    pub enable_rag: bool,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

fn default_enable_rag() -> bool {
    true
}

/// Response body for `GET /`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
    pub knowledge_base_active: bool,
}

/// Response body for `POST /ai/upload` and `POST /ai/reset` on success.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
