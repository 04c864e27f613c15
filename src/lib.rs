//! # docqa
//!
//! A document-grounded question answering service with streamed answers.
//!
//! docqa ingests uploaded documents (PDF, DOCX) into an in-memory vector
//! index, retrieves the most relevant chunks at question time, and streams
//! a generated answer grounded in them — falling back to ungrounded
//! generation when no knowledge base exists or retrieval is switched off.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌─────────┐   ┌──────────┐   ┌─────────────────┐
//! │ Loader │──▶│ Chunker │──▶│ Embedder │──▶│ Knowledge Store │
//! └────────┘   └─────────┘   └──────────┘   └───────┬─────────┘
//!                                                   │ search
//!              ┌───────────┐   ┌──────────┐   ┌─────▼─────┐
//!  SSE stream ◀│ Generator │◀──│  Prompt  │◀──│ Retriever │
//!              └───────────┘   └──────────┘   └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and wire shapes |
//! | [`loader`] | PDF/DOCX text extraction |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding capability and Gemini backend |
//! | [`store`] | In-memory vector index |
//! | [`retrieve`] | Gated, degrading retrieval |
//! | [`prompt`] | Generation prompt assembly |
//! | [`generate`] | Streaming generation adapter |
//! | [`session`] | Knowledge-base lifecycle and ingestion |
//! | [`server`] | HTTP API |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod generate;
pub mod loader;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod server;
pub mod session;
pub mod store;
