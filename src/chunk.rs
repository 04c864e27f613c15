//! Overlapping sliding-window text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters,
//! with `overlap` characters duplicated between consecutive chunks so that
//! context survives chunk boundaries. Each chunk carries a SHA-256 hash of
//! its text for staleness detection.

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Split text into overlapping chunks, preserving original order.
/// Returns chunks with contiguous indices starting at 0; empty text
/// produces no chunks. Deterministic for a given input and parameters.
///
/// `overlap` must be `< chunk_size` (enforced at config load).
pub fn split(document_id: &str, text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    debug_assert!(overlap < chunk_size);

    if text.is_empty() {
        return Vec::new();
    }

    // Windows are measured in chars, not bytes, so multi-byte text never
    // splits inside a code point.
    let chars: Vec<char> = text.chars().collect();
    let stride = chunk_size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    loop {
        let end = (start + chunk_size).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        chunks.push(make_chunk(document_id, index, &piece));
        index += 1;

        if end == chars.len() {
            break;
        }
        start += stride;
    }

    chunks
}

fn make_chunk(document_id: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
