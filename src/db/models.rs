use chrono::{DateTime, Utc};

use crate::chunker::Chunk;

/// What an index build was made from, stored with its chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub source: String,
    pub fingerprint: String,
    pub embedding_model: String,
    /// [`crate::chunker::Chunker::signature`] of the chunker used.
    pub chunking: String,
}

/// Row of the `documents` table: the contract a namespace was built from.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: i64,
    pub namespace: String,
    pub source: String,
    pub fingerprint: String,
    pub embedding_model: String,
    pub chunking: String,
    pub chunk_count: usize,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// `1 - cosine_distance / 2`, in `0..=1`.
    pub similarity: f32,
}
