/// Crate-level error type.
///
/// Fatal conditions only. Retrieval misses, oracle non-answers and score
/// parse failures are ordinary data and never surface here.
use thiserror::Error;

use crate::embedder::EmbedderError;
use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum AuditError {
    /// Required endpoint, model or setting is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The contract could not be read or is not a supported document.
    #[error("input error: {0}")]
    Input(String),

    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("no index has been built for namespace '{0}'")]
    IndexNotBuilt(String),

    /// The namespace holds chunks of a different document.
    #[error("index for namespace '{namespace}' was built from {found}, not {expected}; rebuild required")]
    StaleIndex {
        namespace: String,
        expected: String,
        found: String,
    },

    /// The namespace was built with another embedding model or chunking setup.
    #[error("index for namespace '{namespace}' was built with {setting} '{found}', not '{expected}'; rebuild required")]
    IndexMismatch {
        namespace: String,
        setting: &'static str,
        expected: String,
        found: String,
    },

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("completion failed: {0}")]
    Llm(#[from] LlmError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AuditError> = std::result::Result<T, E>;
