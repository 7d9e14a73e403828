/// Completion oracle trait.
///
/// Extraction, summarization, re-ranking and risk rating all go through
/// `Completer::complete`. Implementations are expected to run at temperature
/// zero so repeated analyses of the same contract agree.
pub mod mock;
pub mod ollama;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub trait Completer: Send + Sync {
    /// Send a single prompt and return the raw completion text.
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model identifier, for logs and reports.
    fn model(&self) -> &str;
}
