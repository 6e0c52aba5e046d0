//! Error taxonomy for the question-answering pipeline.
//!
//! Each variant is a distinct, externally visible signal so that callers
//! (the CLI, the HTTP layer) can decide whether to retry. Index cache
//! problems never appear here: a missing, corrupt or stale cache is
//! rebuilt in place. An empty retrieval result is not an error either; it
//! is reported as a `fail` answer.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("corpus snapshot not found: {}", .0.display())]
    CorpusNotFound(PathBuf),

    #[error("corpus snapshot is malformed: {0}")]
    CorpusInvalid(String),

    #[error("generation backend is busy, try again later")]
    GatewayBusy,

    #[error("generation timed out after {}s", .0.as_secs())]
    GenerationTimeout(Duration),

    #[error("generation backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RagError {
    /// Machine-readable code used in HTTP error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::CorpusNotFound(_) => "corpus_not_found",
            RagError::CorpusInvalid(_) => "corpus_invalid",
            RagError::GatewayBusy => "gateway_busy",
            RagError::GenerationTimeout(_) => "generation_timeout",
            RagError::Backend(_) => "backend_error",
            RagError::Internal(_) => "internal",
        }
    }

    /// Transient conditions a client may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::GatewayBusy | RagError::GenerationTimeout(_))
    }
}
