//! Error taxonomy for the radar pipeline.
//!
//! Per-source and per-record failures never escape the pipeline: they are
//! converted into [`SourceError`] diagnostics by the orchestrator. Only
//! [`PipelineError`] (configuration-level problems) is returned to callers.

use std::time::Duration;
use thiserror::Error;

/// HTTP statuses for which a feed source may retry once against its fallback URL.
pub const FALLBACK_RETRY_STATUSES: [u16; 4] = [401, 403, 404, 429];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("invalid url `{url}`")]
    InvalidUrl { url: String },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the failure is one of the statuses that justify a fallback-URL retry.
    pub fn is_retryable_for_fallback(&self) -> bool {
        self.status()
            .is_some_and(|s| FALLBACK_RETRY_STATUSES.contains(&s))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed feed: {0}")]
    Feed(String),
    #[error("document is neither RSS nor Atom (root `{0}`)")]
    UnknownFeedFormat(String),
    #[error("invalid selector `{0}`")]
    Selector(String),
    #[error("no title or body found in {0}")]
    EmptyDocument(String),
}

/// What the orchestrator records for a failed source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("source exceeded its {budget:?} budget")]
    Timeout { budget: Duration },
    #[error("source task aborted: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("no sources configured")]
    NoSources,
    #[error("top-k must be a positive integer")]
    InvalidTopK,
    #[error("source `{name}` is invalid: {reason}")]
    InvalidSource { name: String, reason: String },
    #[error("duplicate source name `{0}`")]
    DuplicateSource(String),
}
