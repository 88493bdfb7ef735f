//! The error taxonomy from the component design: one `thiserror` enum per
//! scope (event, source request/segment, sink upload/client, config,
//! pipeline-wide), matching the policy table 1:1 so the kind-to-policy
//! mapping is a match arm, not prose.

use thiserror::Error;

/// Rejected on admission; counted, never fatal to the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("client_id missing or empty")]
    MissingClientId,
    #[error("time field missing")]
    MissingTime,
    #[error("time '{0}' could not be parsed as RFC 3339: {1}")]
    UnparseableTime(String, String),
}

/// Errors surfaced by a [`extract-source`](../../extract_source/index.html)
/// segment worker.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source throttled the request")]
    Throttled,
    #[error("transient source error: {0}")]
    Transient(String),
    #[error("segment {segment} fatal: {reason}")]
    Fatal { segment: u32, reason: String },
}

impl SourceError {
    /// Per §7: `SourceThrottled` and `SourceTransient` retry with backoff;
    /// everything else is fatal for that segment.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Throttled | SourceError::Transient(_))
    }
}

/// Errors surfaced by an `extract-sink` upload attempt.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink throttled the request")]
    Throttled,
    #[error("transient sink error: {0}")]
    Transient(String),
    #[error("bucket '{0}' does not exist")]
    BucketMissing(String),
    #[error("non-retryable sink error: {0}")]
    Fatal(String),
}

impl SinkError {
    /// Per §7: `SinkThrottled` and `SinkTransient` retry with backoff;
    /// `BucketMissing` and `SinkFatal` mark the client failed and move on.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Throttled | SinkError::Transient(_))
    }
}

/// Configuration validation failures. Always fatal, always pre-run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required option '{0}'")]
    Missing(&'static str),
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Run-wide failures that abort the invocation before any segment
/// completes. Everything else is recovered locally and surfaced through
/// [`crate::model::RunSummary`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("serialization failed: {0}")]
    Serialize(String),
    #[error("deadline exceeded before any work completed")]
    DeadlineExceeded,
}
