//! Data model, error taxonomy, retry policy, and in-memory partitioning for
//! the hourly event extractor.
//!
//! This crate has no I/O of its own: it is the part of the pipeline that is
//! pure enough to unit test without a network. `extract-source` and
//! `extract-sink` depend on it for the shared [`error`] and [`retry`] types;
//! `extract-runtime` depends on it for everything else.

pub mod cancel;
pub mod error;
pub mod model;
pub mod partition;
pub mod retry;
pub mod telemetry;

pub use cancel::CancelToken;
pub use error::{ConfigError, EventError, PipelineError, SinkError, SourceError};
pub use model::{Event, OutputFormat, OutputObject, RunSummary, Window};
pub use partition::{EvictedChunk, FinalizedBuffer, Partitioner};
pub use retry::BackoffPolicy;
pub use telemetry::{NoopTelemetry, Telemetry, TracingTelemetry};
