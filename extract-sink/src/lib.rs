//! The Sink Writer (C4): uploads each client's serialized chunk to an
//! object store.
//!
//! [`SinkStore`] is the contract a concrete backend implements (the default
//! is [`s3::S3Sink`]); [`writer::run_writer`] is the backend-agnostic
//! worker pool that drives it.

pub mod naming;
pub mod s3;
pub mod store;
pub mod writer;

pub use store::{PutOptions, SinkStore};
pub use writer::{run_writer, WriteJob, WriteOutcome, WriterConfig};
