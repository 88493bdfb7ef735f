//! The Source Reader (C2): a partitioned parallel scan of the event store
//! within a [`extract_core::model::Window`].
//!
//! [`SourceStore`] is the contract a concrete backend implements (the
//! default is [`dynamodb::DynamoDbSource`]); [`reader::run_reader`] is the
//! backend-agnostic worker pool that drives it, grounded on
//! `ferrex-server::media::scan::scan_manager::ScanManager`'s
//! spawn-per-unit-of-work-with-progress-channel shape.

pub mod cancel;
pub mod dynamodb;
pub mod pacing;
pub mod reader;
pub mod store;

pub use cancel::CancelToken;
pub use pacing::CapacityPacer;
pub use reader::{run_reader, ReadOutcome, ReaderConfig, ReaderCounters};
pub use store::{ScanPage, SegmentRequest, SourceStore};
