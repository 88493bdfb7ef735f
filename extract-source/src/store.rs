//! The source store contract (`spec.md` §6): a partitioned key-value store
//! supporting parallel segmented scan with cursor-based pagination and
//! per-response consumed-capacity reporting.

use async_trait::async_trait;
use serde_json::Value as Json;

use extract_core::error::SourceError;

/// One page request against one segment of the keyspace.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    pub segment_index: u32,
    pub total_segments: u32,
    pub continuation_token: Option<String>,
    pub limit: u32,
}

/// One page response: the raw records (untyped JSON, passed through
/// verbatim to [`extract_core::model::Event::from_raw`]), an opaque
/// continuation token if more pages remain, and the capacity this request
/// consumed, if the store reports it.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub records: Vec<Json>,
    pub next_token: Option<String>,
    pub consumed_capacity_units: Option<f64>,
}

/// A partitioned key-value store the Reader can scan in disjoint segments.
/// Implemented by [`crate::dynamodb::DynamoDbSource`] for production use and
/// by an in-memory fake in tests.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn scan_segment(&self, request: SegmentRequest) -> Result<ScanPage, SourceError>;

    /// The store's provisioned read rate (capacity units per second), if
    /// known. `None` means the Reader must pace itself best-effort only
    /// (`spec.md` §4.1).
    fn provisioned_read_capacity(&self) -> Option<f64> {
        None
    }
}
