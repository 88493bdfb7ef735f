//! Environment-variable overlay. Gathered once at load time and composed
//! over the file config by [`crate::loader::ConfigLoader`] — env wins,
//! matching `ferrex-server`'s env-over-file precedence.

use std::env;

use crate::raw::FileConfig;

/// The subset of options that may also be set via environment variables.
/// Unlike [`FileConfig`], there is nothing to deserialize: each field is
/// parsed individually so one malformed variable doesn't blank out the
/// rest.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub table: Option<String>,
    pub parallel_segments: Option<u32>,
    pub read_throughput_fraction: Option<f64>,
    pub scan_batch_size: Option<u32>,
    pub bucket_prefix: Option<String>,
    pub output_format: Option<String>,
    pub server_side_encryption: Option<String>,
    pub window_hours: Option<u32>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub max_concurrent_uploads: Option<usize>,
    pub partition_high_water_mark_bytes: Option<usize>,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    var(name).and_then(|v| v.parse().ok())
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            table: var("EXTRACT_SOURCE_TABLE"),
            parallel_segments: parsed("EXTRACT_SOURCE_PARALLEL_SEGMENTS"),
            read_throughput_fraction: parsed("EXTRACT_SOURCE_READ_THROUGHPUT_FRACTION"),
            scan_batch_size: parsed("EXTRACT_SOURCE_SCAN_BATCH_SIZE"),
            bucket_prefix: var("EXTRACT_SINK_BUCKET_PREFIX"),
            output_format: var("EXTRACT_SINK_OUTPUT_FORMAT"),
            server_side_encryption: var("EXTRACT_SINK_SERVER_SIDE_ENCRYPTION"),
            window_hours: parsed("EXTRACT_PROCESSING_WINDOW_HOURS"),
            max_retries: parsed("EXTRACT_PROCESSING_MAX_RETRIES"),
            retry_base_delay_ms: parsed("EXTRACT_PROCESSING_RETRY_BASE_DELAY_MS"),
            max_concurrent_uploads: parsed("EXTRACT_PERFORMANCE_MAX_CONCURRENT_UPLOADS"),
            partition_high_water_mark_bytes: parsed(
                "EXTRACT_PERFORMANCE_PARTITION_HIGH_WATER_MARK_BYTES",
            ),
        }
    }

    /// Applies this overlay on top of a file-sourced config; any field set
    /// here wins.
    pub fn overlay(self, mut file: FileConfig) -> FileConfig {
        if self.table.is_some() {
            file.source.table = self.table;
        }
        if self.parallel_segments.is_some() {
            file.source.parallel_segments = self.parallel_segments;
        }
        if self.read_throughput_fraction.is_some() {
            file.source.read_throughput_fraction = self.read_throughput_fraction;
        }
        if self.scan_batch_size.is_some() {
            file.source.scan_batch_size = self.scan_batch_size;
        }
        if self.bucket_prefix.is_some() {
            file.sink.bucket_prefix = self.bucket_prefix;
        }
        if self.output_format.is_some() {
            file.sink.output_format = self.output_format;
        }
        if self.server_side_encryption.is_some() {
            file.sink.server_side_encryption = self.server_side_encryption;
        }
        if self.window_hours.is_some() {
            file.processing.window_hours = self.window_hours;
        }
        if self.max_retries.is_some() {
            file.processing.max_retries = self.max_retries;
        }
        if self.retry_base_delay_ms.is_some() {
            file.processing.retry_base_delay_ms = self.retry_base_delay_ms;
        }
        if self.max_concurrent_uploads.is_some() {
            file.performance.max_concurrent_uploads = self.max_concurrent_uploads;
        }
        if self.partition_high_water_mark_bytes.is_some() {
            file.performance.partition_high_water_mark_bytes =
                self.partition_high_water_mark_bytes;
        }
        file
    }
}
