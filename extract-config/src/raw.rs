//! The raw, partially-specified configuration document as read from TOML.
//! Every field is optional/defaulted here; [`crate::loader::ConfigLoader`]
//! is the only place defaults are applied and required fields enforced.

use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub source: FileSourceConfig,
    #[serde(default)]
    pub sink: FileSinkConfig,
    #[serde(default)]
    pub processing: FileProcessingConfig,
    #[serde(default)]
    pub performance: FilePerformanceConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileSourceConfig {
    pub table: Option<String>,
    pub parallel_segments: Option<u32>,
    pub read_throughput_fraction: Option<f64>,
    pub scan_batch_size: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileSinkConfig {
    pub bucket_prefix: Option<String>,
    pub output_format: Option<String>,
    pub server_side_encryption: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileProcessingConfig {
    pub window_hours: Option<u32>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FilePerformanceConfig {
    pub max_concurrent_uploads: Option<usize>,
    /// Aggregate buffered byte ceiling for the Partitioner's bounded mode.
    /// Unset means unbounded (`spec.md` §4.3: "Default behavior (unbounded)
    /// is acceptable when the environment's memory budget exceeds the
    /// expected working-set size").
    pub partition_high_water_mark_bytes: Option<usize>,
}
