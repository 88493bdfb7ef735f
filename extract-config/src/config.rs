//! The validated, immutable settings object. Once constructed by
//! [`crate::loader::ConfigLoader`], a `Config` is freely shared (by `Arc`)
//! across the Reader pool, Writer pool, and Orchestrator for the lifetime
//! of one invocation — it is never mutated.

use std::str::FromStr;
use std::time::Duration;

use extract_core::error::ConfigError;
use extract_core::model::OutputFormat;
use extract_core::retry::BackoffPolicy;

use crate::env::EnvConfig;
use crate::raw::FileConfig;

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub table: String,
    pub parallel_segments: u32,
    pub read_throughput_fraction: f64,
    pub scan_batch_size: u32,
}

#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub bucket_prefix: String,
    pub output_format: OutputFormat,
    pub server_side_encryption: String,
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub window_hours: u32,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl ProcessingConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.retry_base_delay_ms),
            self.max_retries,
        )
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    pub max_concurrent_uploads: usize,
    pub partition_high_water_mark_bytes: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    pub processing: ProcessingConfig,
    pub performance: PerformanceConfig,
}

impl Config {
    /// Composes a file config overlaid with environment variables into a
    /// validated `Config`, or fails fast naming the first offending option.
    pub fn compose(file: FileConfig, env: EnvConfig) -> Result<Self, ConfigError> {
        let file = env.overlay(file);

        let table = non_empty(file.source.table, "source.table")?;

        let parallel_segments = file.source.parallel_segments.unwrap_or(8);
        if parallel_segments == 0 {
            return Err(ConfigError::Invalid {
                field: "source.parallel_segments",
                reason: "must be a positive integer".into(),
            });
        }

        let read_throughput_fraction = file.source.read_throughput_fraction.unwrap_or(0.5);
        if !(read_throughput_fraction > 0.0 && read_throughput_fraction <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "source.read_throughput_fraction",
                reason: "must be in (0.0, 1.0]".into(),
            });
        }

        let scan_batch_size = file.source.scan_batch_size.unwrap_or(1000);
        if scan_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "source.scan_batch_size",
                reason: "must be a positive integer".into(),
            });
        }

        let bucket_prefix = non_empty(file.sink.bucket_prefix, "sink.bucket_prefix")?;

        let output_format_raw = file.sink.output_format.unwrap_or_else(|| "json".to_string());
        let output_format = OutputFormat::from_str(&output_format_raw).map_err(|reason| {
            ConfigError::Invalid {
                field: "sink.output_format",
                reason,
            }
        })?;

        let server_side_encryption = file
            .sink
            .server_side_encryption
            .unwrap_or_else(|| "AES256".to_string());

        let window_hours = file.processing.window_hours.unwrap_or(1);
        if window_hours == 0 {
            return Err(ConfigError::Invalid {
                field: "processing.window_hours",
                reason: "must be >= 1".into(),
            });
        }

        let max_retries = file.processing.max_retries.unwrap_or(3);
        let retry_base_delay_ms = file.processing.retry_base_delay_ms.unwrap_or(1000);

        let max_concurrent_uploads = file.performance.max_concurrent_uploads.unwrap_or(5);
        if max_concurrent_uploads == 0 {
            return Err(ConfigError::Invalid {
                field: "performance.max_concurrent_uploads",
                reason: "must be a positive integer".into(),
            });
        }

        Ok(Config {
            source: SourceConfig {
                table,
                parallel_segments,
                read_throughput_fraction,
                scan_batch_size,
            },
            sink: SinkConfig {
                bucket_prefix,
                output_format,
                server_side_encryption,
            },
            processing: ProcessingConfig {
                window_hours,
                max_retries,
                retry_base_delay_ms,
            },
            performance: PerformanceConfig {
                max_concurrent_uploads,
                partition_high_water_mark_bytes: file.performance.partition_high_water_mark_bytes,
            },
        })
    }
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(ConfigError::Invalid {
            field,
            reason: "must not be empty".into(),
        }),
        None => Err(ConfigError::Missing(field)),
    }
}
