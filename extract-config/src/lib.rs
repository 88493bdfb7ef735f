//! Typed, validated settings loaded once per invocation (C1).
//!
//! Three layers, composed in [`loader::ConfigLoader::load`]:
//! [`raw::FileConfig`] (everything optional, TOML-deserializable),
//! overlaid by [`env::EnvConfig`] (environment variables win), validated
//! into an immutable [`config::Config`]. Validation fails fast with a
//! [`loader::ConfigLoadError`] naming the offending option and reason —
//! never a panic.

mod config;
mod env;
mod loader;
mod raw;

pub use config::{Config, PerformanceConfig, ProcessingConfig, SinkConfig, SourceConfig};
pub use env::EnvConfig;
pub use loader::{ConfigLoadError, ConfigLoader};
pub use raw::FileConfig;
