//! Structured logging init, shared by the CLI and Lambda entry points.
//!
//! Grounded on `ferrex-server::main`'s `tracing_subscriber::registry()` +
//! `EnvFilter` + `fmt::layer()` setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "extract_runtime=info,extract_source=info,extract_sink=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
