//! Local CLI entry point: one invocation, deadline taken from
//! `EXTRACT_DEADLINE_SECONDS` (default 900s) minus a 30s safety margin
//! (`spec.md` §4.5). The invocation payload itself is opaque and ignored —
//! a run always means "extract the most recently closed window."

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use extract_config::ConfigLoader;
use extract_core::telemetry::TracingTelemetry;
use extract_runtime::{run_once, RunContext};
use extract_sink::s3::S3Sink;
use extract_source::dynamodb::DynamoDbSource;
use tracing::info;

const DEFAULT_DEADLINE_SECONDS: u64 = 900;
const DEADLINE_SAFETY_MARGIN: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    extract_runtime::logging::init();

    let config = ConfigLoader::new()
        .load()
        .context("failed to load configuration")?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let source = Arc::new(DynamoDbSource::new(
        DynamoDbClient::new(&aws_config),
        config.source.table.clone(),
    ));
    let sink = Arc::new(S3Sink::new(S3Client::new(&aws_config)));

    let ctx = RunContext::new(config, source, sink, Arc::new(TracingTelemetry));

    let budget_secs = std::env::var("EXTRACT_DEADLINE_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_DEADLINE_SECONDS);
    let deadline = Instant::now() + Duration::from_secs(budget_secs).saturating_sub(DEADLINE_SAFETY_MARGIN);

    let summary = run_once(&ctx, deadline).await;
    info!(
        events_scanned = summary.events_scanned,
        objects_written = summary.objects_written,
        partial = summary.partial,
        "run complete"
    );

    // Non-zero exit is reserved for the Orchestrator never having run at
    // all (e.g. the config load failing above); partial progress is still
    // a successful invocation (`spec.md` §6).
    Ok(())
}
