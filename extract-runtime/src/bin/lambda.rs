//! Lambda trigger binary: an hourly EventBridge rule invokes this with no
//! payload worth reading (`spec.md` §1 — "triggered on a fixed schedule").
//! `service_fn` is `lambda_runtime`'s own wrapper shape; there is no
//! always-on server loop here because there is nothing to loop over
//! between invocations.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use extract_config::ConfigLoader;
use extract_core::telemetry::TracingTelemetry;
use extract_runtime::{run_once, RunContext};
use extract_sink::s3::S3Sink;
use extract_source::dynamodb::DynamoDbSource;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value as Json;
use tracing::info;

/// Lambda reserves the final seconds of its own timeout for runtime
/// teardown; this margin additionally protects the last in-flight upload
/// from being killed mid-write (`spec.md` §4.5).
const DEADLINE_SAFETY_MARGIN: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Error> {
    extract_runtime::logging::init();
    lambda_runtime::run(service_fn(handler)).await
}

async fn handler(event: LambdaEvent<Json>) -> Result<Json, Error> {
    let config = ConfigLoader::new().load()?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let source = Arc::new(DynamoDbSource::new(
        DynamoDbClient::new(&aws_config),
        config.source.table.clone(),
    ));
    let sink = Arc::new(S3Sink::new(S3Client::new(&aws_config)));
    let ctx = RunContext::new(config, source, sink, Arc::new(TracingTelemetry));

    // `Context::deadline` is an absolute Unix-epoch millisecond timestamp,
    // not a duration, so it has to be converted relative to wall-clock now
    // before it can be placed on the `Instant` timeline `run_once` uses.
    let now_epoch_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let remaining = Duration::from_millis(event.context.deadline.saturating_sub(now_epoch_ms));
    let deadline = Instant::now() + remaining.saturating_sub(DEADLINE_SAFETY_MARGIN);

    let summary = run_once(&ctx, deadline).await;
    info!(
        events_scanned = summary.events_scanned,
        objects_written = summary.objects_written,
        partial = summary.partial,
        "run complete"
    );

    Ok(serde_json::json!({
        "events_scanned": summary.events_scanned,
        "events_in_window": summary.events_in_window,
        "objects_written": summary.objects_written,
        "objects_failed": summary.objects_failed,
        "partial": summary.partial,
    }))
}
