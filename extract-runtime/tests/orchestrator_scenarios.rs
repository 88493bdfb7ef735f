//! Orchestrator integration tests against in-memory `SourceStore`/`SinkStore`
//! fakes, covering the concrete end-to-end scenarios the component design
//! calls out: a throttle-then-success retry, a missing bucket for one of
//! several clients, deadline pressure mid-upload, and a malformed event
//! mixed in with valid ones.
//!
//! The window is always derived from the real clock (`run_once` computes it
//! from `Utc::now()`), so every event timestamp here is built relative to
//! that window rather than hardcoded, matching how the orchestrator's own
//! inline tests do it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use extract_config::{Config, PerformanceConfig, ProcessingConfig, SinkConfig, SourceConfig};
use extract_core::error::{SinkError, SourceError};
use extract_core::model::{OutputFormat, Window};
use extract_core::telemetry::NoopTelemetry;
use extract_runtime::{run_once, RunContext};
use extract_sink::{PutOptions, SinkStore};
use extract_source::{ScanPage, SegmentRequest, SourceStore};
use serde_json::json;

fn base_config(bucket_prefix: &str, max_concurrent_uploads: usize) -> Config {
    Config {
        source: SourceConfig {
            table: "events".into(),
            parallel_segments: 1,
            read_throughput_fraction: 1.0,
            scan_batch_size: 100,
        },
        sink: SinkConfig {
            bucket_prefix: bucket_prefix.into(),
            output_format: OutputFormat::Json,
            server_side_encryption: "AES256".into(),
        },
        processing: ProcessingConfig {
            window_hours: 1,
            max_retries: 3,
            retry_base_delay_ms: 1,
        },
        performance: PerformanceConfig {
            max_concurrent_uploads,
            partition_high_water_mark_bytes: None,
        },
    }
}

/// The window the orchestrator will compute for "now", and a timestamp five
/// minutes into it, for building in-window fixture events.
fn current_window() -> (Window, String) {
    let window = Window::for_invocation(Utc::now(), 1);
    let in_window = (window.start + chrono::Duration::minutes(5)).to_rfc3339();
    (window, in_window)
}

/// A source whose single segment replays a scripted sequence of page
/// results, one per call, in order.
struct ScriptedSource {
    pages: Mutex<std::vec::IntoIter<Result<ScanPage, SourceError>>>,
}

impl ScriptedSource {
    fn new(pages: Vec<Result<ScanPage, SourceError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into_iter()),
        }
    }
}

#[async_trait]
impl SourceStore for ScriptedSource {
    async fn scan_segment(&self, _request: SegmentRequest) -> Result<ScanPage, SourceError> {
        self.pages
            .lock()
            .unwrap()
            .next()
            .unwrap_or(Ok(ScanPage::default()))
    }
}

fn page(records: Vec<serde_json::Value>) -> ScanPage {
    ScanPage {
        records,
        next_token: None,
        consumed_capacity_units: Some(1.0),
    }
}

/// A sink whose bucket existence is configured per bucket, recording every
/// successful put for assertions.
struct ScriptedSink {
    existing_buckets: Vec<String>,
    puts: Mutex<Vec<(String, String)>>,
    put_bodies: Mutex<HashMap<String, Vec<u8>>>,
}

impl ScriptedSink {
    fn new(existing_buckets: Vec<&str>) -> Self {
        Self {
            existing_buckets: existing_buckets.into_iter().map(String::from).collect(),
            puts: Mutex::new(Vec::new()),
            put_bodies: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SinkStore for ScriptedSink {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, SinkError> {
        Ok(self.existing_buckets.iter().any(|b| b == bucket))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        _put: PutOptions,
    ) -> Result<(), SinkError> {
        self.puts
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        self.put_bodies
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{key}"), body.to_vec());
        Ok(())
    }
}

fn far_future_deadline() -> Instant {
    Instant::now() + Duration::from_secs(60)
}

#[tokio::test]
async fn single_client_single_event_lands_at_the_derived_bucket_and_key_with_no_chunk_suffix() {
    let (window, in_window_time) = current_window();
    let expected_key = format!("events-{}.json", window.key_fragment());

    let source = Arc::new(ScriptedSource::new(vec![Ok(page(vec![json!({
        "event_id": "e1",
        "client_id": "acme",
        "time": in_window_time,
    })]))]));
    let sink = Arc::new(ScriptedSink::new(vec!["events-acme"]));

    let ctx = RunContext::new(
        base_config("events", 4),
        source,
        sink.clone(),
        Arc::new(NoopTelemetry),
    );
    let summary = run_once(&ctx, far_future_deadline()).await;

    assert_eq!(summary.objects_written, 1);
    assert!(!summary.partial);
    let puts = sink.puts.lock().unwrap();
    assert_eq!(puts[0], ("events-acme".to_string(), expected_key.clone()));
    let body = sink
        .put_bodies
        .lock()
        .unwrap()
        .get(&format!("events-acme/{expected_key}"))
        .cloned()
        .unwrap();
    let decoded: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(decoded[0]["event_id"], "e1");
}

#[tokio::test]
async fn throttle_then_success_retries_transparently() {
    let (_, in_window_time) = current_window();
    let calls = Arc::new(AtomicU32::new(0));

    struct ThrottleOnceSource {
        calls: Arc<AtomicU32>,
        time: String,
    }
    #[async_trait]
    impl SourceStore for ThrottleOnceSource {
        async fn scan_segment(&self, _request: SegmentRequest) -> Result<ScanPage, SourceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SourceError::Throttled)
            } else {
                Ok(page(vec![json!({
                    "event_id": "e1",
                    "client_id": "acme",
                    "time": self.time,
                })]))
            }
        }
    }

    let source = Arc::new(ThrottleOnceSource {
        calls: Arc::clone(&calls),
        time: in_window_time,
    });
    let sink = Arc::new(ScriptedSink::new(vec!["events-acme"]));
    let mut config = base_config("events", 4);
    config.processing.retry_base_delay_ms = 1;
    let ctx = RunContext::new(config, source, sink.clone(), Arc::new(NoopTelemetry));

    let summary = run_once(&ctx, far_future_deadline()).await;

    assert!(!summary.partial);
    assert_eq!(summary.objects_written, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_bucket_for_one_client_is_recorded_without_failing_the_others() {
    let (_, in_window_time) = current_window();
    let source = Arc::new(ScriptedSource::new(vec![Ok(page(vec![
        json!({"event_id": "1", "client_id": "a", "time": in_window_time.clone()}),
        json!({"event_id": "2", "client_id": "b", "time": in_window_time}),
    ]))]));
    // Only "events-a" exists; "events-b" is missing.
    let sink = Arc::new(ScriptedSink::new(vec!["events-a"]));
    let ctx = RunContext::new(
        base_config("events", 4),
        source,
        sink.clone(),
        Arc::new(NoopTelemetry),
    );

    let summary = run_once(&ctx, far_future_deadline()).await;

    assert!(summary.partial);
    assert_eq!(summary.objects_written, 1);
    assert_eq!(summary.objects_failed, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].client_id, "b");
    assert!(summary.failures[0]
        .error
        .as_ref()
        .unwrap()
        .contains("does not exist"));
}

#[tokio::test]
async fn malformed_event_is_rejected_and_counted_while_valid_events_still_land() {
    let (_, in_window_time) = current_window();
    let source = Arc::new(ScriptedSource::new(vec![Ok(page(vec![
        json!({"event_id": "1", "client_id": "a", "time": in_window_time.clone()}),
        json!({"event_id": "2", "client_id": "a"}), // missing time: rejected
        json!({"event_id": "3", "client_id": "a", "time": in_window_time}),
    ]))]));
    let sink = Arc::new(ScriptedSink::new(vec!["events-a"]));
    let ctx = RunContext::new(
        base_config("events", 4),
        source,
        sink.clone(),
        Arc::new(NoopTelemetry),
    );

    let summary = run_once(&ctx, far_future_deadline()).await;

    assert!(!summary.partial);
    assert_eq!(summary.events_rejected, 1);
    assert_eq!(summary.events_in_window, 2);
    assert_eq!(summary.objects_written, 1);
}

#[tokio::test]
async fn deadline_pressure_yields_a_partial_run_accounting_for_every_client() {
    /// A sink that takes a small, deliberate amount of time per upload so a
    /// short deadline can fall in the middle of the run deterministically.
    struct SlowSink {
        delay: Duration,
    }
    #[async_trait]
    impl SinkStore for SlowSink {
        async fn bucket_exists(&self, _bucket: &str) -> Result<bool, SinkError> {
            Ok(true)
        }
        async fn put_object(
            &self,
            _bucket: &str,
            _key: &str,
            _body: Bytes,
            _put: PutOptions,
        ) -> Result<(), SinkError> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    let (_, in_window_time) = current_window();
    let records: Vec<serde_json::Value> = (0..10)
        .map(|i| {
            json!({
                "event_id": format!("e{i}"),
                "client_id": format!("client-{i}"),
                "time": in_window_time,
            })
        })
        .collect();
    let source = Arc::new(ScriptedSource::new(vec![Ok(page(records))]));
    let sink = Arc::new(SlowSink {
        delay: Duration::from_millis(40),
    });
    let mut config = base_config("events", 5);
    config.processing.max_retries = 0;
    let ctx = RunContext::new(config, source, sink, Arc::new(NoopTelemetry));

    // Fires well before all 10 uploads (each taking ~40ms, 5 at a time ==
    // two waves) can complete, but after the run has started.
    let deadline = Instant::now() + Duration::from_millis(50);
    let summary = run_once(&ctx, deadline).await;

    assert!(summary.partial);
    assert_eq!(summary.objects_written + summary.objects_failed, 10);
    assert!(summary.objects_written >= 1, "the first wave should get through");
    assert!(summary.objects_written < 10, "the deadline should cut off later clients");
}
