//! The Orchestrator (C5): wires the Reader, Partitioner, and Writer
//! together for one invocation and aggregates their results into one
//! [`RunSummary`] (`spec.md` §4.5).
//!
//! Grounded on the teacher's `main.rs`/server startup wiring: build one
//! context struct of shared handles up front, hand it to the workers by
//! reference, no global statics.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use extract_core::cancel::CancelToken;
use extract_core::model::{Event, OutputFormat, RunSummary, Window};
use extract_core::partition::Partitioner;
use extract_source::{run_reader, ReaderConfig, ReaderCounters};
use extract_sink::{run_writer, WriteJob, WriterConfig};
use tokio::sync::mpsc;
use tracing::warn;

use crate::context::RunContext;

const EVENT_CHANNEL_CAPACITY: usize = 4096;
const WRITE_CHANNEL_CAPACITY: usize = 256;

/// Runs one complete extraction: computes the window, drains the Reader
/// through the Partitioner into the Writer, and returns a [`RunSummary`]
/// whether or not every client succeeded. `deadline` is the point past
/// which in-flight work should wind down; callers are expected to have
/// already subtracted their own safety margin (`spec.md` §4.5).
pub async fn run_once(ctx: &RunContext, deadline: Instant) -> RunSummary {
    let start = Instant::now();
    let window = Window::for_invocation(Utc::now(), ctx.config.processing.window_hours);

    let cancel = CancelToken::new();
    let deadline_guard = spawn_deadline_guard(deadline, cancel.clone());

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (write_tx, write_rx) = mpsc::channel(WRITE_CHANNEL_CAPACITY);

    let reader_counters = Arc::new(ReaderCounters::default());
    let reader_config = ReaderConfig {
        parallel_segments: ctx.config.source.parallel_segments,
        scan_batch_size: ctx.config.source.scan_batch_size,
        read_throughput_fraction: ctx.config.source.read_throughput_fraction,
        backoff: ctx.config.processing.backoff_policy(),
    };

    let reader_handle = tokio::spawn(run_reader(
        Arc::clone(&ctx.source),
        window,
        reader_config,
        event_tx,
        cancel.clone(),
        Arc::clone(&reader_counters),
    ));

    let partition_handle = tokio::spawn(run_partitioner(
        event_rx,
        write_tx,
        ctx.config.sink.output_format,
        ctx.config.performance.partition_high_water_mark_bytes,
    ));

    let writer_config = WriterConfig {
        bucket_prefix: ctx.config.sink.bucket_prefix.clone(),
        server_side_encryption: Some(ctx.config.sink.server_side_encryption.clone()),
        max_concurrent_uploads: ctx.config.performance.max_concurrent_uploads,
        backoff: ctx.config.processing.backoff_policy(),
    };

    let write_outcome = run_writer(
        Arc::clone(&ctx.sink),
        window,
        ctx.config.sink.output_format,
        write_rx,
        writer_config,
        cancel.clone(),
    )
    .await;

    let read_outcome = reader_handle.await.unwrap_or_else(|join_err| {
        warn!(error = %join_err, "reader pool task panicked");
        extract_source::ReadOutcome { partial: true }
    });

    let partition_outcome = partition_handle.await.unwrap_or_else(|join_err| {
        warn!(error = %join_err, "partitioner task panicked");
        PartitionOutcome {
            per_client_counts: HashMap::new(),
            had_errors: true,
        }
    });

    deadline_guard.abort();

    let mut summary = RunSummary {
        events_scanned: reader_counters.scanned.load(Ordering::Relaxed),
        events_in_window: reader_counters.in_window.load(Ordering::Relaxed),
        events_rejected: reader_counters.rejected.load(Ordering::Relaxed),
        per_client_counts: partition_outcome.per_client_counts,
        objects_written: write_outcome.objects_written,
        bytes_written: write_outcome.bytes_written,
        duration_ms: start.elapsed().as_millis() as u64,
        partial: read_outcome.partial || partition_outcome.had_errors,
        ..Default::default()
    };

    for failure in write_outcome.failures {
        summary.record_failure(failure);
    }

    ctx.telemetry.record(&summary);
    summary
}

fn spawn_deadline_guard(deadline: Instant, cancel: CancelToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(remaining).await;
        cancel.cancel();
    })
}

struct PartitionOutcome {
    per_client_counts: HashMap<String, u64>,
    had_errors: bool,
}

/// Owns the single [`Partitioner`] instance for this run (`spec.md` §5:
/// "single-owner, no internal concurrency"), forwarding early-evicted
/// chunks to the Writer as they happen and the remainder at `finalize`.
async fn run_partitioner(
    mut events: mpsc::Receiver<Event>,
    writes: mpsc::Sender<WriteJob>,
    format: OutputFormat,
    high_water_mark: Option<usize>,
) -> PartitionOutcome {
    let mut partitioner = Partitioner::new(format, high_water_mark);
    let mut per_client_counts = HashMap::new();
    let mut had_errors = false;

    while let Some(event) = events.recv().await {
        *per_client_counts.entry(event.client_id.clone()).or_insert(0u64) += 1;
        match partitioner.admit(event) {
            Ok(Some(chunk)) => {
                if writes.send(WriteJob::from(chunk)).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "failed to serialize an evicted chunk");
                had_errors = true;
            }
        }
    }

    match partitioner.finalize() {
        Ok(buffers) => {
            for buffer in buffers {
                if writes.send(WriteJob::from(buffer)).await.is_err() {
                    break;
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "failed to serialize a client's final buffer");
            had_errors = true;
        }
    }

    PartitionOutcome {
        per_client_counts,
        had_errors,
    }
}
