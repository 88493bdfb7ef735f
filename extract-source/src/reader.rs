//! The Reader pool: N worker tasks, one per scan segment, publishing
//! in-window events to a bounded channel that backpressures against the
//! Partitioner's consumption rate (`spec.md` §5).
//!
//! Grounded on `ferrex-server::media::scan::scan_manager::ScanManager`:
//! one `tokio::spawn` per unit of concurrent work, shared atomic progress
//! counters, a single cancellation signal checked once per round-trip.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use extract_core::model::{Event, Window};
use extract_core::retry::{run_with_retry, BackoffPolicy};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::pacing::CapacityPacer;
use crate::store::{SegmentRequest, SourceStore};

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub parallel_segments: u32,
    pub scan_batch_size: u32,
    pub read_throughput_fraction: f64,
    pub backoff: BackoffPolicy,
}

/// Live counters updated by every segment worker; read by the Orchestrator
/// after [`run_reader`] completes (or, for a deadline-driven partial
/// summary, at any point while it runs).
#[derive(Debug, Default)]
pub struct ReaderCounters {
    pub scanned: AtomicU64,
    pub in_window: AtomicU64,
    pub rejected: AtomicU64,
}

/// The result of running the full Reader pool to completion.
#[derive(Debug, Default, Clone)]
pub struct ReadOutcome {
    /// True if any segment failed fatally; other segments' output is still
    /// delivered (`spec.md` §4.2: "partial-result mode").
    pub partial: bool,
}

/// Runs one worker per segment concurrently, publishing validated in-window
/// [`Event`]s to `tx`. Returns once every segment has either exhausted its
/// pages, hit a fatal error, or observed `cancel`.
pub async fn run_reader<S>(
    store: Arc<S>,
    window: Window,
    config: ReaderConfig,
    tx: mpsc::Sender<Event>,
    cancel: CancelToken,
    counters: Arc<ReaderCounters>,
) -> ReadOutcome
where
    S: SourceStore + 'static,
{
    let pacer = Arc::new(CapacityPacer::new(store.provisioned_read_capacity()));
    let mut handles = Vec::with_capacity(config.parallel_segments as usize);

    for segment_index in 0..config.parallel_segments {
        let store = Arc::clone(&store);
        let pacer = Arc::clone(&pacer);
        let tx = tx.clone();
        let cancel = cancel.clone();
        let counters = Arc::clone(&counters);
        let config = config.clone();
        let window = window;

        handles.push(tokio::spawn(async move {
            run_segment(
                store.as_ref(),
                segment_index,
                config.parallel_segments,
                window,
                &config,
                pacer.as_ref(),
                &tx,
                &cancel,
                counters.as_ref(),
            )
            .await
        }));
    }

    let mut partial = false;
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(error = %err, "segment failed fatally");
                partial = true;
            }
            Err(join_err) => {
                warn!(error = %join_err, "segment task panicked");
                partial = true;
            }
        }
    }

    ReadOutcome { partial }
}

#[allow(clippy::too_many_arguments)]
async fn run_segment<S: SourceStore>(
    store: &S,
    segment_index: u32,
    total_segments: u32,
    window: Window,
    config: &ReaderConfig,
    pacer: &CapacityPacer,
    tx: &mpsc::Sender<Event>,
    cancel: &CancelToken,
    counters: &ReaderCounters,
) -> Result<(), extract_core::error::SourceError> {
    let mut token: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            debug!(segment_index, "stopping segment: cancellation observed");
            return Ok(());
        }

        pacer
            .wait_if_over_budget(config.read_throughput_fraction)
            .await;

        let request = SegmentRequest {
            segment_index,
            total_segments,
            continuation_token: token.clone(),
            limit: config.scan_batch_size,
        };

        let page = run_with_retry(&config.backoff, |_attempt| {
            let request = request.clone();
            async move { store.scan_segment(request).await }
        })
        .await
        .map_err(|err| extract_core::error::SourceError::Fatal {
            segment: segment_index,
            reason: err.to_string(),
        })?;

        if let Some(units) = page.consumed_capacity_units {
            pacer.observe(units);
        }

        for raw in page.records {
            counters.scanned.fetch_add(1, Ordering::Relaxed);
            match Event::from_raw(raw) {
                Ok(event) if window.contains(event.time) => {
                    counters.in_window.fetch_add(1, Ordering::Relaxed);
                    if tx.send(event).await.is_err() {
                        // Partitioner side dropped; nothing left to do.
                        return Ok(());
                    }
                }
                Ok(_out_of_window) => {}
                Err(_malformed) => {
                    counters.rejected.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        match page.next_token {
            Some(next) => token = Some(next),
            None => return Ok(()),
        }
    }
}
