//! Telemetry (C6): the fixed set of measurements from `spec.md` §4.6,
//! delivered to an external sink at end-of-run. A failure to emit is
//! logged, never propagated — the run itself already succeeded or failed
//! independently of whether its summary made it to the metrics backend.

use tracing::{info, warn};

use crate::model::RunSummary;

/// Delivers a completed run's measurements somewhere external.
pub trait Telemetry: Send + Sync {
    fn record(&self, summary: &RunSummary);
}

/// Emits the run's measurements as structured `tracing` fields on a single
/// `info!` event, following this repo's convention of structured logging
/// over a bespoke metrics wire format.
#[derive(Debug, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn record(&self, summary: &RunSummary) {
        info!(
            events_scanned = summary.events_scanned,
            events_in_window = summary.events_in_window,
            events_rejected = summary.events_rejected,
            clients_seen = summary.clients_seen() as u64,
            objects_written = summary.objects_written,
            objects_failed = summary.objects_failed,
            bytes_written = summary.bytes_written,
            duration_ms = summary.duration_ms,
            partial_run = summary.partial as u8,
            "run complete"
        );
        if summary.partial {
            warn!(
                failed_clients = summary.failures.len(),
                "run completed with partial failures"
            );
        }
    }
}

/// Drops the summary. Used in tests where telemetry delivery is not under
/// test, and as the fallback when the configured sink itself fails to
/// initialize (§4.6: "failure to emit is logged but does not fail the
/// run").
#[derive(Debug, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn record(&self, _summary: &RunSummary) {}
}
