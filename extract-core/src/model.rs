//! Core value types: [`Event`], [`Window`], [`OutputObject`], [`RunSummary`].
//!
//! These are plain data — no behavior beyond construction and the
//! admission predicate on [`Window`]. They carry verbatim across
//! `extract-source`, `extract-core::partition`, and `extract-sink`.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::EventError;

/// A single event admitted from the source store.
///
/// `raw` is the full record as the source returned it, kept verbatim so
/// serialization never reformats a field the source produced (notably
/// `time`, which must round-trip in its original string form).
#[derive(Debug, Clone)]
pub struct Event {
    pub event_id: String,
    pub client_id: String,
    pub time: DateTime<Utc>,
    pub raw: Json,
}

impl Event {
    /// Parses a raw JSON record from the source into a validated `Event`.
    ///
    /// Rejects records with a missing/empty `client_id` or an unparseable
    /// `time`, per the invariant in the data model: malformed events are
    /// counted and skipped, never fatal to the run.
    pub fn from_raw(raw: Json) -> Result<Self, EventError> {
        let obj = raw.as_object().ok_or(EventError::NotAnObject)?;

        let event_id = obj
            .get("event_id")
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string();

        let client_id = obj
            .get("client_id")
            .and_then(Json::as_str)
            .map(str::to_string)
            .ok_or(EventError::MissingClientId)?;
        if client_id.is_empty() {
            return Err(EventError::MissingClientId);
        }

        let time_raw = obj
            .get("time")
            .and_then(Json::as_str)
            .ok_or(EventError::MissingTime)?;
        let time = DateTime::parse_from_rfc3339(time_raw)
            .map_err(|e| EventError::UnparseableTime(time_raw.to_string(), e.to_string()))?
            .with_timezone(&Utc);

        Ok(Event {
            event_id,
            client_id,
            time,
            raw,
        })
    }
}

/// The half-open `[start, end)` UTC interval selecting events for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// Computes the default window: `end` is the floor of `now` to the
    /// hour, `start` is `end - window_hours`. Deterministic from wall-clock
    /// time, which is what makes a retried invocation within the same hour
    /// idempotent at the window-selection layer.
    pub fn for_invocation(now: DateTime<Utc>, window_hours: u32) -> Self {
        let end = now
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .expect("truncating to the top of the hour is always representable");
        let start = end - ChronoDuration::hours(window_hours as i64);
        Window { start, end }
    }

    /// `start <= t < end`.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    /// `YYYY-MM-DD-HH` of `start`, used to build the output key.
    pub fn key_fragment(&self) -> String {
        self.start.format("%Y-%m-%d-%H").to_string()
    }
}

/// The serialized payload format for an [`OutputObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Jsonl,
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Json => "application/json",
            OutputFormat::Jsonl => "application/x-ndjson",
            OutputFormat::Csv => "text/csv",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "jsonl" => Ok(OutputFormat::Jsonl),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unrecognized output format '{other}'")),
        }
    }
}

/// One serialized artifact destined for the sink, identified by
/// `(bucket, key)`.
#[derive(Debug, Clone)]
pub struct OutputObject {
    pub bucket: String,
    pub key: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// The outcome of one client's upload, recorded in [`RunSummary`] whether it
/// succeeded or failed.
#[derive(Debug, Clone)]
pub struct ClientOutcome {
    pub client_id: String,
    pub bucket: String,
    pub key: String,
    pub bytes: u64,
    pub error: Option<String>,
}

/// A per-invocation record of what happened, returned to the caller and
/// emitted as telemetry.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub events_scanned: u64,
    pub events_in_window: u64,
    pub events_rejected: u64,
    pub per_client_counts: HashMap<String, u64>,
    pub objects_written: u64,
    pub objects_failed: u64,
    pub bytes_written: u64,
    pub duration_ms: u64,
    pub partial: bool,
    /// Bounded list of per-client failure details; capped so a pathological
    /// run with thousands of failing clients cannot grow this unboundedly.
    pub failures: Vec<ClientOutcome>,
}

impl RunSummary {
    /// Per §7, the bounded list of per-client error details is capped to
    /// avoid unbounded memory on a run with many failing clients.
    pub const MAX_RECORDED_FAILURES: usize = 100;

    pub fn clients_seen(&self) -> usize {
        self.per_client_counts.len()
    }

    pub fn record_failure(&mut self, outcome: ClientOutcome) {
        self.objects_failed += 1;
        self.partial = true;
        if self.failures.len() < Self::MAX_RECORDED_FAILURES {
            self.failures.push(outcome);
        }
    }
}
