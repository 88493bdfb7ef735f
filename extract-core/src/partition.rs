//! The Partitioner (C3): groups the Reader's event stream by `client_id`
//! and serializes each client's buffer on demand.
//!
//! This is the memory ceiling of the pipeline (`spec.md` §4.3): in bounded
//! mode, once the aggregate buffered byte count exceeds a configured
//! high-water mark, the single largest buffer is evicted and serialized
//! early under a stable `(client, chunk_index)` pair so the caller can
//! stream it to the sink without waiting for `finalize`.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value as Json;

use crate::error::PipelineError;
use crate::model::{Event, OutputFormat};

struct ClientBuffer {
    events: Vec<Event>,
    bytes: usize,
    chunk_index: u32,
}

impl ClientBuffer {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            bytes: 0,
            chunk_index: 0,
        }
    }
}

/// A buffer evicted early under memory pressure, already serialized.
#[derive(Debug, Clone)]
pub struct EvictedChunk {
    pub client_id: String,
    pub chunk_index: u32,
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

/// A non-empty buffer produced by [`Partitioner::finalize`].
#[derive(Debug, Clone)]
pub struct FinalizedBuffer {
    pub client_id: String,
    pub chunk_index: u32,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub event_count: u64,
}

/// Groups admitted events by `client_id` and serializes buffers to the
/// configured [`OutputFormat`].
pub struct Partitioner {
    format: OutputFormat,
    high_water_mark: Option<usize>,
    buffers: HashMap<String, ClientBuffer>,
    total_bytes: usize,
}

impl Partitioner {
    pub fn new(format: OutputFormat, high_water_mark: Option<usize>) -> Self {
        Self {
            format,
            high_water_mark,
            buffers: HashMap::new(),
            total_bytes: 0,
        }
    }

    /// Appends `event` to its client's buffer (creating the buffer on first
    /// sight), in arrival order. Returns an [`EvictedChunk`] if admitting
    /// this event pushed the aggregate buffered size past the high-water
    /// mark, in which case the caller should ship the chunk to the sink
    /// immediately rather than waiting for [`Self::finalize`].
    pub fn admit(&mut self, event: Event) -> Result<Option<EvictedChunk>, PipelineError> {
        let bytes = estimate_bytes(&event);
        let client_id = event.client_id.clone();
        let buffer = self.buffers.entry(client_id).or_insert_with(ClientBuffer::new);
        buffer.events.push(event);
        buffer.bytes += bytes;
        self.total_bytes += bytes;

        match self.high_water_mark {
            Some(hwm) if self.total_bytes > hwm => self.evict_largest(),
            _ => Ok(None),
        }
    }

    fn evict_largest(&mut self) -> Result<Option<EvictedChunk>, PipelineError> {
        let Some(client_id) = self
            .buffers
            .iter()
            .max_by_key(|(_, buf)| buf.bytes)
            .map(|(client_id, _)| client_id.clone())
        else {
            return Ok(None);
        };

        let buffer = self
            .buffers
            .get_mut(&client_id)
            .expect("client_id came from iterating self.buffers");
        let events = std::mem::take(&mut buffer.events);
        self.total_bytes = self.total_bytes.saturating_sub(buffer.bytes);
        buffer.bytes = 0;
        let chunk_index = buffer.chunk_index;
        buffer.chunk_index += 1;

        let body = serialize(&events, self.format)?;
        Ok(Some(EvictedChunk {
            client_id,
            chunk_index,
            body,
            content_type: self.format.content_type(),
        }))
    }

    /// Drains every remaining non-empty buffer, serializing each. Clears
    /// internal state so the Partitioner is ready for a fresh run.
    pub fn finalize(&mut self) -> Result<Vec<FinalizedBuffer>, PipelineError> {
        let format = self.format;
        let buffers = std::mem::take(&mut self.buffers);
        self.total_bytes = 0;

        buffers
            .into_iter()
            .filter(|(_, buffer)| !buffer.events.is_empty())
            .map(|(client_id, buffer)| {
                let event_count = buffer.events.len() as u64;
                let body = serialize(&buffer.events, format)?;
                Ok(FinalizedBuffer {
                    client_id,
                    chunk_index: buffer.chunk_index,
                    body,
                    content_type: format.content_type(),
                    event_count,
                })
            })
            .collect()
    }
}

fn estimate_bytes(event: &Event) -> usize {
    serde_json::to_vec(&event.raw).map(|bytes| bytes.len()).unwrap_or(0)
}

/// Produces the byte payload for a single client's buffer, per the
/// serialization contracts in `spec.md` §4.3.
pub fn serialize(events: &[Event], format: OutputFormat) -> Result<Vec<u8>, PipelineError> {
    match format {
        OutputFormat::Json => serialize_json(events),
        OutputFormat::Jsonl => serialize_jsonl(events),
        OutputFormat::Csv => serialize_csv(events),
    }
}

fn serialize_json(events: &[Event]) -> Result<Vec<u8>, PipelineError> {
    let values: Vec<&Json> = events.iter().map(|e| &e.raw).collect();
    serde_json::to_vec(&values).map_err(|e| PipelineError::Serialize(e.to_string()))
}

fn serialize_jsonl(events: &[Event]) -> Result<Vec<u8>, PipelineError> {
    let mut out = Vec::new();
    for event in events {
        serde_json::to_writer(&mut out, &event.raw)
            .map_err(|e| PipelineError::Serialize(e.to_string()))?;
        out.push(b'\n');
    }
    Ok(out)
}

fn serialize_csv(events: &[Event]) -> Result<Vec<u8>, PipelineError> {
    let mut headers: BTreeSet<String> = BTreeSet::new();
    for event in events {
        if let Some(obj) = event.raw.as_object() {
            headers.extend(obj.keys().cloned());
        }
    }
    let headers: Vec<String> = headers.into_iter().collect();

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(&headers)
        .map_err(|e| PipelineError::Serialize(e.to_string()))?;

    for event in events {
        let obj = event.raw.as_object();
        let row: Vec<String> = headers
            .iter()
            .map(|key| match obj.and_then(|o| o.get(key)) {
                None | Some(Json::Null) => String::new(),
                Some(Json::String(s)) => s.clone(),
                Some(Json::Number(n)) => n.to_string(),
                Some(Json::Bool(b)) => b.to_string(),
                Some(other @ (Json::Array(_) | Json::Object(_))) => {
                    serde_json::to_string(other).unwrap_or_default()
                }
            })
            .collect();
        writer
            .write_record(&row)
            .map_err(|e| PipelineError::Serialize(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| PipelineError::Serialize(e.to_string()))
}
