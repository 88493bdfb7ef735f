//! [`SourceStore`] adapter for a DynamoDB table. The spec's source
//! contract — `(segment_index, total_segments, continuation_token, limit)`
//! parallel scan, per-response consumed-capacity reporting, a
//! distinguishable throttle error — is DynamoDB's `Scan` API verbatim, so
//! this is a thin wrapper rather than a reinterpretation.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnConsumedCapacity};
use aws_sdk_dynamodb::Client;
use serde_json::{Map, Value as Json};

use extract_core::error::SourceError;

use crate::store::{ScanPage, SegmentRequest, SourceStore};

pub struct DynamoDbSource {
    client: Client,
    table: String,
    provisioned_read_capacity: Option<f64>,
}

impl DynamoDbSource {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            provisioned_read_capacity: None,
        }
    }

    /// Sets the table's provisioned read capacity (units/sec), enabling
    /// the Reader's global pacing (`spec.md` §4.2). On-demand tables have
    /// no fixed provisioned rate; leave unset for best-effort pacing.
    pub fn with_provisioned_read_capacity(mut self, units_per_second: f64) -> Self {
        self.provisioned_read_capacity = Some(units_per_second);
        self
    }
}

#[async_trait]
impl SourceStore for DynamoDbSource {
    async fn scan_segment(&self, request: SegmentRequest) -> Result<ScanPage, SourceError> {
        let mut builder = self
            .client
            .scan()
            .table_name(&self.table)
            .segment(request.segment_index as i32)
            .total_segments(request.total_segments as i32)
            .limit(request.limit as i32)
            .return_consumed_capacity(ReturnConsumedCapacity::Total);

        if let Some(token) = &request.continuation_token {
            let key = decode_exclusive_start_key(token)?;
            builder = builder.set_exclusive_start_key(Some(key));
        }

        let output = builder
            .send()
            .await
            .map_err(|err| classify_error(err, request.segment_index))?;

        let records = output
            .items()
            .iter()
            .map(item_to_json)
            .collect::<Result<Vec<_>, SourceError>>()?;

        let next_token = match output.last_evaluated_key() {
            Some(key) if !key.is_empty() => Some(encode_exclusive_start_key(key)?),
            _ => None,
        };

        let consumed_capacity_units = output
            .consumed_capacity()
            .and_then(|capacity| capacity.capacity_units());

        Ok(ScanPage {
            records,
            next_token,
            consumed_capacity_units,
        })
    }

    fn provisioned_read_capacity(&self) -> Option<f64> {
        self.provisioned_read_capacity
    }
}

/// Non-throttle, non-transient codes (schema mismatch, authorization
/// failure, segment-not-found, ...) are fatal for this segment rather than
/// retried, per `spec.md` §7.
fn classify_error<E, R>(err: aws_sdk_dynamodb::error::SdkError<E, R>, segment: u32) -> SourceError
where
    E: aws_sdk_dynamodb::error::ProvideErrorMetadata,
{
    let code = err.code().map(str::to_string).unwrap_or_default();
    match code.as_str() {
        "ProvisionedThroughputExceededException" | "ThrottlingException" | "RequestLimitExceeded" => {
            SourceError::Throttled
        }
        "InternalServerError" | "ServiceUnavailable" => SourceError::Transient(code),
        _ => SourceError::Fatal {
            segment,
            reason: err.to_string(),
        },
    }
}

fn item_to_json(item: &HashMap<String, AttributeValue>) -> Result<Json, SourceError> {
    let mut map = Map::with_capacity(item.len());
    for (key, value) in item {
        map.insert(key.clone(), attribute_value_to_json(value)?);
    }
    Ok(Json::Object(map))
}

fn attribute_value_to_json(value: &AttributeValue) -> Result<Json, SourceError> {
    Ok(match value {
        AttributeValue::S(s) => Json::String(s.clone()),
        AttributeValue::N(n) => serde_json::from_str(n)
            .unwrap_or_else(|_| Json::String(n.clone())),
        AttributeValue::Bool(b) => Json::Bool(*b),
        AttributeValue::Null(_) => Json::Null,
        AttributeValue::M(m) => {
            let mut map = Map::with_capacity(m.len());
            for (k, v) in m {
                map.insert(k.clone(), attribute_value_to_json(v)?);
            }
            Json::Object(map)
        }
        AttributeValue::L(list) => {
            let values = list
                .iter()
                .map(attribute_value_to_json)
                .collect::<Result<Vec<_>, _>>()?;
            Json::Array(values)
        }
        AttributeValue::Ss(list) => Json::Array(list.iter().cloned().map(Json::String).collect()),
        AttributeValue::Ns(list) => Json::Array(
            list.iter()
                .map(|n| serde_json::from_str(n).unwrap_or_else(|_| Json::String(n.clone())))
                .collect(),
        ),
        other => {
            return Err(SourceError::Fatal {
                segment: 0,
                reason: format!("unsupported DynamoDB attribute type: {other:?}"),
            })
        }
    })
}

fn json_to_attribute_value(value: &Json) -> Result<AttributeValue, SourceError> {
    Ok(match value {
        Json::String(s) => AttributeValue::S(s.clone()),
        Json::Number(n) => AttributeValue::N(n.to_string()),
        Json::Bool(b) => AttributeValue::Bool(*b),
        Json::Null => AttributeValue::Null(true),
        Json::Array(items) => {
            let values = items
                .iter()
                .map(json_to_attribute_value)
                .collect::<Result<Vec<_>, _>>()?;
            AttributeValue::L(values)
        }
        Json::Object(obj) => {
            let mut map = HashMap::with_capacity(obj.len());
            for (k, v) in obj {
                map.insert(k.clone(), json_to_attribute_value(v)?);
            }
            AttributeValue::M(map)
        }
    })
}

/// The continuation token is opaque to the Reader; DynamoDB's
/// `LastEvaluatedKey`/`ExclusiveStartKey` is a key-attribute map, so it is
/// carried as a JSON-encoded object.
fn encode_exclusive_start_key(
    key: &HashMap<String, AttributeValue>,
) -> Result<String, SourceError> {
    let json = item_to_json(key)?;
    serde_json::to_string(&json).map_err(|e| SourceError::Fatal {
        segment: 0,
        reason: format!("failed to encode continuation token: {e}"),
    })
}

fn decode_exclusive_start_key(token: &str) -> Result<HashMap<String, AttributeValue>, SourceError> {
    let json: Json = serde_json::from_str(token).map_err(|e| SourceError::Fatal {
        segment: 0,
        reason: format!("failed to decode continuation token: {e}"),
    })?;
    let obj = json.as_object().ok_or_else(|| SourceError::Fatal {
        segment: 0,
        reason: "continuation token is not a JSON object".into(),
    })?;
    let mut map = HashMap::with_capacity(obj.len());
    for (k, v) in obj {
        map.insert(k.clone(), json_to_attribute_value(v)?);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_value_round_trips_through_json() {
        let mut m = HashMap::new();
        m.insert("client_id".to_string(), AttributeValue::S("acme".into()));
        m.insert("count".to_string(), AttributeValue::N("42".into()));
        m.insert("active".to_string(), AttributeValue::Bool(true));

        let json = item_to_json(&m).unwrap();
        assert_eq!(json["client_id"], "acme");
        assert_eq!(json["count"], 42);
        assert_eq!(json["active"], true);

        let token = encode_exclusive_start_key(&m).unwrap();
        let decoded = decode_exclusive_start_key(&token).unwrap();
        assert_eq!(decoded.get("client_id"), m.get("client_id"));
    }
}
