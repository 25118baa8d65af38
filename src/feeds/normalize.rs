//! Payload normalization
//!
//! Turns one raw provider payload into the records to persist, each paired
//! with the natural key used as its upsert filter.

use super::FeedKind;
use crate::db::sqlite::NaturalKey;
use crate::error::{AppError, Result};
use serde_json::{Map, Value};
use tracing::warn;

/// One record ready for upsert
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub key: NaturalKey,
    pub fields: Map<String, Value>,
}

/// Normalize a payload fetched for `entity` in a cycle stamped `timestamp`
pub fn normalize(
    kind: FeedKind,
    entity: &str,
    payload: Value,
    timestamp: &str,
) -> Result<Vec<NormalizedRecord>> {
    match kind {
        FeedKind::Equities => normalize_equity(entity, payload, timestamp).map(|r| vec![r]),
        FeedKind::Indices => normalize_index(entity, payload, timestamp),
        FeedKind::OptionChain => normalize_option_chain(entity, payload, timestamp),
    }
}

/// Equity quotes are keyed by the symbol they were requested for
fn normalize_equity(symbol: &str, payload: Value, timestamp: &str) -> Result<NormalizedRecord> {
    let mut fields = match payload {
        Value::Object(map) if !map.is_empty() => map,
        Value::Object(_) => {
            return Err(AppError::MalformedPayload(format!("empty quote for {}", symbol)));
        }
        other => {
            return Err(AppError::MalformedPayload(format!(
                "quote for {} is not an object: {}",
                symbol,
                type_name(&other)
            )));
        }
    };
    stamp(&mut fields, timestamp);

    Ok(NormalizedRecord {
        key: NaturalKey::new().with("symbol", Value::String(symbol.to_string())),
        fields,
    })
}

/// Index snapshots carry their constituents under `data`; each row is
/// keyed by its own symbol plus the index it was listed under
fn normalize_index(index: &str, payload: Value, timestamp: &str) -> Result<Vec<NormalizedRecord>> {
    let rows = take_array(payload, &["data"])
        .ok_or_else(|| AppError::MalformedPayload(format!("No valid data for index {}", index)))?;

    Ok(rows
        .into_iter()
        .filter_map(|row| into_object(row, index))
        .map(|mut fields| {
            stamp(&mut fields, timestamp);
            let symbol = fields.get("symbol").cloned().unwrap_or(Value::Null);
            NormalizedRecord {
                key: NaturalKey::new()
                    .with("symbol", symbol)
                    .with("index", Value::String(index.to_string())),
                fields,
            }
        })
        .collect())
}

/// Option chains arrive as `records.data`, one row per strike and expiry
/// holding optional `CE` and `PE` legs
fn normalize_option_chain(
    underlying: &str,
    payload: Value,
    timestamp: &str,
) -> Result<Vec<NormalizedRecord>> {
    let rows = take_array(payload, &["records", "data"]).ok_or_else(|| {
        AppError::MalformedPayload(format!("No valid option chain data for {}", underlying))
    })?;

    Ok(rows
        .into_iter()
        .filter_map(|row| into_object(row, underlying))
        .map(|mut fields| {
            stamp(&mut fields, timestamp);
            let key = NaturalKey::new()
                .with("strikePrice", field(&fields, &["strikePrice"]))
                .with("expiryDate", field(&fields, &["expiryDate"]))
                .with("CE.identifier", field(&fields, &["CE", "identifier"]))
                .with("PE.identifier", field(&fields, &["PE", "identifier"]));
            NormalizedRecord { key, fields }
        })
        .collect())
}

fn stamp(fields: &mut Map<String, Value>, timestamp: &str) {
    fields.insert("timestamp".to_string(), Value::String(timestamp.to_string()));
}

fn take_array(payload: Value, path: &[&str]) -> Option<Vec<Value>> {
    let mut current = payload;
    for segment in path {
        current = match current {
            Value::Object(mut map) => map.remove(*segment)?,
            _ => return None,
        };
    }
    match current {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

fn field(fields: &Map<String, Value>, path: &[&str]) -> Value {
    let mut current = path.first().and_then(|first| fields.get(*first));
    for segment in path.iter().skip(1) {
        current = current.and_then(|v| v.get(*segment));
    }
    current.cloned().unwrap_or(Value::Null)
}

fn into_object(row: Value, entity: &str) -> Option<Map<String, Value>> {
    match row {
        Value::Object(map) => Some(map),
        other => {
            warn!("Skipping non-object row for {}: {}", entity, type_name(&other));
            None
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
