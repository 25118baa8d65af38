//! SQLite database models

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Credential record consulted by the query API
#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub api_key: String,
    pub last_request_time: Option<DateTime<Utc>>,
    pub request_count: u32,
}

/// Equality filter identifying one record within a collection.
///
/// Field paths may be dotted (`CE.identifier`). Order matters: two keys
/// with the same fields in a different order encode differently, so each
/// collection must always build its key the same way.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NaturalKey {
    fields: Vec<(String, Value)>,
}

impl NaturalKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, value: Value) -> Self {
        self.fields.push((path.into(), value));
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Canonical string stored in the `natural_key` column
    pub fn encode(&self) -> String {
        let pairs: Vec<Value> = self
            .fields
            .iter()
            .map(|(path, value)| Value::Array(vec![Value::String(path.clone()), value.clone()]))
            .collect();
        Value::Array(pairs).to_string()
    }

    /// Write the key fields into a fresh document, expanding dotted paths
    pub fn seed_document(&self) -> Map<String, Value> {
        let mut doc = Map::new();
        for (path, value) in &self.fields {
            set_path(&mut doc, path, value.clone());
        }
        doc
    }
}

fn set_path(doc: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                set_path(map, rest, value);
            }
        }
    }
}

/// Whether an upsert created a record or merged into an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}
