//! Keyed JSON document storage
//!
//! Each record is a JSON object stored under `(collection, natural_key)`.
//! Upserts use "set" semantics: the incoming top-level fields replace the
//! stored ones, any other stored field is left untouched.

use super::models::{NaturalKey, UpsertOutcome};
use crate::error::{AppError, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::{Map, Value};

/// Insert or merge one record identified by its natural key.
///
/// Runs in an immediate transaction so the read of the current document and
/// the write of the merged one can't interleave with another writer.
pub fn upsert_one(
    conn: &mut Connection,
    collection: &str,
    key: &NaturalKey,
    fields: &Map<String, Value>,
) -> Result<UpsertOutcome> {
    let encoded_key = key.encode();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing: Option<String> = tx
        .query_row(
            "SELECT doc FROM documents WHERE collection = ?1 AND natural_key = ?2",
            params![collection, encoded_key],
            |row| row.get(0),
        )
        .optional()?;

    let outcome = match existing {
        Some(raw) => {
            let mut doc = parse_object(&raw)?;
            for (name, value) in fields {
                doc.insert(name.clone(), value.clone());
            }
            tx.execute(
                r#"
                UPDATE documents SET doc = ?3, updated_at = datetime('now')
                WHERE collection = ?1 AND natural_key = ?2
                "#,
                params![collection, encoded_key, Value::Object(doc).to_string()],
            )?;
            UpsertOutcome::Updated
        }
        None => {
            let mut doc = key.seed_document();
            for (name, value) in fields {
                doc.insert(name.clone(), value.clone());
            }
            tx.execute(
                "INSERT INTO documents (collection, natural_key, doc) VALUES (?1, ?2, ?3)",
                params![collection, encoded_key, Value::Object(doc).to_string()],
            )?;
            UpsertOutcome::Inserted
        }
    };

    tx.commit()?;
    Ok(outcome)
}

/// Point lookup by natural key
pub fn find_by_key(conn: &Connection, collection: &str, key: &NaturalKey) -> Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT doc FROM documents WHERE collection = ?1 AND natural_key = ?2",
            params![collection, key.encode()],
            |row| row.get(0),
        )
        .optional()?;

    raw.map(|r| parse_object(&r).map(Value::Object)).transpose()
}

/// Point lookup by exact `symbol` (first record in store order)
pub fn find_by_symbol(conn: &Connection, collection: &str, symbol: &str) -> Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row(
            r#"
            SELECT doc FROM documents
            WHERE collection = ?1 AND json_extract(doc, '$.symbol') = ?2
            ORDER BY rowid
            LIMIT 1
            "#,
            params![collection, symbol],
            |row| row.get(0),
        )
        .optional()?;

    raw.map(|r| parse_object(&r).map(Value::Object)).transpose()
}

/// Case-insensitive substring scan over `symbol` or `info.companyName`,
/// in store (insertion) order, capped at `limit` (`None` = every match)
pub fn search(
    conn: &Connection,
    collection: &str,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<Value>> {
    let needle = query.to_lowercase();
    // a negative LIMIT is unbounded in SQLite
    let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));

    let mut stmt = conn.prepare(
        r#"
        SELECT doc FROM documents
        WHERE collection = ?1
          AND (instr(lower(json_extract(doc, '$.symbol')), ?2) > 0
               OR instr(lower(json_extract(doc, '$.info.companyName')), ?2) > 0)
        ORDER BY rowid
        LIMIT ?3
        "#,
    )?;

    let docs = stmt
        .query_map(params![collection, needle, limit], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    docs.iter()
        .map(|raw| parse_object(raw).map(Value::Object))
        .collect()
}

/// Number of records in a collection
pub fn count(conn: &Connection, collection: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE collection = ?1",
        params![collection],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_object(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Internal(format!(
            "stored document is not an object: {}",
            other
        ))),
    }
}
