//! API key records and their rate-limit counters
//!
//! Keys are provisioned out-of-band; the query API only reads them and
//! advances the counters.

use super::models::ApiKeyRecord;
use crate::error::Result;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Result of one attempt to count a request against a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDecision {
    Accepted,
    /// Rejected; carries the time of the last accepted request
    Limited { last_request_time: DateTime<Utc> },
    UnknownKey,
}

/// Store a pre-provisioned key (no-op if it already exists)
pub fn insert_api_key(conn: &Connection, collection: &str, api_key: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO api_keys (collection, api_key) VALUES (?1, ?2)",
        params![collection, api_key],
    )?;
    tracing::info!("Provisioned API key in '{}'", collection);
    Ok(())
}

/// Look up a key record
pub fn get_api_key(conn: &Connection, collection: &str, api_key: &str) -> Result<Option<ApiKeyRecord>> {
    let record = conn
        .query_row(
            r#"
            SELECT api_key, last_request_time, request_count
            FROM api_keys
            WHERE collection = ?1 AND api_key = ?2
            "#,
            params![collection, api_key],
            |row| {
                let last_ms: Option<i64> = row.get(1)?;
                Ok(ApiKeyRecord {
                    api_key: row.get(0)?,
                    last_request_time: last_ms.and_then(from_millis),
                    request_count: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

/// Check the rate limit and count the request in a single statement.
///
/// The update only applies when the key is under its limit or the last
/// accepted request is at least `window_ms` old, so two concurrent callers
/// can never both slip past the ceiling.
pub fn try_record_request(
    conn: &Connection,
    collection: &str,
    api_key: &str,
    now: DateTime<Utc>,
    window_ms: i64,
    limit: u32,
) -> Result<RequestDecision> {
    let now_ms = now.timestamp_millis();
    let updated = conn.execute(
        r#"
        UPDATE api_keys
        SET last_request_time = ?3, request_count = request_count + 1
        WHERE collection = ?1 AND api_key = ?2
          AND NOT (last_request_time IS NOT NULL
                   AND ?3 - last_request_time < ?4
                   AND request_count >= ?5)
        "#,
        params![collection, api_key, now_ms, window_ms, limit],
    )?;

    if updated == 1 {
        return Ok(RequestDecision::Accepted);
    }

    match get_api_key(conn, collection, api_key)? {
        None => Ok(RequestDecision::UnknownKey),
        Some(record) => Ok(RequestDecision::Limited {
            last_request_time: record.last_request_time.unwrap_or(now),
        }),
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
