//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_documents", CREATE_DOCUMENTS_TABLE)?;
    run_migration(conn, "002_documents_search_indexes", CREATE_DOCUMENTS_SEARCH_INDEXES)?;
    run_migration(conn, "003_api_keys", CREATE_API_KEYS_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    // Check if migration already applied
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO migrations (name) VALUES (?)",
            [name],
        )?;
    }

    Ok(())
}

/// Every logical collection shares one table; `natural_key` is the canonical
/// encoding of the record's key fields within its collection.
const CREATE_DOCUMENTS_TABLE: &str = r#"
CREATE TABLE documents (
    collection TEXT NOT NULL,
    natural_key TEXT NOT NULL,
    doc TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, natural_key)
);
"#;

/// Expression indexes backing point lookups by symbol
const CREATE_DOCUMENTS_SEARCH_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_documents_symbol
    ON documents(collection, json_extract(doc, '$.symbol'));
CREATE INDEX IF NOT EXISTS idx_documents_symbol_lower
    ON documents(collection, lower(json_extract(doc, '$.symbol')));
"#;

/// Rate-limit state lives next to the key; times are unix milliseconds
const CREATE_API_KEYS_TABLE: &str = r#"
CREATE TABLE api_keys (
    collection TEXT NOT NULL,
    api_key TEXT NOT NULL,
    last_request_time INTEGER,
    request_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, api_key)
);
"#;
