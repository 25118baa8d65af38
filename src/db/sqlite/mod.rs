//! SQLite database module

pub mod models;
mod api_keys;
mod connection;
mod documents;
mod migrations;

use crate::error::Result;
use chrono::{DateTime, Utc};
pub use api_keys::RequestDecision;
pub use models::{ApiKeyRecord, NaturalKey, UpsertOutcome};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde_json::{Map, Value};
use std::path::Path;

/// SQLite-backed document store shared by the feeds and the query API
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the store at `path`; `:memory:` gives a private in-memory store
    pub fn new(path: &Path) -> Result<Self> {
        let conn = connection::create_connection(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };

        // Run migrations
        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Document Methods ==========

    /// Insert or set-merge one record by natural key
    pub fn upsert_one(
        &self,
        collection: &str,
        key: &NaturalKey,
        fields: &Map<String, Value>,
    ) -> Result<UpsertOutcome> {
        let mut conn = self.conn.lock();
        documents::upsert_one(&mut conn, collection, key, fields)
    }

    /// Find a record by its natural key
    pub fn find_by_key(&self, collection: &str, key: &NaturalKey) -> Result<Option<Value>> {
        let conn = self.conn.lock();
        documents::find_by_key(&conn, collection, key)
    }

    /// Find a record by exact symbol
    pub fn find_by_symbol(&self, collection: &str, symbol: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock();
        documents::find_by_symbol(&conn, collection, symbol)
    }

    /// Case-insensitive substring search over symbol and company name
    pub fn search(&self, collection: &str, query: &str, limit: Option<usize>) -> Result<Vec<Value>> {
        let conn = self.conn.lock();
        documents::search(&conn, collection, query, limit)
    }

    /// Count records in a collection
    pub fn count(&self, collection: &str) -> Result<i64> {
        let conn = self.conn.lock();
        documents::count(&conn, collection)
    }

    // ========== API Key Methods ==========

    /// Store a pre-provisioned API key
    pub fn insert_api_key(&self, collection: &str, api_key: &str) -> Result<()> {
        let conn = self.conn.lock();
        api_keys::insert_api_key(&conn, collection, api_key)
    }

    /// Look up an API key record
    pub fn get_api_key(&self, collection: &str, api_key: &str) -> Result<Option<ApiKeyRecord>> {
        let conn = self.conn.lock();
        api_keys::get_api_key(&conn, collection, api_key)
    }

    /// Atomically check the key's rate limit and count this request
    pub fn try_record_request(
        &self,
        collection: &str,
        api_key: &str,
        now: DateTime<Utc>,
        window_ms: i64,
        limit: u32,
    ) -> Result<RequestDecision> {
        let conn = self.conn.lock();
        api_keys::try_record_request(&conn, collection, api_key, now, window_ms, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nse_stock_data.db");
        let key = NaturalKey::new().with("symbol", json!("TCS"));
        let mut fields = Map::new();
        fields.insert("timestamp".to_string(), json!("2024-01-25 09:15:00"));

        {
            let db = SqliteDb::new(&path).unwrap();
            db.upsert_one("eq", &key, &fields).unwrap();
        }

        let reopened = SqliteDb::new(&path).unwrap();
        let doc = reopened.find_by_symbol("eq", "TCS").unwrap().unwrap();
        assert_eq!(doc["timestamp"], json!("2024-01-25 09:15:00"));
    }

    #[test]
    fn test_memory_path() {
        let db = SqliteDb::new(Path::new(":memory:")).unwrap();
        assert_eq!(db.count("eq").unwrap(), 0);
    }
}
