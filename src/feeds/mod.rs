//! Market data feeds
//!
//! A feed is one polling pipeline: the entities it tracks, the collection it
//! writes to and its cadence. One cycle fetches every entity, then upserts
//! whatever came back; nothing is written until all fetches have finished.

pub mod fetch;
pub mod normalize;

use crate::config::Config;
use crate::db::sqlite::UpsertOutcome;
use crate::db::SqliteDb;
use crate::error::Result;
use crate::provider::QuoteProvider;
use chrono::Local;
use std::time::Duration;
use tracing::{debug, warn};

pub use fetch::{fetch_all, FetchOutcome};
pub use normalize::{normalize, NormalizedRecord};

/// Timestamp format stamped on every persisted record
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum FeedKind {
    Equities,
    Indices,
    OptionChain,
}

impl FeedKind {
    pub fn name(&self) -> &'static str {
        match self {
            FeedKind::Equities => "equities",
            FeedKind::Indices => "indices",
            FeedKind::OptionChain => "option-chain",
        }
    }

    /// Delay between the end of one cycle and the start of the next
    pub fn default_interval(&self) -> Duration {
        match self {
            FeedKind::Equities | FeedKind::Indices => Duration::from_secs(5),
            FeedKind::OptionChain => Duration::from_secs(3),
        }
    }
}

/// Summary of one completed cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub timestamp: String,
    pub fetched: usize,
    pub failed: usize,
    /// Fetches refused with 401/403, a sign the session expired
    pub session_rejections: usize,
    pub inserted: usize,
    pub updated: usize,
}

impl CycleReport {
    pub fn records_written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// One polling pipeline
#[derive(Debug, Clone)]
pub struct Feed {
    kind: FeedKind,
    collection: String,
    entities: Vec<String>,
    concurrency: Option<usize>,
    interval: Duration,
}

impl Feed {
    /// All symbols fetched concurrently, optionally capped
    pub fn equities(collection: &str, symbols: Vec<String>, concurrency: Option<usize>) -> Self {
        Self::new(FeedKind::Equities, collection, symbols, concurrency)
    }

    /// Indices are fetched one after another
    pub fn indices(collection: &str, indices: Vec<String>) -> Self {
        Self::new(FeedKind::Indices, collection, indices, Some(1))
    }

    /// A single option-chain call per cycle
    pub fn option_chain(collection: &str, underlying: &str) -> Self {
        Self::new(FeedKind::OptionChain, collection, vec![underlying.to_string()], Some(1))
    }

    /// Build the feed of `kind` described by `config`; `symbols` is only
    /// used by the equities feed
    pub fn from_config(kind: FeedKind, config: &Config, symbols: Vec<String>) -> Self {
        match kind {
            FeedKind::Equities => {
                Self::equities(&config.collections.equities, symbols, config.fetch_concurrency)
            }
            FeedKind::Indices => Self::indices(&config.collections.indices, config.indices.clone()),
            FeedKind::OptionChain => {
                Self::option_chain(&config.collections.option_chain, &config.option_chain_symbol)
            }
        }
    }

    fn new(kind: FeedKind, collection: &str, entities: Vec<String>, concurrency: Option<usize>) -> Self {
        Self {
            kind,
            collection: collection.to_string(),
            entities,
            concurrency,
            interval: kind.default_interval(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one fetch-then-upsert cycle stamped with the current local time.
    ///
    /// Per-entity fetch and normalization failures are logged and counted;
    /// only a store failure aborts the cycle.
    pub async fn run_cycle(&self, provider: &dyn QuoteProvider, db: &SqliteDb) -> Result<CycleReport> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        self.run_cycle_at(provider, db, timestamp).await
    }

    async fn run_cycle_at(
        &self,
        provider: &dyn QuoteProvider,
        db: &SqliteDb,
        timestamp: String,
    ) -> Result<CycleReport> {
        let outcomes = fetch_all(self.kind, provider, &self.entities, self.concurrency).await;

        let mut report = CycleReport {
            timestamp,
            ..CycleReport::default()
        };

        for outcome in outcomes {
            let payload = match outcome.payload {
                Ok(payload) => payload,
                Err(e) => {
                    report.failed += 1;
                    if e.is_session_rejected() {
                        report.session_rejections += 1;
                    }
                    continue;
                }
            };
            report.fetched += 1;

            let records = match normalize(self.kind, &outcome.entity, payload, &report.timestamp) {
                Ok(records) => records,
                Err(e) => {
                    warn!("[{}] {}", report.timestamp, e);
                    report.failed += 1;
                    continue;
                }
            };

            for record in &records {
                match db.upsert_one(&self.collection, &record.key, &record.fields)? {
                    UpsertOutcome::Inserted => report.inserted += 1,
                    UpsertOutcome::Updated => report.updated += 1,
                }
            }
            debug!(
                "[{}] Updated {} records for {}",
                report.timestamp,
                records.len(),
                outcome.entity
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::NaturalKey;
    use crate::provider::mock::MockProvider;
    use serde_json::json;

    const TS: &str = "2024-01-25 09:15:00";

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_failed_entity_is_skipped_others_written() {
        let names = ["TCS", "INFY", "WIPRO", "HDFCBANK", "ITC"];
        let provider = names
            .iter()
            .fold(MockProvider::new(), |p, n| p.with_payload(n, MockProvider::equity_payload(n, n, 10.0)))
            .with_failure("WIPRO");
        let db = SqliteDb::open_in_memory().unwrap();
        let feed = Feed::equities("eq", symbols(&names), None);

        let report = feed.run_cycle_at(&provider, &db, TS.to_string()).await.unwrap();

        assert_eq!(report.fetched, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.records_written(), 4);
        assert_eq!(db.count("eq").unwrap(), 4);
        assert!(db.find_by_symbol("eq", "WIPRO").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_cycle_updates_in_place() {
        let provider = MockProvider::new().with_payload("TCS", MockProvider::equity_payload("TCS", "Tata", 1.0));
        let db = SqliteDb::open_in_memory().unwrap();
        let feed = Feed::equities("eq", symbols(&["TCS"]), None);

        let first = feed.run_cycle_at(&provider, &db, TS.to_string()).await.unwrap();
        let second = feed
            .run_cycle_at(&provider, &db, "2024-01-25 09:15:05".to_string())
            .await
            .unwrap();

        assert_eq!(first.inserted, 1);
        assert_eq!(second.updated, 1);
        assert_eq!(db.count("eq").unwrap(), 1);
        let doc = db.find_by_symbol("eq", "TCS").unwrap().unwrap();
        assert_eq!(doc["timestamp"], json!("2024-01-25 09:15:05"));
    }

    #[tokio::test]
    async fn test_index_feed_writes_rows_per_index() {
        let provider = MockProvider::new()
            .with_payload("NIFTY 50", json!({"data": [{"symbol": "NIFTY 50"}, {"symbol": "TCS"}]}))
            .with_payload("NIFTY IT", json!({"data": [{"symbol": "NIFTY IT"}, {"symbol": "TCS"}]}))
            .with_payload("NIFTY IPO", json!({"message": "unavailable"}));
        let db = SqliteDb::open_in_memory().unwrap();
        let feed = Feed::indices("idx", symbols(&["NIFTY 50", "NIFTY IT", "NIFTY IPO"]));

        let report = feed.run_cycle_at(&provider, &db, TS.to_string()).await.unwrap();

        // TCS appears in two indices and is stored once per index
        assert_eq!(db.count("idx").unwrap(), 4);
        assert_eq!(report.failed, 1);
        let key = NaturalKey::new().with("symbol", json!("TCS")).with("index", json!("NIFTY IT"));
        let doc = db.find_by_key("idx", &key).unwrap().unwrap();
        assert_eq!(doc["index"], json!("NIFTY IT"));
    }

    #[tokio::test]
    async fn test_option_chain_feed_partitions_by_expiry() {
        let leg = |expiry: &str| {
            json!({
                "strikePrice": 21000,
                "expiryDate": expiry,
                "CE": {"identifier": "CE21000", "lastPrice": 1.0},
                "PE": {"identifier": "PE21000", "lastPrice": 2.0}
            })
        };
        let provider = MockProvider::new().with_payload(
            "NIFTY",
            json!({"records": {"data": [leg("25-Jan-2024"), leg("01-Feb-2024"), leg("25-Jan-2024")]}}),
        );
        let db = SqliteDb::open_in_memory().unwrap();
        let feed = Feed::option_chain("oc", "NIFTY");

        let report = feed.run_cycle_at(&provider, &db, TS.to_string()).await.unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(db.count("oc").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_session_rejections_counted() {
        let provider = MockProvider::new().with_payload("TCS", MockProvider::equity_payload("TCS", "Tata", 1.0));
        provider.set_rejecting(true);
        let db = SqliteDb::open_in_memory().unwrap();
        let feed = Feed::equities("eq", symbols(&["TCS", "INFY"]), None);

        let report = feed.run_cycle_at(&provider, &db, TS.to_string()).await.unwrap();

        assert_eq!(report.session_rejections, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(db.count("eq").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_cycle_stamps_second_precision() {
        let provider = MockProvider::new().with_payload("TCS", MockProvider::equity_payload("TCS", "Tata", 1.0));
        let db = SqliteDb::open_in_memory().unwrap();
        let feed = Feed::equities("eq", symbols(&["TCS"]), None);

        let report = feed.run_cycle(&provider, &db).await.unwrap();

        assert!(chrono::NaiveDateTime::parse_from_str(&report.timestamp, TIMESTAMP_FORMAT).is_ok());
        let doc = db.find_by_symbol("eq", "TCS").unwrap().unwrap();
        assert_eq!(doc["timestamp"], json!(report.timestamp));
    }

    #[test]
    fn test_from_config() {
        let config = Config::default();
        let indices = Feed::from_config(FeedKind::Indices, &config, vec![]);
        assert_eq!(indices.entities().len(), 5);
        assert_eq!(indices.collection(), "nse_indices_live");

        let chain = Feed::from_config(FeedKind::OptionChain, &config, vec![]);
        assert_eq!(chain.entities().to_vec(), vec!["NIFTY".to_string()]);
        assert_eq!(chain.interval(), Duration::from_secs(3));
    }
}
