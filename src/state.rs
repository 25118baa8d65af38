//! Application state shared by the feeds and the query API

use crate::api::{ApiServer, ApiState};
use crate::config::{load_symbols, Config};
use crate::db::SqliteDb;
use crate::error::Result;
use crate::feeds::{Feed, FeedKind};
use crate::gateway::{QueryGateway, RateLimitPolicy};
use crate::provider::{NseProvider, QuoteProvider};
use crate::scheduler::Poller;
use std::sync::Arc;
use tracing::info;

/// Process-wide context, built once at startup and passed down explicitly
pub struct AppState {
    pub config: Config,
    pub db: Arc<SqliteDb>,
    pub provider: Arc<dyn QuoteProvider>,
}

impl AppState {
    /// Open the store and build the provider client described by `config`
    pub fn new(config: Config) -> Result<Self> {
        let db = Arc::new(SqliteDb::new(&config.store_path)?);
        info!("Store opened at {}", config.store_path.display());

        let provider: Arc<dyn QuoteProvider> = Arc::new(NseProvider::new(&config.provider)?);

        Ok(Self::with_parts(config, db, provider))
    }

    pub fn with_parts(config: Config, db: Arc<SqliteDb>, provider: Arc<dyn QuoteProvider>) -> Self {
        Self { config, db, provider }
    }

    /// Build the feed of `kind`, reading the symbol list for equities
    pub fn feed(&self, kind: FeedKind) -> Result<Feed> {
        let symbols = match kind {
            FeedKind::Equities => {
                let symbols = load_symbols(&self.config.symbols_file)?;
                info!(
                    "Loaded {} symbols from {}",
                    symbols.len(),
                    self.config.symbols_file.display()
                );
                symbols
            }
            FeedKind::Indices | FeedKind::OptionChain => Vec::new(),
        };
        Ok(Feed::from_config(kind, &self.config, symbols))
    }

    /// Cycle loop for `kind` against the shared provider and store
    pub fn poller(&self, kind: FeedKind) -> Result<Poller> {
        let feed = self.feed(kind)?;
        Ok(Poller::new(feed, self.provider.clone(), self.db.clone())
            .with_rebootstrap_threshold(self.config.provider.rebootstrap_threshold))
    }

    pub fn gateway(&self) -> QueryGateway {
        QueryGateway::new(
            self.db.clone(),
            &self.config.collections.equities,
            &self.config.collections.api_keys,
            RateLimitPolicy::new(self.config.rate_limit),
        )
    }

    pub fn api_server(&self) -> ApiServer {
        ApiServer::new(ApiState::new(self.gateway()), self.config.cors_origins.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use std::io::Write;

    fn state_with(config: Config) -> AppState {
        let db = Arc::new(SqliteDb::open_in_memory().unwrap());
        AppState::with_parts(config, db, Arc::new(MockProvider::new()))
    }

    #[test]
    fn test_equities_feed_reads_symbols_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"symbols": ["TCS", "INFY"]}}"#).unwrap();

        let config = Config {
            symbols_file: file.path().to_path_buf(),
            ..Config::default()
        };
        let feed = state_with(config).feed(FeedKind::Equities).unwrap();

        assert_eq!(feed.entities().to_vec(), vec!["TCS".to_string(), "INFY".to_string()]);
        assert_eq!(feed.collection(), "live_indian_stock_data");
    }

    #[test]
    fn test_missing_symbols_file_is_an_error() {
        let config = Config {
            symbols_file: "/nonexistent/symbols.json".into(),
            ..Config::default()
        };
        let state = state_with(config);

        assert!(state.feed(FeedKind::Equities).is_err());
        assert!(state.feed(FeedKind::Indices).is_ok());
    }

    #[test]
    fn test_new_opens_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            store_path: dir.path().join("feed.db"),
            ..Config::default()
        };

        let state = AppState::new(config).unwrap();
        assert_eq!(state.provider.id(), "nse");
        assert_eq!(state.db.count("live_indian_stock_data").unwrap(), 0);
    }
}
