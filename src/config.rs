//! Process configuration
//!
//! Loaded once at startup from the environment (and an optional `.env`
//! file). Nothing mutates it afterwards; components receive the pieces they
//! need when they are constructed.

use crate::error::{AppError, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_INDICES: [&str; 5] = [
    "NIFTY 50",
    "NIFTY MIDCAP SELECT",
    "NIFTY BANK",
    "NIFTY FINANCIAL SERVICES",
    "NIFTY IPO",
];

/// Names of the logical collections inside the store
#[derive(Debug, Clone)]
pub struct Collections {
    pub equities: String,
    pub indices: String,
    pub option_chain: String,
    pub api_keys: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            equities: "live_indian_stock_data".to_string(),
            indices: "nse_indices_live".to_string(),
            option_chain: "nifty_options_chain_live".to_string(),
            api_keys: "api_keys".to_string(),
        }
    }
}

/// Provider connection settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    /// Session rejections within one cycle that trigger a re-bootstrap
    pub rebootstrap_threshold: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.nseindia.com".to_string(),
            request_timeout: Duration::from_secs(10),
            rebootstrap_threshold: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_path: PathBuf,
    pub collections: Collections,
    pub rate_limit: u32,
    pub symbols_file: PathBuf,
    pub indices: Vec<String>,
    pub option_chain_symbol: String,
    pub provider: ProviderConfig,
    /// `None` means every entity of a cycle is fetched at once
    pub fetch_concurrency: Option<usize>,
    pub listen_addr: SocketAddr,
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("nse_stock_data.db"),
            collections: Collections::default(),
            rate_limit: 1000,
            symbols_file: PathBuf::from("symbols.json"),
            indices: DEFAULT_INDICES.iter().map(|s| s.to_string()).collect(),
            option_chain_symbol: "NIFTY".to_string(),
            provider: ProviderConfig::default(),
            fetch_concurrency: None,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self> {
        // A missing .env file is normal outside development
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup("STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(name) = lookup("COLLECTION_NAME") {
            config.collections.equities = name;
        }
        if let Some(name) = lookup("INDICES_COLLECTION_NAME") {
            config.collections.indices = name;
        }
        if let Some(name) = lookup("OPTION_CHAIN_COLLECTION_NAME") {
            config.collections.option_chain = name;
        }
        if let Some(name) = lookup("API_KEYS_COLLECTION_NAME") {
            config.collections.api_keys = name;
        }
        if let Some(value) = lookup("RATE_LIMIT") {
            config.rate_limit = parse_var("RATE_LIMIT", &value)?;
        }
        if let Some(path) = lookup("SYMBOLS_FILE") {
            config.symbols_file = PathBuf::from(path);
        }
        if let Some(value) = lookup("INDICES") {
            config.indices = split_list(&value);
        }
        if let Some(symbol) = lookup("OPTION_CHAIN_SYMBOL") {
            config.option_chain_symbol = symbol;
        }
        if let Some(url) = lookup("PROVIDER_BASE_URL") {
            config.provider.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(value) = lookup("REQUEST_TIMEOUT_SECS") {
            config.provider.request_timeout =
                Duration::from_secs(parse_var("REQUEST_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("REBOOTSTRAP_THRESHOLD") {
            config.provider.rebootstrap_threshold = parse_var("REBOOTSTRAP_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("FETCH_CONCURRENCY") {
            let cap: usize = parse_var("FETCH_CONCURRENCY", &value)?;
            if cap == 0 {
                return Err(AppError::Config(
                    "FETCH_CONCURRENCY must be at least 1".to_string(),
                ));
            }
            config.fetch_concurrency = Some(cap);
        }
        if let Some(value) = lookup("LISTEN_ADDR") {
            config.listen_addr = parse_var("LISTEN_ADDR", &value)?;
        }
        if let Some(value) = lookup("CORS_ORIGINS") {
            config.cors_origins = split_list(&value);
        }

        Ok(config)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}='{}': {}", name, value, e)))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
struct SymbolFile {
    symbols: Vec<String>,
}

/// Load the tracked equity symbols from a `{"symbols": [...]}` JSON file
pub fn load_symbols(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read symbol file {:?}: {}", path, e))
    })?;
    let file: SymbolFile = serde_json::from_str(&raw)?;
    tracing::info!("Loaded {} symbols.", file.symbols.len());
    Ok(file.symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.rate_limit, 1000);
        assert_eq!(config.collections.equities, "live_indian_stock_data");
        assert_eq!(config.collections.api_keys, "api_keys");
        assert_eq!(config.indices.len(), 5);
        assert_eq!(config.option_chain_symbol, "NIFTY");
        assert!(config.fetch_concurrency.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("RATE_LIMIT", "3"),
            ("INDICES", "NIFTY 50, NIFTY BANK ,"),
            ("FETCH_CONCURRENCY", "16"),
            ("PROVIDER_BASE_URL", "http://127.0.0.1:9000/"),
            ("LISTEN_ADDR", "127.0.0.1:8080"),
        ]))
        .unwrap();

        assert_eq!(config.rate_limit, 3);
        assert_eq!(config.indices, vec!["NIFTY 50", "NIFTY BANK"]);
        assert_eq!(config.fetch_concurrency, Some(16));
        assert_eq!(config.provider.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.listen_addr.port(), 8080);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("RATE_LIMIT", "lots")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("FETCH_CONCURRENCY", "0")])).is_err());
    }

    #[test]
    fn test_load_symbols() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"symbols": ["TCS", "INFY", "RELIANCE"]}}"#).unwrap();

        let symbols = load_symbols(file.path()).unwrap();
        assert_eq!(symbols, vec!["TCS", "INFY", "RELIANCE"]);
    }

    #[test]
    fn test_load_symbols_missing_file() {
        let result = load_symbols(Path::new("/nonexistent/symbols.json"));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
