//! NSE India provider adapter
//!
//! The NSE JSON endpoints refuse requests that don't carry the cookies set
//! by the landing page, so every process starts by fetching `/` with a
//! browser-like header set and keeps the resulting cookie jar.

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::provider::QuoteProvider;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// NSE India quote provider
pub struct NseProvider {
    client: Client,
    base_url: String,
}

impl NseProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        // gzip/brotli/deflate features make reqwest send Accept-Encoding
        // and decode bodies itself
        let client = Client::builder()
            .cookie_store(true)
            .default_headers(Self::browser_headers())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn browser_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers
    }

    pub fn equity_url(&self, symbol: &str) -> String {
        format!("{}/api/quote-equity?symbol={}", self.base_url, urlencoding::encode(symbol))
    }

    pub fn index_url(&self, index: &str) -> String {
        format!("{}/api/equity-stockIndices?index={}", self.base_url, urlencoding::encode(index))
    }

    pub fn option_chain_url(&self, symbol: &str) -> String {
        format!("{}/api/option-chain-indices?symbol={}", self.base_url, urlencoding::encode(symbol))
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AppError::Upstream {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| AppError::MalformedPayload(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl QuoteProvider for NseProvider {
    fn id(&self) -> &'static str {
        "nse"
    }

    async fn bootstrap(&self) -> Result<()> {
        let url = format!("{}/", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream {
                status: status.as_u16(),
                url,
            });
        }

        info!("NSE session established ({})", status);
        Ok(())
    }

    async fn fetch_equity(&self, symbol: &str) -> Result<Value> {
        debug!("Fetching equity quote for {}", symbol);
        self.get_json(&self.equity_url(symbol)).await
    }

    async fn fetch_index(&self, index: &str) -> Result<Value> {
        debug!("Fetching index snapshot for {}", index);
        self.get_json(&self.index_url(index)).await
    }

    async fn fetch_option_chain(&self, symbol: &str) -> Result<Value> {
        debug!("Fetching option chain for {}", symbol);
        self.get_json(&self.option_chain_url(symbol)).await
    }
}
