//! Quote provider adapters module

pub mod nse;
#[cfg(test)]
pub mod mock;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use nse::NseProvider;

/// Remote source of live market data.
///
/// Implementations keep their own session state (cookies, headers) so the
/// feeds only ever see raw JSON payloads or errors.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Provider ID (e.g., "nse")
    fn id(&self) -> &'static str;

    /// Establish (or re-establish) the session required by data calls
    async fn bootstrap(&self) -> Result<()>;

    /// Live quote for one equity symbol
    async fn fetch_equity(&self, symbol: &str) -> Result<Value>;

    /// Constituent snapshot for one index
    async fn fetch_index(&self, index: &str) -> Result<Value>;

    /// Full option chain for an index underlying
    async fn fetch_option_chain(&self, symbol: &str) -> Result<Value>;
}
