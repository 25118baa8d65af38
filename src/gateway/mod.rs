//! Query Gateway
//!
//! Read operations over the equities collection. Both operations require a
//! known API key; search is additionally rate limited per key.
//! Called by the REST API handlers.

pub mod rate_limiter;

use crate::db::SqliteDb;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub use rate_limiter::{RateLimitPolicy, RateLimiter};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Full view of one stock - GET /details/{symbol}
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDetails {
    pub symbol: String,
    pub company_name: Option<String>,
    pub last_price: Option<f64>,
    pub additional_info: Value,
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub symbol: String,
    pub company_name: Option<String>,
    pub last_price: Option<f64>,
}

/// GET /search response body
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<StockSummary>,
}

/// Read-side service shared by all API requests
pub struct QueryGateway {
    db: Arc<SqliteDb>,
    collection: String,
    api_keys_collection: String,
    rate_limiter: RateLimiter,
}

impl QueryGateway {
    pub fn new(
        db: Arc<SqliteDb>,
        collection: &str,
        api_keys_collection: &str,
        policy: RateLimitPolicy,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::new(db.clone(), api_keys_collection, policy),
            db,
            collection: collection.to_string(),
            api_keys_collection: api_keys_collection.to_string(),
        }
    }

    /// Look up one stock by exact symbol
    pub fn get_details(&self, symbol: &str, api_key: Option<&str>) -> Result<StockDetails> {
        self.verify_api_key(api_key)?;

        let stock = self
            .db
            .find_by_symbol(&self.collection, symbol)?
            .ok_or_else(|| AppError::NotFound("Stock not found.".to_string()))?;

        let summary = project(&stock);
        Ok(StockDetails {
            symbol: summary.symbol,
            company_name: summary.company_name,
            last_price: summary.last_price,
            additional_info: stock,
        })
    }

    /// Search by symbol or company name at the current time.
    ///
    /// `limit` is the raw query-string value; it is only parsed once the
    /// key has been authenticated and counted.
    pub fn search(
        &self,
        query: Option<&str>,
        limit: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<SearchResponse> {
        self.search_at(query, limit, api_key, Utc::now())
    }

    /// Search with an explicit clock reading for the rate limiter
    pub fn search_at(
        &self,
        query: Option<&str>,
        limit: Option<&str>,
        api_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SearchResponse> {
        let api_key = self.verify_api_key(api_key)?;
        self.rate_limiter.check(api_key, now)?;

        let query = match query {
            Some(q) if !q.is_empty() => q,
            _ => return Err(AppError::BadRequest("Query parameter is required.".to_string())),
        };
        let limit = parse_limit(limit)?;

        let hits = self.db.search(&self.collection, query, limit)?;
        if hits.is_empty() {
            return Err(AppError::NotFound("No records found.".to_string()));
        }

        info!("Search '{}' returned {} results", query, hits.len());
        Ok(SearchResponse {
            results: hits.iter().map(project).collect(),
        })
    }

    fn verify_api_key<'a>(&self, api_key: Option<&'a str>) -> Result<&'a str> {
        let api_key = api_key.ok_or(AppError::Unauthorized)?;
        match self.db.get_api_key(&self.api_keys_collection, api_key)? {
            Some(_) => Ok(api_key),
            None => Err(AppError::Unauthorized),
        }
    }
}

/// Result cap for a raw `limit` value. Absent means the default, 0 means
/// every match and a negative value counts by its magnitude.
fn parse_limit(raw: Option<&str>) -> Result<Option<usize>> {
    let Some(raw) = raw else {
        return Ok(Some(DEFAULT_SEARCH_LIMIT));
    };
    let n: i64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid limit '{}'.", raw)))?;

    Ok(usize::try_from(n.unsigned_abs()).ok().filter(|&n| n > 0))
}

/// Pull the summary fields out of a stored quote
fn project(doc: &Value) -> StockSummary {
    StockSummary {
        symbol: doc
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        company_name: doc
            .pointer("/info/companyName")
            .and_then(Value::as_str)
            .map(str::to_string),
        last_price: doc.pointer("/priceInfo/lastPrice").and_then(Value::as_f64),
    }
}
