//! Per-key request rate limiting for the query API
//!
//! A request is rejected when the key's previous accepted request is less
//! than one window old and the key has already used up its ceiling. Every
//! accepted request restarts the window and bumps the counter; the counter
//! is never reset. In practice a key that reached its ceiling gets one
//! request per idle window.

use crate::db::sqlite::RequestDecision;
use crate::db::SqliteDb;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Rate limit settings
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            window: DEFAULT_WINDOW,
        }
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Time until a rejected key may try again
    pub fn retry_after(&self, last_request_time: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        let elapsed = (now - last_request_time).to_std().unwrap_or(Duration::ZERO);
        self.window.saturating_sub(elapsed)
    }
}

/// Store-backed limiter keyed by API key
pub struct RateLimiter {
    db: Arc<SqliteDb>,
    collection: String,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(db: Arc<SqliteDb>, collection: &str, policy: RateLimitPolicy) -> Self {
        Self {
            db,
            collection: collection.to_string(),
            policy,
        }
    }

    /// Count one request for `api_key` at `now`, or reject it
    pub fn check(&self, api_key: &str, now: DateTime<Utc>) -> Result<()> {
        let decision = self.db.try_record_request(
            &self.collection,
            api_key,
            now,
            self.policy.window_ms(),
            self.policy.limit,
        )?;

        match decision {
            RequestDecision::Accepted => Ok(()),
            RequestDecision::UnknownKey => Err(AppError::Unauthorized),
            RequestDecision::Limited { last_request_time } => {
                let retry_after = self.policy.retry_after(last_request_time, now);
                warn!("Rate limit exceeded, retry after {:?}ms", retry_after.as_millis());
                Err(AppError::TooManyRequests { retry_after })
            }
        }
    }
}
