//! Scriptable in-process provider for tests

use crate::error::{AppError, Result};
use crate::provider::QuoteProvider;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct MockProvider {
    payloads: Mutex<HashMap<String, Value>>,
    failing: Mutex<HashSet<String>>,
    rejecting: Mutex<bool>,
    bootstraps: AtomicUsize,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equity payload shaped like NSE's quote-equity response
    pub fn equity_payload(symbol: &str, company: &str, last_price: f64) -> Value {
        json!({
            "info": {"symbol": symbol, "companyName": company},
            "priceInfo": {"lastPrice": last_price},
        })
    }

    pub fn with_payload(self, entity: &str, payload: Value) -> Self {
        self.payloads.lock().insert(entity.to_string(), payload);
        self
    }

    pub fn with_failure(self, entity: &str) -> Self {
        self.failing.lock().insert(entity.to_string());
        self
    }

    /// Answer every data call with HTTP 401 until cleared
    pub fn set_rejecting(&self, rejecting: bool) {
        *self.rejecting.lock() = rejecting;
    }

    pub fn bootstraps(&self) -> usize {
        self.bootstraps.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of equity fetches that were in progress at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, entity: &str) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if *self.rejecting.lock() {
            return Err(AppError::Upstream {
                status: 401,
                url: format!("mock://{}", entity),
            });
        }
        if self.failing.lock().contains(entity) {
            return Err(AppError::MalformedPayload(format!("mock failure for {}", entity)));
        }
        self.payloads
            .lock()
            .get(entity)
            .cloned()
            .ok_or_else(|| AppError::Upstream {
                status: 404,
                url: format!("mock://{}", entity),
            })
    }
}

#[async_trait]
impl QuoteProvider for MockProvider {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn bootstrap(&self) -> Result<()> {
        self.bootstraps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_equity(&self, symbol: &str) -> Result<Value> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        // yield so concurrent fetches actually interleave
        tokio::task::yield_now().await;
        let result = self.respond(symbol);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn fetch_index(&self, index: &str) -> Result<Value> {
        self.respond(index)
    }

    async fn fetch_option_chain(&self, symbol: &str) -> Result<Value> {
        self.respond(symbol)
    }
}
