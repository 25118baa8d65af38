//! NSE Live Feed - market data ingestion and query API
//!
//! Polls the NSE website for equity quotes, index constituents and the
//! NIFTY option chain, keeps the latest snapshot of each record in a local
//! store, and serves rate-limited lookups over HTTP.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod feeds;
pub mod gateway;
pub mod provider;
pub mod scheduler;
pub mod state;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
///
/// `RUST_LOG` sets the filter; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nse_livefeed=info,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json().with_current_span(false)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
