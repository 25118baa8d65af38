//! Scheduler module for the NSE live feed
//!
//! Handles the long-running ingestion loops:
//! - Equities (all tracked symbols, every 5s)
//! - Indices (configured index list, every 5s)
//! - Option chain (one underlying, every 3s)

mod poller;

pub use poller::Poller;
