//! Per-cycle fetch fan-out
//!
//! Every tracked entity is fetched as its own unit of failure: the batch
//! always yields one outcome per entity, in input order.

use super::FeedKind;
use crate::error::Result;
use crate::provider::QuoteProvider;
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use tracing::warn;

/// Result of fetching one entity in one cycle
#[derive(Debug)]
pub struct FetchOutcome {
    pub entity: String,
    pub payload: Result<Value>,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        self.payload.is_ok()
    }
}

/// Fetch all `entities` with at most `concurrency` requests in flight
/// (`None` = all at once)
pub async fn fetch_all(
    kind: FeedKind,
    provider: &dyn QuoteProvider,
    entities: &[String],
    concurrency: Option<usize>,
) -> Vec<FetchOutcome> {
    let limit = concurrency.unwrap_or(entities.len()).max(1);

    stream::iter(entities.iter().cloned())
        .map(|entity| async move {
            let payload = fetch_one(kind, provider, &entity).await;
            if let Err(e) = &payload {
                warn!("Error fetching data for {}: {}", entity, e);
            }
            FetchOutcome { entity, payload }
        })
        .buffered(limit)
        .collect()
        .await
}

async fn fetch_one(kind: FeedKind, provider: &dyn QuoteProvider, entity: &str) -> Result<Value> {
    match kind {
        FeedKind::Equities => provider.fetch_equity(entity).await,
        FeedKind::Indices => provider.fetch_index(entity).await,
        FeedKind::OptionChain => provider.fetch_option_chain(entity).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;

    fn entities(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn provider_for(names: &[&str]) -> MockProvider {
        names.iter().fold(MockProvider::new(), |p, name| {
            p.with_payload(name, MockProvider::equity_payload(name, name, 1.0))
        })
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_batch() {
        let names = ["TCS", "INFY", "WIPRO", "HDFCBANK", "ITC"];
        let provider = provider_for(&names).with_failure("WIPRO");

        let outcomes = fetch_all(FeedKind::Equities, &provider, &entities(&names), None).await;

        assert_eq!(outcomes.len(), 5);
        let order: Vec<&str> = outcomes.iter().map(|o| o.entity.as_str()).collect();
        assert_eq!(order, names);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 4);
        assert!(!outcomes[2].is_success());
    }

    #[tokio::test]
    async fn test_outcome_count_independent_of_concurrency_cap() {
        let names = ["A", "B", "C", "D", "E", "F", "G"];
        let provider = provider_for(&names).with_failure("D");

        for cap in [Some(1), Some(3), None] {
            let outcomes = fetch_all(FeedKind::Equities, &provider, &entities(&names), cap).await;
            assert_eq!(outcomes.len(), names.len());
            assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 6);
        }
    }

    #[tokio::test]
    async fn test_uncapped_batch_fetches_concurrently() {
        let names = ["A", "B", "C", "D", "E", "F", "G"];
        let provider = provider_for(&names);

        fetch_all(FeedKind::Equities, &provider, &entities(&names), None).await;

        assert_eq!(provider.peak_in_flight(), names.len());
    }

    #[tokio::test]
    async fn test_cap_bounds_requests_in_flight() {
        let names = ["A", "B", "C", "D", "E", "F", "G"];

        for cap in [1, 3] {
            let provider = provider_for(&names);
            let outcomes = fetch_all(FeedKind::Equities, &provider, &entities(&names), Some(cap)).await;

            assert_eq!(outcomes.len(), names.len());
            assert_eq!(provider.peak_in_flight(), cap);
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let provider = MockProvider::new();
        let outcomes = fetch_all(FeedKind::Indices, &provider, &[], None).await;
        assert!(outcomes.is_empty());
        assert_eq!(provider.calls(), 0);
    }
}
