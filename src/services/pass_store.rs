//! Trait and fallback chain for reading passes out of a pass store.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::error::{QueryError, StoreError, StrategyFailure};
use crate::pass::RawPass;

/// Ways of asking the store for a city's passes, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStrategy {
    /// `cityId == X AND eventTimeMs >= cutoff`, ordered by time. Needs a
    /// composite index.
    IndexedWindow,
    /// `cityId == X` only; the window is applied by the aggregator.
    CityScan,
}

impl QueryStrategy {
    pub const FALLBACK_ORDER: [QueryStrategy; 2] =
        [QueryStrategy::IndexedWindow, QueryStrategy::CityScan];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStrategy::IndexedWindow => "indexed_window",
            QueryStrategy::CityScan => "city_scan",
        }
    }
}

impl fmt::Display for QueryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstraction over a pass store (Firestore, a CSV replay, memory).
#[async_trait]
pub trait PassStore: Send + Sync {
    /// Returns every pass for `city_id` the strategy selects.
    async fn query(
        &self,
        city_id: &str,
        strategy: QueryStrategy,
        cutoff_ms: f64,
    ) -> Result<Vec<RawPass>, StoreError>;
}

/// Passes plus the strategy that produced them.
#[derive(Debug)]
pub struct FetchedPasses {
    pub passes: Vec<RawPass>,
    pub strategy: QueryStrategy,
}

/// Tries each strategy in [`QueryStrategy::FALLBACK_ORDER`] until one succeeds.
pub async fn fetch_passes<S: PassStore + ?Sized>(
    store: &S,
    city_id: &str,
    cutoff_ms: f64,
) -> Result<FetchedPasses, QueryError> {
    fetch_passes_with(store, city_id, cutoff_ms, &QueryStrategy::FALLBACK_ORDER).await
}

pub async fn fetch_passes_with<S: PassStore + ?Sized>(
    store: &S,
    city_id: &str,
    cutoff_ms: f64,
    strategies: &[QueryStrategy],
) -> Result<FetchedPasses, QueryError> {
    let mut failures = Vec::new();

    for &strategy in strategies {
        match store.query(city_id, strategy, cutoff_ms).await {
            Ok(passes) => {
                info!(%strategy, passes = passes.len(), "Pass query succeeded");
                return Ok(FetchedPasses { passes, strategy });
            }
            Err(e) => {
                warn!(%strategy, error = %e, "Pass query failed, trying next strategy");
                failures.push(StrategyFailure {
                    strategy,
                    message: e.to_string(),
                });
            }
        }
    }

    Err(QueryError::Exhausted(failures))
}
