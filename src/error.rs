//! Typed errors for the store seams.
//!
//! Input-shape problems never show up here; they are counted by the
//! aggregator and reported in the run summary.

use thiserror::Error;

use crate::services::pass_store::QueryStrategy;

/// Failure talking to a pass store or document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One failed query attempt, kept for the final diagnostic.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: QueryStrategy,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("all pass query strategies failed: {}", describe(.0))]
    Exhausted(Vec<StrategyFailure>),
}

fn describe(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.strategy, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("{family} batch {batch} of {total} failed: {source}")]
    Batch {
        family: &'static str,
        batch: usize,
        total: usize,
        #[source]
        source: StoreError,
    },
}
