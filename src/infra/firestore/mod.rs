//! Firestore REST adapter.
//!
//! Passes are read with `documents:runQuery` (cursor paged) and artifacts
//! are written with `documents:commit`, one commit per batch.

mod client;
pub mod query;
pub mod value;

pub use client::{FirestoreClient, FirestoreSettings};
