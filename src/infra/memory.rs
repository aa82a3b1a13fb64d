//! In-process pass and document store.
//!
//! Backs the test suite and local verification runs. Writes follow the same
//! merge semantics as the real store, and both sides can be told to fail.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::pass::RawPass;
use crate::services::document_store::{DocumentStore, DocumentWrite, Fields};
use crate::services::pass_store::{PassStore, QueryStrategy};

#[derive(Debug, Default)]
pub struct MemoryStore {
    passes: BTreeMap<String, Vec<RawPass>>,
    failing_strategies: HashSet<QueryStrategy>,
    fail_commit_at: Option<usize>,
    documents: Mutex<BTreeMap<String, Fields>>,
    commit_attempts: Mutex<usize>,
    commits: Mutex<Vec<usize>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn with_passes(mut self, city_id: &str, passes: Vec<RawPass>) -> Self {
        self.passes
            .entry(city_id.to_string())
            .or_default()
            .extend(passes);
        self
    }

    /// Makes every query using `strategy` fail.
    pub fn fail_strategy(mut self, strategy: QueryStrategy) -> Self {
        self.failing_strategies.insert(strategy);
        self
    }

    /// Makes the `n`-th commit (1-based, counted across all families) fail.
    pub fn fail_commit_at(mut self, n: usize) -> Self {
        self.fail_commit_at = Some(n);
        self
    }

    pub fn document(&self, path: &str) -> Option<Fields> {
        lock(&self.documents).get(path).cloned()
    }

    pub fn documents(&self) -> BTreeMap<String, Fields> {
        lock(&self.documents).clone()
    }

    pub fn document_count(&self) -> usize {
        lock(&self.documents).len()
    }

    /// Sizes of the successful commits, in order.
    pub fn commit_sizes(&self) -> Vec<usize> {
        lock(&self.commits).clone()
    }
}

#[async_trait]
impl PassStore for MemoryStore {
    async fn query(
        &self,
        city_id: &str,
        strategy: QueryStrategy,
        cutoff_ms: f64,
    ) -> Result<Vec<RawPass>, StoreError> {
        if self.failing_strategies.contains(&strategy) {
            return Err(StoreError::Unavailable(format!("{strategy} disabled")));
        }

        let passes = self.passes.get(city_id).map(Vec::as_slice).unwrap_or(&[]);
        let selected = match strategy {
            // Server-side range filters drop documents that lack the field.
            QueryStrategy::IndexedWindow => passes
                .iter()
                .filter(|p| p.event_time_ms.is_some_and(|t| t >= cutoff_ms))
                .cloned()
                .collect(),
            QueryStrategy::CityScan => passes.to_vec(),
        };
        Ok(selected)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn commit(&self, writes: &[DocumentWrite]) -> Result<(), StoreError> {
        let attempt = {
            let mut attempts = lock(&self.commit_attempts);
            *attempts += 1;
            *attempts
        };
        if self.fail_commit_at == Some(attempt) {
            return Err(StoreError::Unavailable(format!("commit {attempt} rejected")));
        }

        let mut commits = lock(&self.commits);

        let mut documents = lock(&self.documents);
        for write in writes {
            let doc = documents.entry(write.path_string()).or_default();
            for (key, value) in &write.fields {
                doc.insert(key.clone(), value.clone());
            }
        }
        commits.push(writes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::document_store::FieldValue;

    fn write(path: &str, key: &str, value: f64) -> DocumentWrite {
        DocumentWrite {
            path: path.split('/').map(String::from).collect(),
            fields: Fields::from([(key.to_string(), FieldValue::Double(value))]),
        }
    }

    #[tokio::test]
    async fn test_commit_merges_fields() {
        let store = MemoryStore::default();
        store.commit(&[write("c/d", "a", 1.0)]).await.unwrap();
        store
            .commit(&[write("c/d", "b", 2.0), write("c/d", "a", 3.0)])
            .await
            .unwrap();

        let doc = store.document("c/d").unwrap();
        assert_eq!(doc["a"], FieldValue::Double(3.0));
        assert_eq!(doc["b"], FieldValue::Double(2.0));
        assert_eq!(store.commit_sizes(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_only_the_chosen_commit_fails() {
        let store = MemoryStore::default().fail_commit_at(2);

        store.commit(&[write("c/a", "x", 1.0)]).await.unwrap();
        assert!(store.commit(&[write("c/b", "x", 1.0)]).await.is_err());
        store.commit(&[write("c/c", "x", 1.0)]).await.unwrap();

        assert_eq!(store.commit_sizes(), vec![1, 1]);
        assert!(store.document("c/b").is_none());
        assert!(store.document("c/c").is_some());
    }

    #[tokio::test]
    async fn test_indexed_window_drops_undated_passes() {
        let dated = RawPass {
            event_time_ms: Some(100.0),
            ..Default::default()
        };
        let store = MemoryStore::default().with_passes("c1", vec![dated, RawPass::default()]);

        let windowed = store
            .query("c1", QueryStrategy::IndexedWindow, 50.0)
            .await
            .unwrap();
        let scanned = store.query("c1", QueryStrategy::CityScan, 50.0).await.unwrap();

        assert_eq!(windowed.len(), 1);
        assert_eq!(scanned.len(), 2);
        assert!(store.query("other", QueryStrategy::CityScan, 0.0).await.unwrap().is_empty());
    }
}
