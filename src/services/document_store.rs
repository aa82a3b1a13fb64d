//! Trait and value types for the target document store.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::StoreError;

/// A field value in a written document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    /// Resolved by the store to its commit time.
    ServerTimestamp,
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        FieldValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// A merge-upsert of one document: only `fields` are replaced, any other
/// field already on the document is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    /// Alternating collection / document ids.
    pub path: Vec<String>,
    pub fields: Fields,
}

impl DocumentWrite {
    pub fn path_string(&self) -> String {
        self.path.join("/")
    }
}

/// Abstraction over a document store that accepts atomic write batches.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Applies every write in `writes` atomically.
    async fn commit(&self, writes: &[DocumentWrite]) -> Result<(), StoreError>;
}
