use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::File;
use std::io::Read;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::pass::RawPass;
use crate::services::pass_store::{PassStore, QueryStrategy};

/// Pass store backed by a local CSV export.
///
/// Columns use the store's field names (`segmentId`, `vehicleHash`,
/// `eventTimeMs`, ...). Rows with a `cityId` only answer queries for that
/// city; rows without one answer every query. There is no index, so every
/// strategy reads the whole file and the aggregator applies the window.
pub struct CsvPassStore {
    rows: Vec<RawPass>,
}

impl CsvPassStore {
    pub fn load(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening pass file '{path}'"))?;
        let store =
            Self::from_reader(file).with_context(|| format!("reading pass file '{path}'"))?;
        debug!(path, rows = store.len(), "Loaded pass CSV");
        Ok(store)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(Self {
            rows: read_passes(reader)?,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Deserializes every row of a pass CSV.
///
/// Numeric cells that do not parse read as absent. A row that cannot be
/// decoded at all becomes an empty pass, which the aggregator counts as
/// skipped. Only I/O failures abort the read.
pub fn read_passes<R: Read>(reader: R) -> Result<Vec<RawPass>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();

    for result in rdr.deserialize::<RawPass>() {
        match result {
            Ok(record) => rows.push(record),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Undecodable pass row");
                rows.push(RawPass::default());
            }
        }
    }

    Ok(rows)
}

#[async_trait]
impl PassStore for CsvPassStore {
    async fn query(
        &self,
        city_id: &str,
        _strategy: QueryStrategy,
        _cutoff_ms: f64,
    ) -> Result<Vec<RawPass>, StoreError> {
        Ok(self
            .rows
            .iter()
            .filter(|p| p.city_id.as_deref().is_none_or(|c| c == city_id))
            .cloned()
            .collect())
    }
}
