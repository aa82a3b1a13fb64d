//! Persistence of the derived artifacts.
//!
//! Each record family is turned into merge-upserts, split into batches no
//! larger than the store's commit cap, and committed one batch at a time.
//! A failed batch stops the family with the error surfaced; batches already
//! committed stay committed.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::analyzers::types::{Baselines, NormalizedSegmentRecord, VehicleCalibration};
use crate::error::WriteError;
use crate::services::document_store::{DocumentStore, DocumentWrite, FieldValue, Fields};

/// The three artifact families, in write order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFamily {
    SegmentBaselines,
    VehicleCalibrations,
    SegmentNormalized,
}

impl RecordFamily {
    pub fn collection(&self) -> &'static str {
        match self {
            RecordFamily::SegmentBaselines => "segmentBaselines",
            RecordFamily::VehicleCalibrations => "vehicleCalibrations",
            RecordFamily::SegmentNormalized => "segmentNormalized",
        }
    }
}

/// Logs a serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fields<const N: usize>(entries: [(&str, FieldValue); N]) -> Fields {
    let mut fields: Fields = entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    fields.insert("updatedAt".to_string(), FieldValue::ServerTimestamp);
    fields
}

/// `segmentBaselines/{city}/{date}/{segment}`
pub fn baseline_writes(city_id: &str, run_date: &str, baselines: &Baselines) -> Vec<DocumentWrite> {
    baselines
        .segments
        .iter()
        .map(|(segment_id, record)| DocumentWrite {
            path: vec![
                RecordFamily::SegmentBaselines.collection().to_string(),
                city_id.to_string(),
                run_date.to_string(),
                segment_id.clone(),
            ],
            fields: fields([
                ("baselineMedian", record.baseline_median.into()),
                ("uniqueVehicles", record.unique_vehicle_count.into()),
                ("passCount", record.pass_count.into()),
                ("isGolden", record.is_golden.into()),
                ("roadType", record.road_type.map(|t| t.as_str()).into()),
            ]),
        })
        .collect()
}

/// `vehicleCalibrations/{city}/vehicles/{vehicle}`
pub fn calibration_writes(
    city_id: &str,
    calibrations: &BTreeMap<String, VehicleCalibration>,
) -> Vec<DocumentWrite> {
    calibrations
        .iter()
        .map(|(vehicle, cal)| DocumentWrite {
            path: vec![
                RecordFamily::VehicleCalibrations.collection().to_string(),
                city_id.to_string(),
                "vehicles".to_string(),
                vehicle.clone(),
            ],
            fields: fields([
                ("kFactor", cal.k_factor.into()),
                ("goldenSegmentsUsed", cal.golden_segments_used.into()),
                ("provisionalUsed", cal.provisional.into()),
            ]),
        })
        .collect()
}

/// `segmentNormalized/{city}/{date}/{segment}`
pub fn normalized_writes(
    city_id: &str,
    run_date: &str,
    normalized: &BTreeMap<String, NormalizedSegmentRecord>,
) -> Vec<DocumentWrite> {
    normalized
        .iter()
        .map(|(segment_id, record)| DocumentWrite {
            path: vec![
                RecordFamily::SegmentNormalized.collection().to_string(),
                city_id.to_string(),
                run_date.to_string(),
                segment_id.clone(),
            ],
            fields: fields([
                ("normalizedMedian", record.normalized_median.into()),
                ("percentileAll", record.percentile_all.into()),
                ("gradeAll", record.grade_all.as_str().into()),
                ("roadType", record.road_type.map(|t| t.as_str()).into()),
                ("percentileWithinType", record.percentile_within_type.into()),
                (
                    "gradeWithinType",
                    record.grade_within_type.map(|g| g.as_str()).into(),
                ),
                ("sampleCount", record.sample_count.into()),
                ("uniqueVehicles", record.unique_vehicle_count.into()),
            ]),
        })
        .collect()
}

/// Documents and batches written (or, in a dry run, that would be written)
/// for one family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FamilyWriteSummary {
    pub documents: usize,
    pub batches: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub dry_run: bool,
    pub segment_baselines: FamilyWriteSummary,
    pub vehicle_calibrations: FamilyWriteSummary,
    pub segment_normalized: FamilyWriteSummary,
}

/// Commits `writes` in sequential batches of at most `batch_size`.
///
/// `store` of `None` is a dry run: batches are counted, nothing is sent.
pub async fn write_family<S: DocumentStore + ?Sized>(
    store: Option<&S>,
    family: RecordFamily,
    writes: &[DocumentWrite],
    batch_size: usize,
) -> Result<FamilyWriteSummary, WriteError> {
    let batch_size = batch_size.max(1);
    let total = writes.len().div_ceil(batch_size);

    let Some(store) = store else {
        info!(
            family = family.collection(),
            documents = writes.len(),
            batches = total,
            "Dry run, skipping writes"
        );
        return Ok(FamilyWriteSummary {
            documents: writes.len(),
            batches: total,
        });
    };

    for (i, batch) in writes.chunks(batch_size).enumerate() {
        store
            .commit(batch)
            .await
            .map_err(|source| WriteError::Batch {
                family: family.collection(),
                batch: i + 1,
                total,
                source,
            })?;
        debug!(
            family = family.collection(),
            batch = i + 1,
            total,
            size = batch.len(),
            "Batch committed"
        );
    }

    info!(
        family = family.collection(),
        documents = writes.len(),
        batches = total,
        "Family written"
    );

    Ok(FamilyWriteSummary {
        documents: writes.len(),
        batches: total,
    })
}

/// Writes baselines, calibrations and normalized records for one city and
/// run date, stopping at the first failed family.
pub async fn write_artifacts<S: DocumentStore + ?Sized>(
    store: Option<&S>,
    city_id: &str,
    run_date: &str,
    baselines: &Baselines,
    calibrations: &BTreeMap<String, VehicleCalibration>,
    normalized: &BTreeMap<String, NormalizedSegmentRecord>,
    batch_size: usize,
) -> Result<WriteSummary, WriteError> {
    let segment_baselines = write_family(
        store,
        RecordFamily::SegmentBaselines,
        &baseline_writes(city_id, run_date, baselines),
        batch_size,
    )
    .await?;

    let vehicle_calibrations = write_family(
        store,
        RecordFamily::VehicleCalibrations,
        &calibration_writes(city_id, calibrations),
        batch_size,
    )
    .await?;

    let segment_normalized = write_family(
        store,
        RecordFamily::SegmentNormalized,
        &normalized_writes(city_id, run_date, normalized),
        batch_size,
    )
    .await?;

    Ok(WriteSummary {
        dry_run: store.is_none(),
        segment_baselines,
        vehicle_calibrations,
        segment_normalized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::grade::Grade;
    use crate::analyzers::types::SegmentRecord;
    use crate::infra::memory::MemoryStore;
    use crate::pass::RoadType;

    fn baselines(n: usize) -> Baselines {
        let segments = (0..n)
            .map(|i| {
                (
                    format!("seg-{i:04}"),
                    SegmentRecord {
                        baseline_median: 1.5,
                        unique_vehicle_count: 3,
                        is_golden: false,
                        road_type: Some(RoadType::City),
                        vehicle_medians: BTreeMap::new(),
                        pass_count: 4,
                        total_sample_count: 40.0,
                    },
                )
            })
            .collect();
        Baselines {
            segments,
            golden_threshold: 25.0,
        }
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&WriteSummary::default()).unwrap();
    }

    #[test]
    fn test_baseline_document_shape() {
        let writes = baseline_writes("nyc", "2026-10-18", &baselines(1));

        assert_eq!(writes.len(), 1);
        assert_eq!(
            writes[0].path_string(),
            "segmentBaselines/nyc/2026-10-18/seg-0000"
        );
        let f = &writes[0].fields;
        assert_eq!(f["baselineMedian"], FieldValue::Double(1.5));
        assert_eq!(f["uniqueVehicles"], FieldValue::Integer(3));
        assert_eq!(f["passCount"], FieldValue::Integer(4));
        assert_eq!(f["isGolden"], FieldValue::Bool(false));
        assert_eq!(f["roadType"], FieldValue::String("city".into()));
        assert_eq!(f["updatedAt"], FieldValue::ServerTimestamp);
    }

    #[test]
    fn test_calibration_document_shape() {
        let calibrations = BTreeMap::from([(
            "veh".to_string(),
            VehicleCalibration {
                k_factor: 0.5,
                provisional: true,
                golden_segments_used: 0,
            },
        )]);

        let writes = calibration_writes("nyc", &calibrations);

        assert_eq!(writes[0].path_string(), "vehicleCalibrations/nyc/vehicles/veh");
        assert_eq!(writes[0].fields["kFactor"], FieldValue::Double(0.5));
        assert_eq!(writes[0].fields["provisionalUsed"], FieldValue::Bool(true));
        assert_eq!(writes[0].fields["goldenSegmentsUsed"], FieldValue::Integer(0));
    }

    #[test]
    fn test_normalized_document_nulls_without_type() {
        let normalized = BTreeMap::from([(
            "s".to_string(),
            NormalizedSegmentRecord {
                normalized_median: 2.0,
                percentile_all: 100.0,
                grade_all: Grade::A,
                road_type: None,
                percentile_within_type: None,
                grade_within_type: None,
                sample_count: 12.0,
                unique_vehicle_count: 2,
            },
        )]);

        let writes = normalized_writes("nyc", "2026-10-18", &normalized);
        let f = &writes[0].fields;

        assert_eq!(f["gradeAll"], FieldValue::String("A".into()));
        assert_eq!(f["roadType"], FieldValue::Null);
        assert_eq!(f["percentileWithinType"], FieldValue::Null);
        assert_eq!(f["gradeWithinType"], FieldValue::Null);
        assert_eq!(f["sampleCount"], FieldValue::Double(12.0));
    }

    #[tokio::test]
    async fn test_batches_respect_size() {
        let store = MemoryStore::default();
        let writes = baseline_writes("nyc", "d", &baselines(901));

        let summary = write_family(Some(&store), RecordFamily::SegmentBaselines, &writes, 400)
            .await
            .unwrap();

        assert_eq!(summary.batches, 3);
        assert_eq!(store.commit_sizes(), vec![400, 400, 101]);
        assert_eq!(store.document_count(), 901);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let writes = baseline_writes("nyc", "d", &baselines(10));

        let summary = write_family::<MemoryStore>(None, RecordFamily::SegmentBaselines, &writes, 4)
            .await
            .unwrap();

        assert_eq!(summary.documents, 10);
        assert_eq!(summary.batches, 3);
    }

    #[tokio::test]
    async fn test_failed_batch_surfaces_error() {
        let store = MemoryStore::default().fail_commit_at(2);
        let writes = baseline_writes("nyc", "d", &baselines(10));

        let err = write_family(Some(&store), RecordFamily::SegmentBaselines, &writes, 4)
            .await
            .unwrap_err();

        let WriteError::Batch { batch, total, .. } = err;
        assert_eq!(batch, 2);
        assert_eq!(total, 3);
        assert_eq!(store.document_count(), 4);
    }
}
