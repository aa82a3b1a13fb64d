//! Data types passed between the pipeline stages.
//!
//! Each stage takes the previous stage's output by reference and returns a
//! fresh value; nothing here outlives a run.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::analyzers::grade::Grade;
use crate::pass::RoadType;

/// Road-type votes collected for one segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoadTypeVotes {
    pub highway: u64,
    pub city: u64,
}

impl RoadTypeVotes {
    pub fn record(&mut self, road_type: RoadType) {
        match road_type {
            RoadType::Highway => self.highway += 1,
            RoadType::City => self.city += 1,
        }
    }

    /// Majority vote; highway wins ties, `None` without any votes.
    pub fn resolve(&self) -> Option<RoadType> {
        if self.highway + self.city == 0 {
            None
        } else if self.highway >= self.city {
            Some(RoadType::Highway)
        } else {
            Some(RoadType::City)
        }
    }
}

/// Per-segment working state built by the aggregator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentAccumulator {
    pub per_vehicle_metrics: BTreeMap<String, Vec<f64>>,
    pub pass_count: u64,
    pub total_sample_count: f64,
    pub road_type_votes: RoadTypeVotes,
}

/// Output of the aggregation stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub segments: BTreeMap<String, SegmentAccumulator>,
    /// First model year seen per vehicle.
    pub model_years: BTreeMap<String, i32>,
    /// Passes handed to the aggregator.
    pub total_passes: u64,
    /// Passes older than the lookback cutoff.
    pub stale_passes: u64,
    /// Passes dropped for a missing key or an unusable metric.
    pub skipped_passes: u64,
}

impl Aggregation {
    pub fn admitted_passes(&self) -> u64 {
        self.total_passes - self.stale_passes - self.skipped_passes
    }
}

/// Baseline statistics for one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    pub baseline_median: f64,
    pub unique_vehicle_count: usize,
    pub is_golden: bool,
    pub road_type: Option<RoadType>,
    pub vehicle_medians: BTreeMap<String, f64>,
    pub pass_count: u64,
    pub total_sample_count: f64,
}

/// Output of the baseline stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Baselines {
    pub segments: BTreeMap<String, SegmentRecord>,
    pub golden_threshold: f64,
}

impl Baselines {
    pub fn golden_count(&self) -> usize {
        self.segments.values().filter(|s| s.is_golden).count()
    }
}

/// Multiplicative sensor correction for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleCalibration {
    pub k_factor: f64,
    /// Set when the factor comes from the age heuristic; always matches
    /// `golden_segments_used == 0`.
    pub provisional: bool,
    pub golden_segments_used: usize,
}

/// Final calibrated, ranked and graded roughness for one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSegmentRecord {
    pub normalized_median: f64,
    pub percentile_all: f64,
    pub grade_all: Grade,
    pub road_type: Option<RoadType>,
    pub percentile_within_type: Option<f64>,
    pub grade_within_type: Option<Grade>,
    pub sample_count: f64,
    pub unique_vehicle_count: usize,
}
