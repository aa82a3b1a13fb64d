use crate::analyzers::grade::grade;
use crate::analyzers::types::{Baselines, NormalizedSegmentRecord, VehicleCalibration};
use crate::analyzers::utility::{median, percentile_rank, sort_ascending};
use crate::pass::RoadType;
use std::collections::BTreeMap;

/// Applies vehicle calibration to every segment, then ranks and grades the
/// calibrated medians globally and within each road type.
///
/// Vehicles without a calibration use a k-factor of 1. Segments with no
/// calibrated values are left out.
pub fn normalize_segments(
    baselines: &Baselines,
    calibrations: &BTreeMap<String, VehicleCalibration>,
) -> BTreeMap<String, NormalizedSegmentRecord> {
    let medians: Vec<(&str, f64)> = baselines
        .segments
        .iter()
        .filter_map(|(id, segment)| {
            let calibrated: Vec<f64> = segment
                .vehicle_medians
                .iter()
                .map(|(vehicle, m)| {
                    let k = calibrations.get(vehicle).map_or(1.0, |c| c.k_factor);
                    m * k
                })
                .collect();
            median(&calibrated).map(|m| (id.as_str(), m))
        })
        .collect();

    let mut all: Vec<f64> = medians.iter().map(|(_, m)| *m).collect();
    sort_ascending(&mut all);

    let mut by_type: BTreeMap<RoadType, Vec<f64>> = BTreeMap::new();
    for (id, m) in &medians {
        if let Some(road_type) = baselines.segments[*id].road_type {
            by_type.entry(road_type).or_default().push(*m);
        }
    }
    for values in by_type.values_mut() {
        sort_ascending(values);
    }

    medians
        .into_iter()
        .map(|(id, normalized_median)| {
            let segment = &baselines.segments[id];
            let percentile_all = percentile_rank(&all, normalized_median);
            let percentile_within_type = segment
                .road_type
                .and_then(|t| by_type.get(&t))
                .map(|sorted| percentile_rank(sorted, normalized_median));

            let record = NormalizedSegmentRecord {
                normalized_median,
                percentile_all,
                grade_all: grade(percentile_all),
                road_type: segment.road_type,
                percentile_within_type,
                grade_within_type: percentile_within_type.map(grade),
                sample_count: segment.total_sample_count,
                unique_vehicle_count: segment.unique_vehicle_count,
            };
            (id.to_string(), record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::grade::Grade;
    use crate::analyzers::types::SegmentRecord;

    fn segment(road_type: Option<RoadType>, vehicles: &[(&str, f64)]) -> SegmentRecord {
        SegmentRecord {
            baseline_median: 0.0,
            unique_vehicle_count: vehicles.len(),
            is_golden: false,
            road_type,
            vehicle_medians: vehicles.iter().map(|(v, m)| (v.to_string(), *m)).collect(),
            pass_count: vehicles.len() as u64,
            total_sample_count: 7.0,
        }
    }

    fn calibration(k: f64) -> VehicleCalibration {
        VehicleCalibration {
            k_factor: k,
            provisional: false,
            golden_segments_used: 1,
        }
    }

    #[test]
    fn test_calibration_applied_before_median() {
        let baselines = Baselines {
            segments: BTreeMap::from([(
                "s1".to_string(),
                segment(None, &[("a", 16.0), ("b", 8.0), ("c", 2.0)]),
            )]),
            golden_threshold: 25.0,
        };
        let calibrations = BTreeMap::from([("a".to_string(), calibration(0.5))]);

        let out = normalize_segments(&baselines, &calibrations);

        // a -> 8.0, b -> 8.0 (uncalibrated), c -> 2.0
        assert_eq!(out["s1"].normalized_median, 8.0);
        assert_eq!(out["s1"].percentile_all, 100.0);
        assert_eq!(out["s1"].sample_count, 7.0);
    }

    #[test]
    fn test_ranks_globally_and_within_type() {
        let baselines = Baselines {
            segments: BTreeMap::from([
                ("h1".to_string(), segment(Some(RoadType::Highway), &[("a", 1.0)])),
                ("h2".to_string(), segment(Some(RoadType::Highway), &[("a", 3.0)])),
                ("c1".to_string(), segment(Some(RoadType::City), &[("a", 2.0)])),
                ("c2".to_string(), segment(Some(RoadType::City), &[("a", 4.0)])),
                ("u1".to_string(), segment(None, &[("a", 5.0)])),
            ]),
            golden_threshold: 25.0,
        };

        let out = normalize_segments(&baselines, &BTreeMap::new());

        assert_eq!(out["h1"].percentile_all, 0.0);
        assert_eq!(out["c1"].percentile_all, 25.0);
        assert_eq!(out["h2"].percentile_all, 50.0);
        assert_eq!(out["u1"].percentile_all, 100.0);
        assert_eq!(out["u1"].grade_all, Grade::A);
        assert_eq!(out["h1"].grade_all, Grade::F);

        assert_eq!(out["h1"].percentile_within_type, Some(0.0));
        assert_eq!(out["h2"].percentile_within_type, Some(100.0));
        assert_eq!(out["c2"].grade_within_type, Some(Grade::A));
        assert_eq!(out["u1"].percentile_within_type, None);
        assert_eq!(out["u1"].grade_within_type, None);
    }

    #[test]
    fn test_segment_without_values_is_left_out() {
        let baselines = Baselines {
            segments: BTreeMap::from([
                ("empty".to_string(), segment(None, &[])),
                ("s1".to_string(), segment(None, &[("a", 1.0)])),
            ]),
            golden_threshold: 25.0,
        };

        let out = normalize_segments(&baselines, &BTreeMap::new());

        assert!(!out.contains_key("empty"));
        assert_eq!(out.len(), 1);
    }
}
