use crate::analyzers::types::{Aggregation, Baselines, SegmentAccumulator, SegmentRecord};
use crate::analyzers::utility::median;
use crate::config::PipelineConfig;
use std::collections::BTreeMap;

/// Derives a [`SegmentRecord`] per segment and flags golden segments.
///
/// Segments with no vehicle median are dropped. The golden threshold is the
/// median unique-vehicle count across the remaining segments, clamped to
/// `[golden_min, golden_max]`.
pub fn compute_baselines(agg: &Aggregation, config: &PipelineConfig) -> Baselines {
    let mut segments: BTreeMap<String, SegmentRecord> = agg
        .segments
        .iter()
        .filter_map(|(id, acc)| segment_record(acc).map(|record| (id.clone(), record)))
        .collect();

    let counts: Vec<f64> = segments
        .values()
        .map(|s| s.unique_vehicle_count as f64)
        .collect();
    let golden_threshold = golden_threshold(&counts, config);

    for record in segments.values_mut() {
        record.is_golden = record.unique_vehicle_count as f64 >= golden_threshold;
    }

    Baselines {
        segments,
        golden_threshold,
    }
}

/// `clamp(median(counts), golden_min, golden_max)`; the lower bound when
/// there are no segments.
pub fn golden_threshold(unique_vehicle_counts: &[f64], config: &PipelineConfig) -> f64 {
    median(unique_vehicle_counts)
        .unwrap_or(config.golden_min)
        .clamp(config.golden_min, config.golden_max)
}

fn segment_record(acc: &SegmentAccumulator) -> Option<SegmentRecord> {
    let vehicle_medians: BTreeMap<String, f64> = acc
        .per_vehicle_metrics
        .iter()
        .filter_map(|(vehicle, metrics)| median(metrics).map(|m| (vehicle.clone(), m)))
        .collect();

    let per_vehicle: Vec<f64> = vehicle_medians.values().copied().collect();
    let baseline_median = median(&per_vehicle)?;

    Some(SegmentRecord {
        baseline_median,
        unique_vehicle_count: vehicle_medians.len(),
        is_golden: false,
        road_type: acc.road_type_votes.resolve(),
        vehicle_medians,
        pass_count: acc.pass_count,
        total_sample_count: acc.total_sample_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::RoadTypeVotes;
    use crate::pass::RoadType;

    fn accumulator(vehicles: &[(&str, &[f64])]) -> SegmentAccumulator {
        SegmentAccumulator {
            per_vehicle_metrics: vehicles
                .iter()
                .map(|(v, m)| (v.to_string(), m.to_vec()))
                .collect(),
            pass_count: vehicles.iter().map(|(_, m)| m.len() as u64).sum(),
            total_sample_count: 10.0,
            road_type_votes: RoadTypeVotes::default(),
        }
    }

    fn segment_with_vehicles(n: usize, metric: f64) -> SegmentAccumulator {
        let mut acc = SegmentAccumulator::default();
        for i in 0..n {
            acc.per_vehicle_metrics
                .insert(format!("v{i}"), vec![metric]);
        }
        acc.pass_count = n as u64;
        acc
    }

    #[test]
    fn test_baseline_is_median_of_vehicle_medians() {
        let mut agg = Aggregation::default();
        agg.segments.insert(
            "s1".into(),
            accumulator(&[("a", &[1.0, 3.0]), ("b", &[10.0]), ("c", &[4.0, 5.0, 6.0])]),
        );

        let baselines = compute_baselines(&agg, &PipelineConfig::default());
        let s1 = &baselines.segments["s1"];

        assert_eq!(s1.vehicle_medians["a"], 2.0);
        assert_eq!(s1.vehicle_medians["c"], 5.0);
        assert_eq!(s1.baseline_median, 5.0);
        assert_eq!(s1.unique_vehicle_count, 3);
    }

    #[test]
    fn test_segment_without_vehicles_is_dropped() {
        let mut agg = Aggregation::default();
        agg.segments.insert("empty".into(), SegmentAccumulator::default());
        agg.segments.insert("s1".into(), accumulator(&[("a", &[1.0])]));

        let baselines = compute_baselines(&agg, &PipelineConfig::default());

        assert!(!baselines.segments.contains_key("empty"));
        assert_eq!(baselines.segments.len(), 1);
    }

    #[test]
    fn test_golden_threshold_is_clamped() {
        let config = PipelineConfig::default();
        assert_eq!(golden_threshold(&[5.0, 5.0, 5.0], &config), 25.0);
        assert_eq!(golden_threshold(&[500.0], &config), 100.0);
        assert_eq!(golden_threshold(&[30.0, 40.0], &config), 35.0);
        assert_eq!(golden_threshold(&[], &config), 25.0);
    }

    #[test]
    fn test_golden_flag_follows_threshold() {
        let mut agg = Aggregation::default();
        agg.segments.insert("busy".into(), segment_with_vehicles(30, 2.0));
        agg.segments.insert("quiet".into(), segment_with_vehicles(3, 8.0));

        let baselines = compute_baselines(&agg, &PipelineConfig::default());

        assert_eq!(baselines.golden_threshold, 25.0);
        assert!(baselines.segments["busy"].is_golden);
        assert!(!baselines.segments["quiet"].is_golden);
        assert_eq!(baselines.golden_count(), 1);
    }

    #[test]
    fn test_road_type_carried_from_votes() {
        let mut acc = accumulator(&[("a", &[1.0])]);
        acc.road_type_votes = RoadTypeVotes {
            highway: 0,
            city: 2,
        };
        let mut agg = Aggregation::default();
        agg.segments.insert("s1".into(), acc);

        let baselines = compute_baselines(&agg, &PipelineConfig::default());
        assert_eq!(baselines.segments["s1"].road_type, Some(RoadType::City));
    }
}
