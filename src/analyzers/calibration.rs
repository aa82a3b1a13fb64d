use crate::analyzers::types::{Baselines, VehicleCalibration};
use crate::analyzers::utility::median;
use crate::config::PipelineConfig;
use std::collections::BTreeMap;

/// Derives a k-factor for every vehicle seen on any segment.
///
/// Vehicles observed on golden segments get the clamped median of
/// `baseline / vehicle_median` over those segments. Everyone else falls back
/// to the age heuristic and is marked provisional.
pub fn calibrate_vehicles(
    baselines: &Baselines,
    model_years: &BTreeMap<String, i32>,
    current_year: i32,
    config: &PipelineConfig,
) -> BTreeMap<String, VehicleCalibration> {
    let mut ratios: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for segment in baselines.segments.values() {
        for (vehicle, &vehicle_median) in &segment.vehicle_medians {
            let entry = ratios.entry(vehicle.as_str()).or_default();
            if !segment.is_golden {
                continue;
            }
            if is_usable(segment.baseline_median) && is_usable(vehicle_median) {
                entry.push(segment.baseline_median / vehicle_median);
            }
        }
    }

    ratios
        .into_iter()
        .map(|(vehicle, ratios)| {
            let calibration = match median(&ratios) {
                Some(ratio) => VehicleCalibration {
                    k_factor: ratio.clamp(config.k_min, config.k_max),
                    provisional: false,
                    golden_segments_used: ratios.len(),
                },
                None => provisional_calibration(
                    model_years.get(vehicle).copied(),
                    current_year,
                    config,
                ),
            };
            (vehicle.to_string(), calibration)
        })
        .collect()
}

/// Age-based prior: older vehicles are assumed to over-report roughness.
pub fn provisional_calibration(
    model_year: Option<i32>,
    current_year: i32,
    config: &PipelineConfig,
) -> VehicleCalibration {
    let age_years = model_year
        .map(|year| (current_year - year).max(0) as f64)
        .unwrap_or(0.0);
    let expected_amplification = 1.0 + (config.age_slope * age_years).min(config.age_cap);

    VehicleCalibration {
        k_factor: (1.0 / expected_amplification).clamp(config.k_min, config.k_max),
        provisional: true,
        golden_segments_used: 0,
    }
}

fn is_usable(v: f64) -> bool {
    v.is_finite() && v > 0.0
}
