use crate::pass::RawPass;

/// Scalar roughness extracted from one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassMetric {
    pub metric: f64,
    pub sample_count: f64,
}

/// Energy per sample for a pass, or `None` when the energy or sample count
/// is missing, non-finite, or the sample count is not positive.
pub fn extract_metric(pass: &RawPass) -> Option<PassMetric> {
    let energy = pass.energy().filter(|e| e.is_finite())?;
    let sample_count = pass.sample_count.filter(|n| n.is_finite() && *n > 0.0)?;

    Some(PassMetric {
        metric: energy / sample_count,
        sample_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(energy: Option<f64>, samples: Option<f64>) -> RawPass {
        RawPass {
            roughness_energy_sum: energy,
            sample_count: samples,
            ..Default::default()
        }
    }

    #[test]
    fn test_metric_is_energy_per_sample() {
        let m = extract_metric(&pass(Some(20.0), Some(4.0))).unwrap();
        assert_eq!(m.metric, 5.0);
        assert_eq!(m.sample_count, 4.0);
    }

    #[test]
    fn test_unusable_inputs() {
        assert_eq!(extract_metric(&pass(Some(20.0), Some(0.0))), None);
        assert_eq!(extract_metric(&pass(Some(20.0), Some(-2.0))), None);
        assert_eq!(extract_metric(&pass(Some(20.0), None)), None);
        assert_eq!(extract_metric(&pass(None, Some(4.0))), None);
        assert_eq!(extract_metric(&pass(Some(f64::NAN), Some(4.0))), None);
        assert_eq!(extract_metric(&pass(Some(1.0), Some(f64::INFINITY))), None);
    }

    #[test]
    fn test_weighted_energy_preferred() {
        let p = RawPass {
            weighted_energy_sum: Some(9.0),
            energy_sum: Some(1.0),
            sample_count: Some(3.0),
            ..Default::default()
        };
        assert_eq!(extract_metric(&p).unwrap().metric, 3.0);
    }
}
