use std::cmp::Ordering;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard median: middle value for odd lengths, average of the two middle
/// values for even lengths. Non-finite values are ignored; `None` when
/// nothing finite remains.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sort_ascending(&mut sorted);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

pub fn sort_ascending(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
}

/// Percentile rank of `value` within the ascending slice `sorted`, in `[0, 100]`.
///
/// Uses the rightmost index `i` with `sorted[i] <= value`, scaled by `n - 1`.
/// A single-element slice always ranks 100.
pub fn percentile_rank(sorted: &[f64], value: f64) -> f64 {
    let n = sorted.len();
    if n <= 1 {
        return 100.0;
    }

    let at_or_below = sorted.partition_point(|x| *x <= value);
    if at_or_below == 0 {
        return 0.0;
    }

    let i = (at_or_below - 1) as f64;
    (i / (n - 1) as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[1.0, 3.0]), Some(2.0));
        assert_eq!(median(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(median(&[3.0, 1.0, 2.0, 10.0]), Some(2.5));
        assert_eq!(median(&[7.0]), Some(7.0));
    }

    #[test]
    fn test_median_empty_and_non_finite() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[f64::NAN, f64::INFINITY]), None);
        assert_eq!(median(&[f64::NAN, 4.0]), Some(4.0));
    }

    #[test]
    fn test_percentile_rank_examples() {
        assert_eq!(percentile_rank(&[5.0], 5.0), 100.0);
        assert_eq!(percentile_rank(&[1.0, 2.0, 3.0, 4.0, 5.0], 3.0), 50.0);
        assert_eq!(percentile_rank(&[1.0, 2.0, 3.0, 4.0, 5.0], 5.0), 100.0);
        assert_eq!(percentile_rank(&[1.0, 2.0, 3.0, 4.0, 5.0], 1.0), 0.0);
    }

    #[test]
    fn test_percentile_rank_ties_use_rightmost() {
        assert_eq!(percentile_rank(&[1.0, 2.0, 2.0, 3.0, 4.0], 2.0), 50.0);
    }

    #[test]
    fn test_percentile_rank_stays_in_range() {
        let sorted = [1.0, 2.0, 3.0];
        for v in [-100.0, 0.5, 1.5, 2.0, 99.0] {
            let p = percentile_rank(&sorted, v);
            assert!((0.0..=100.0).contains(&p), "{v} -> {p}");
        }
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }
}
