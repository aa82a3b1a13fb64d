use crate::analyzers::metric::extract_metric;
use crate::analyzers::types::Aggregation;
use crate::pass::RawPass;
use tracing::debug;

pub const MS_PER_DAY: f64 = 86_400_000.0;

/// Start of the lookback window, in epoch milliseconds.
pub fn cutoff_ms(now_ms: i64, lookback_days: f64) -> f64 {
    now_ms as f64 - lookback_days * MS_PER_DAY
}

/// Groups passes by segment and by vehicle within each segment.
///
/// Passes older than `cutoff_ms` are counted as stale. Passes without a
/// segment key, a vehicle key, or a usable metric are counted as skipped and
/// contribute nothing else. Passes carrying no timestamp are admitted.
pub fn aggregate_passes<'a, I>(passes: I, cutoff_ms: f64) -> Aggregation
where
    I: IntoIterator<Item = &'a RawPass>,
{
    let mut agg = Aggregation::default();

    for pass in passes {
        agg.total_passes += 1;

        if pass.event_time().is_some_and(|t| t < cutoff_ms) {
            agg.stale_passes += 1;
            continue;
        }

        let (Some(segment_id), Some(vehicle)) = (pass.segment_key(), pass.vehicle_key()) else {
            agg.skipped_passes += 1;
            continue;
        };

        let Some(metric) = extract_metric(pass) else {
            debug!(segment_id, vehicle, "Pass has no usable metric");
            agg.skipped_passes += 1;
            continue;
        };

        let segment = agg.segments.entry(segment_id.to_string()).or_default();
        segment
            .per_vehicle_metrics
            .entry(vehicle.to_string())
            .or_default()
            .push(metric.metric);
        segment.pass_count += 1;
        segment.total_sample_count += metric.sample_count;

        if let Some(road_type) = pass.road_type_vote() {
            segment.road_type_votes.record(road_type);
        }

        if let Some(year) = pass.model_year() {
            agg.model_years.entry(vehicle.to_string()).or_insert(year);
        }
    }

    agg
}
