use crate::analyzers::aggregate::{aggregate_passes, cutoff_ms};
use crate::analyzers::baseline::compute_baselines;
use crate::analyzers::calibration::calibrate_vehicles;
use crate::analyzers::grade::Grade;
use crate::analyzers::normalize::normalize_segments;
use crate::analyzers::types::{Aggregation, Baselines, NormalizedSegmentRecord, VehicleCalibration};
use crate::analyzers::utility::mean;
use crate::config::PipelineConfig;
use crate::output::{WriteSummary, write_artifacts};
use crate::pass::RawPass;
use crate::services::document_store::DocumentStore;
use crate::services::pass_store::{PassStore, QueryStrategy, fetch_passes};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Inputs for one run: one city, one lookback window, one run date.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub city_id: String,
    /// Key for dated documents, `YYYY-MM-DD`.
    pub run_date: String,
    pub now: DateTime<Utc>,
    pub config: PipelineConfig,
}

impl RunOptions {
    pub fn new(city_id: &str, now: DateTime<Utc>, config: PipelineConfig) -> Self {
        Self {
            city_id: city_id.to_string(),
            run_date: now.format("%Y-%m-%d").to_string(),
            now,
            config,
        }
    }

    pub fn cutoff_ms(&self) -> f64 {
        cutoff_ms(self.now.timestamp_millis(), self.config.lookback_days)
    }
}

/// Everything the statistical stages derive from one set of passes.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub aggregation: Aggregation,
    pub baselines: Baselines,
    pub calibrations: BTreeMap<String, VehicleCalibration>,
    pub normalized: BTreeMap<String, NormalizedSegmentRecord>,
}

/// Runs aggregation, baselines, calibration and normalization in order.
pub fn run_stages(
    passes: &[RawPass],
    cutoff_ms: f64,
    current_year: i32,
    config: &PipelineConfig,
) -> StageOutput {
    let aggregation = aggregate_passes(passes, cutoff_ms);
    let baselines = compute_baselines(&aggregation, config);
    let calibrations =
        calibrate_vehicles(&baselines, &aggregation.model_years, current_year, config);
    let normalized = normalize_segments(&baselines, &calibrations);

    StageOutput {
        aggregation,
        baselines,
        calibrations,
        normalized,
    }
}

/// Counts and outcomes of a run, logged at the end.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub city_id: String,
    pub run_date: String,
    pub cutoff_ms: f64,
    pub strategy: QueryStrategy,
    pub total_passes: u64,
    pub admitted_passes: u64,
    pub skipped_passes: u64,
    pub stale_passes: u64,
    pub segments: usize,
    pub golden_threshold: f64,
    pub golden_segments: usize,
    pub vehicles: usize,
    pub measured_calibrations: usize,
    pub provisional_calibrations: usize,
    pub mean_k_factor: f64,
    pub normalized_segments: usize,
    pub grades: BTreeMap<String, usize>,
    pub writes: WriteSummary,
}

impl RunSummary {
    fn new(
        options: &RunOptions,
        strategy: QueryStrategy,
        stages: &StageOutput,
        writes: WriteSummary,
    ) -> Self {
        let agg = &stages.aggregation;
        let provisional = stages.calibrations.values().filter(|c| c.provisional).count();
        let k_factors: Vec<f64> = stages.calibrations.values().map(|c| c.k_factor).collect();

        let mut grades: BTreeMap<String, usize> =
            Grade::ALL.iter().map(|g| (g.to_string(), 0)).collect();
        for record in stages.normalized.values() {
            *grades.entry(record.grade_all.to_string()).or_default() += 1;
        }

        Self {
            city_id: options.city_id.clone(),
            run_date: options.run_date.clone(),
            cutoff_ms: options.cutoff_ms(),
            strategy,
            total_passes: agg.total_passes,
            admitted_passes: agg.admitted_passes(),
            skipped_passes: agg.skipped_passes,
            stale_passes: agg.stale_passes,
            segments: stages.baselines.segments.len(),
            golden_threshold: stages.baselines.golden_threshold,
            golden_segments: stages.baselines.golden_count(),
            vehicles: stages.calibrations.len(),
            measured_calibrations: stages.calibrations.len() - provisional,
            provisional_calibrations: provisional,
            mean_k_factor: mean(&k_factors),
            normalized_segments: stages.normalized.len(),
            grades,
            writes,
        }
    }
}

/// Fetches a city's passes, derives the three artifact families and writes
/// them. `sink` of `None` is a dry run.
#[tracing::instrument(
    skip(passes, sink, options),
    fields(city_id = %options.city_id, run_date = %options.run_date, dry_run = sink.is_none())
)]
pub async fn analyze_city<P, D>(
    passes: &P,
    sink: Option<&D>,
    options: &RunOptions,
) -> Result<RunSummary>
where
    P: PassStore + ?Sized,
    D: DocumentStore + ?Sized,
{
    options.config.validate().context("invalid pipeline config")?;

    let cutoff = options.cutoff_ms();
    let fetched = fetch_passes(passes, &options.city_id, cutoff)
        .await
        .with_context(|| format!("querying passes for city '{}'", options.city_id))?;

    let stages = run_stages(
        &fetched.passes,
        cutoff,
        options.now.year(),
        &options.config,
    );

    let agg = &stages.aggregation;
    info!(
        total = agg.total_passes,
        admitted = agg.admitted_passes(),
        stale = agg.stale_passes,
        "{} passes skipped",
        agg.skipped_passes
    );
    info!(
        segments = stages.baselines.segments.len(),
        golden = stages.baselines.golden_count(),
        golden_threshold = stages.baselines.golden_threshold,
        vehicles = stages.calibrations.len(),
        normalized = stages.normalized.len(),
        "Statistics computed"
    );

    let writes = write_artifacts(
        sink,
        &options.city_id,
        &options.run_date,
        &stages.baselines,
        &stages.calibrations,
        &stages.normalized,
        options.config.effective_batch_size(),
    )
    .await
    .with_context(|| format!("writing artifacts for city '{}'", options.city_id))?;

    Ok(RunSummary::new(options, fetched.strategy, &stages, writes))
}
