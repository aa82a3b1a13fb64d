use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Hard cap on writes in one atomic commit for the document store.
pub const STORE_MAX_BATCH: usize = 500;

/// Tunables for one pipeline run.
///
/// Every field has a default, so a config file only needs the keys it
/// overrides:
/// ```json
/// { "lookback_days": 14, "batch_size": 250 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub lookback_days: f64,
    pub k_min: f64,
    pub k_max: f64,
    pub golden_min: f64,
    pub golden_max: f64,
    /// Expected amplification gained per year of vehicle age.
    pub age_slope: f64,
    /// Ceiling on the age-driven amplification.
    pub age_cap: f64,
    pub batch_size: usize,
    pub pass_collection: String,
    pub page_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30.0,
            k_min: 0.25,
            k_max: 4.0,
            golden_min: 25.0,
            golden_max: 100.0,
            age_slope: 0.03,
            age_cap: 0.9,
            batch_size: 400,
            pass_collection: "roughnessPasses".to_string(),
            page_size: 1000,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file '{path}'"))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing config file '{path}'"))?;
        config
            .validate()
            .with_context(|| format!("invalid config file '{path}'"))?;
        Ok(config)
    }

    /// Rejects tunables the statistics stages cannot run with: non-finite
    /// values, non-positive bounds, and inverted ranges.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("lookback_days", self.lookback_days),
            ("k_min", self.k_min),
            ("k_max", self.k_max),
            ("golden_min", self.golden_min),
            ("golden_max", self.golden_max),
            ("age_slope", self.age_slope),
            ("age_cap", self.age_cap),
        ];
        for (name, value) in finite {
            ensure!(value.is_finite(), "{name} must be a finite number, got {value}");
        }

        ensure!(self.lookback_days > 0.0, "lookback_days must be positive");
        ensure!(self.k_min > 0.0, "k_min must be positive");
        ensure!(
            self.k_min <= self.k_max,
            "k_min ({}) must not exceed k_max ({})",
            self.k_min,
            self.k_max
        );
        ensure!(self.golden_min > 0.0, "golden_min must be positive");
        ensure!(
            self.golden_min <= self.golden_max,
            "golden_min ({}) must not exceed golden_max ({})",
            self.golden_min,
            self.golden_max
        );
        ensure!(self.age_slope >= 0.0, "age_slope must not be negative");
        ensure!(self.age_cap >= 0.0, "age_cap must not be negative");
        ensure!(!self.pass_collection.trim().is_empty(), "pass_collection must be set");
        Ok(())
    }

    /// Batch size actually used for commits, always within `1..=STORE_MAX_BATCH`.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, STORE_MAX_BATCH)
    }

    /// Applies a raw `--days` value. Anything that is not a finite positive
    /// number leaves the configured lookback untouched.
    pub fn with_days_arg(mut self, raw: Option<&str>) -> Self {
        if let Some(days) = parse_days(raw) {
            self.lookback_days = days;
        }
        self
    }
}

/// Parses a lookback in days; `None` when absent or not a finite positive number.
pub fn parse_days(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days(Some("7")), Some(7.0));
        assert_eq!(parse_days(Some(" 1.5 ")), Some(1.5));
        assert_eq!(parse_days(Some("abc")), None);
        assert_eq!(parse_days(Some("NaN")), None);
        assert_eq!(parse_days(Some("inf")), None);
        assert_eq!(parse_days(Some("-3")), None);
        assert_eq!(parse_days(None), None);
    }

    #[test]
    fn test_bad_days_falls_back_to_default() {
        let config = PipelineConfig::default().with_days_arg(Some("soon"));
        assert_eq!(config.lookback_days, 30.0);

        let config = PipelineConfig::default().with_days_arg(Some("10"));
        assert_eq!(config.lookback_days, 10.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "lookback_days": 14, "batch_size": 9000 }"#).unwrap();
        assert_eq!(config.lookback_days, 14.0);
        assert_eq!(config.k_max, 4.0);
        assert_eq!(config.effective_batch_size(), STORE_MAX_BATCH);
    }

    #[test]
    fn test_default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_inverted_bounds_are_rejected() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "k_min": 2.0, "k_max": 1.0 }"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("k_min (2) must not exceed k_max (1)"));

        let config: PipelineConfig =
            serde_json::from_str(r#"{ "golden_min": 200, "golden_max": 100 }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_bounds_are_rejected() {
        for json in [
            r#"{ "k_min": 0 }"#,
            r#"{ "k_min": -1, "k_max": -0.5 }"#,
            r#"{ "golden_min": 0 }"#,
            r#"{ "lookback_days": 0 }"#,
            r#"{ "age_slope": -0.1 }"#,
        ] {
            let config: PipelineConfig = serde_json::from_str(json).unwrap();
            assert!(config.validate().is_err(), "{json} should be rejected");
        }
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!(
            "road_roughness_config_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "k_min": 2.0, "k_max": 1.0 }"#).unwrap();

        let result = PipelineConfig::load(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();

        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("must not exceed k_max"));
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let config = PipelineConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert_eq!(config.effective_batch_size(), 1);
    }
}
