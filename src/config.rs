//! Caller-supplied pipeline configuration

use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::data::RentalDataset;
use crate::decompose::{DecompositionModel, DEFAULT_DAILY_PERIOD};
use crate::error::PipelineError;
use crate::range::DateRange;

/// Date range and decomposition settings
///
/// Missing dates default to the dataset's first and last day.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// Decomposition cycle length in observations
    #[serde(default = "default_period")]
    pub period: usize,

    #[serde(default)]
    pub model: DecompositionModel,
}

fn default_period() -> usize {
    DEFAULT_DAILY_PERIOD
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            period: default_period(),
            model: DecompositionModel::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document
    pub fn from_toml_str(toml_str: &str) -> crate::Result<Self> {
        toml::from_str(toml_str).context("failed to parse pipeline config")
    }

    /// Read and parse a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let toml_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&toml_str)
    }

    pub fn with_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    /// Resolve the configured range against `dataset`, filling missing bounds
    ///
    /// A range reaching outside the dataset is an error, not clamped.
    pub fn resolve_range(&self, dataset: &RentalDataset) -> Result<DateRange, PipelineError> {
        let start = self.start_date.unwrap_or_else(|| dataset.min_date());
        let end = self.end_date.unwrap_or_else(|| dataset.max_date());
        let range = DateRange::new(start, end)?;
        range.check_within(dataset.min_date(), dataset.max_date())?;
        Ok(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.period, 365);
        assert_eq!(config.model, DecompositionModel::Additive);
    }

    #[test]
    fn test_full_document() {
        let config = PipelineConfig::from_toml_str(
            r#"
            start_date = "2011-03-01"
            end_date = "2012-02-29"
            period = 7
            model = "additive"
            "#,
        )
        .unwrap();

        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2011, 3, 1));
        assert_eq!(config.end_date, NaiveDate::from_ymd_opt(2012, 2, 29));
        assert_eq!(config.period, 7);
    }

    #[test]
    fn test_unknown_key_and_model_are_rejected() {
        assert!(PipelineConfig::from_toml_str("window = 3").is_err());
        assert!(PipelineConfig::from_toml_str(r#"model = "multiplicative""#).is_err());
    }
}
