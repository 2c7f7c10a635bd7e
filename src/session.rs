//! Per-session context: the loaded dataset plus the selected date range

use std::sync::Arc;

use tracing::info;

use crate::aggregate::{aggregate_frame, frame_in_range, AggregateBundle, DailyTable};
use crate::config::PipelineConfig;
use crate::data::RentalDataset;
use crate::decompose::{decompose, Decomposition};
use crate::error::PipelineError;
use crate::range::DateRange;

/// State a dashboard keeps between recomputations
///
/// Constructed once per session and replaced wholesale on a new upload; every
/// `aggregate`/`decompose` call reads it without mutation.
#[derive(Debug, Clone)]
pub struct RentalSession {
    dataset: Arc<RentalDataset>,
    range: DateRange,
    config: PipelineConfig,
}

impl RentalSession {
    /// Start a session; the range comes from `config`, defaulting to the full dataset
    pub fn new(dataset: RentalDataset, config: PipelineConfig) -> Result<Self, PipelineError> {
        let range = config.resolve_range(&dataset)?;
        info!(records = dataset.len(), %range, "session started");
        Ok(Self {
            dataset: Arc::new(dataset),
            range,
            config,
        })
    }

    pub fn dataset(&self) -> Arc<RentalDataset> {
        Arc::clone(&self.dataset)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Swap in a new dataset and reset the range to its full span
    pub fn replace_dataset(&mut self, dataset: RentalDataset) {
        self.range = dataset.full_range();
        self.dataset = Arc::new(dataset);
        info!(records = self.dataset.len(), range = %self.range, "dataset replaced");
    }

    /// Select a new range; out-of-bounds ranges are rejected, never clamped
    pub fn select_range(&mut self, range: DateRange) -> Result<(), PipelineError> {
        let bounds = self.dataset.full_range();
        if !bounds.covers(&range) {
            return Err(PipelineError::RangeOutOfBounds {
                start: range.start(),
                end: range.end(),
                min: bounds.start(),
                max: bounds.end(),
            });
        }
        self.range = range;
        Ok(())
    }

    /// Number of records in the selected range
    pub fn record_count(&self) -> usize {
        self.dataset.in_range(&self.range).len()
    }

    pub fn aggregate(&self) -> Result<AggregateBundle, PipelineError> {
        aggregate_frame(self.dataset.frame(), &self.range)
    }

    /// Decompose the daily `cnt` totals of the selected range with the configured period
    pub fn decompose(&self) -> Result<Decomposition, PipelineError> {
        let rows = frame_in_range(self.dataset.frame(), &self.range)?;
        if rows.height() == 0 {
            return Err(PipelineError::EmptyRange {
                start: self.range.start(),
                end: self.range.end(),
            });
        }
        let daily = DailyTable::from_frame(&rows)?;
        decompose(&daily.cnt_series(), self.config.period, self.config.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RentalRecord, Season, WorkingDay};
    use chrono::{Duration, NaiveDate};

    fn dataset(days: i64, start: NaiveDate) -> RentalDataset {
        let records = (0..days)
            .map(|i| RentalRecord {
                date: start + Duration::days(i),
                season: Season::Spring,
                weekday: (i % 7) as u8,
                workingday: if i % 7 == 0 || i % 7 == 6 {
                    WorkingDay::NonWorking
                } else {
                    WorkingDay::Working
                },
                casual: 10 + (i % 7) as u32,
                registered: 100,
                cnt: 110 + (i % 7) as u32,
            })
            .collect();
        RentalDataset::new(records).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults_to_full_range() {
        let session = RentalSession::new(dataset(28, date(2011, 1, 1)), PipelineConfig::default()).unwrap();
        assert_eq!(session.range().start(), date(2011, 1, 1));
        assert_eq!(session.range().end(), date(2011, 1, 28));
        assert_eq!(session.record_count(), 28);
    }

    #[test]
    fn test_select_range_narrows_rows() {
        let mut session =
            RentalSession::new(dataset(28, date(2011, 1, 1)), PipelineConfig::default().with_period(7)).unwrap();
        let full = session.aggregate().unwrap();

        session
            .select_range(DateRange::new(date(2011, 1, 8), date(2011, 1, 21)).unwrap())
            .unwrap();
        let narrow = session.aggregate().unwrap();
        assert!(narrow.records <= full.records);
        assert_eq!(narrow.daily.len(), 14);

        let decomposition = session.decompose().unwrap();
        assert_eq!(decomposition.len(), 14);
        assert_eq!(decomposition.period(), 7);
    }

    #[test]
    fn test_out_of_bounds_range_is_kept_out() {
        let mut session = RentalSession::new(dataset(10, date(2011, 1, 1)), PipelineConfig::default()).unwrap();
        let before = session.range();

        let result = session.select_range(DateRange::new(date(2010, 12, 1), date(2011, 1, 5)).unwrap());
        assert!(matches!(result, Err(PipelineError::RangeOutOfBounds { .. })));
        assert_eq!(session.range(), before);

        // past the last day
        let result = session.select_range(DateRange::new(date(2011, 1, 5), date(2011, 1, 11)).unwrap());
        assert_eq!(
            result,
            Err(PipelineError::RangeOutOfBounds {
                start: date(2011, 1, 5),
                end: date(2011, 1, 11),
                min: date(2011, 1, 1),
                max: date(2011, 1, 10),
            })
        );
        assert_eq!(session.range(), before);

        // the full span itself is accepted
        session.select_range(before).unwrap();
    }

    #[test]
    fn test_replace_dataset_resets_range() {
        let mut session = RentalSession::new(dataset(10, date(2011, 1, 1)), PipelineConfig::default()).unwrap();
        let old = session.dataset();

        session.replace_dataset(dataset(5, date(2012, 6, 1)));
        assert_eq!(session.range().start(), date(2012, 6, 1));
        assert_eq!(session.range().end(), date(2012, 6, 5));
        assert_eq!(old.len(), 10);
    }

    #[test]
    fn test_default_period_needs_two_years() {
        let session = RentalSession::new(dataset(100, date(2011, 1, 1)), PipelineConfig::default()).unwrap();
        let result = session.decompose();
        assert_eq!(result, Err(PipelineError::InvalidSeries { len: 100, required: 730 }));
    }
}
