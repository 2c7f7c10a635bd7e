//! Error and warning types for the aggregation and decomposition pipeline

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use serde::Serialize;

/// Errors reported at the boundary of the aggregator and the decomposer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The range starts after it ends.
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// The range reaches outside the dataset's first and last date.
    #[error("date range {start}..={end} is outside the dataset bounds {min}..={max}")]
    RangeOutOfBounds {
        start: NaiveDate,
        end: NaiveDate,
        min: NaiveDate,
        max: NaiveDate,
    },

    /// No record falls inside the range.
    #[error("no records between {start} and {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    /// The series is too short for the requested period.
    #[error("series of length {len} is too short for decomposition, need at least {required}")]
    InvalidSeries { len: usize, required: usize },

    /// The period cannot describe a seasonal cycle.
    #[error("period must be >= 2, got {period}")]
    InvalidPeriod { period: usize },

    /// The series is not strictly ascending by date.
    #[error("series is not strictly ascending by date at index {index}")]
    UnorderedSeries { index: usize },

    /// A grouping or filtering step on the record frame failed.
    #[error("frame computation failed: {reason}")]
    Frame { reason: String },
}

impl From<PolarsError> for PipelineError {
    fn from(err: PolarsError) -> Self {
        PipelineError::Frame {
            reason: err.to_string(),
        }
    }
}

/// A record whose total does not match the sum of its user populations.
///
/// Non-fatal: `cnt` stays authoritative and aggregation proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsistencyWarning {
    pub date: NaiveDate,
    pub casual: u32,
    pub registered: u32,
    pub cnt: u32,
}

impl ConsistencyWarning {
    /// Signed difference `cnt - (casual + registered)`
    pub fn discrepancy(&self) -> i64 {
        i64::from(self.cnt) - (i64::from(self.casual) + i64::from(self.registered))
    }
}

impl std::fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: cnt {} != casual {} + registered {}",
            self.date, self.cnt, self.casual, self.registered
        )
    }
}
