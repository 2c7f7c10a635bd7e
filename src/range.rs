//! Inclusive calendar date ranges

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::PipelineError;

/// Inclusive `[start, end]` date range with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PipelineError> {
        if start > end {
            return Err(PipelineError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Caller guarantees `start <= end`
    pub(crate) fn spanning(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Whether `other` lies entirely inside this range
    pub fn covers(&self, other: &DateRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Fail unless the range lies within `[min, max]`
    pub fn check_within(&self, min: NaiveDate, max: NaiveDate) -> Result<(), PipelineError> {
        if self.start < min || self.end > max {
            return Err(PipelineError::RangeOutOfBounds {
                start: self.start,
                end: self.end,
                min,
                max,
            });
        }
        Ok(())
    }

    /// Intersect with `[min, max]`; `None` when they do not overlap.
    ///
    /// The pipeline never clamps on its own; this is for callers that choose to.
    pub fn clamp_to(&self, min: NaiveDate, max: NaiveDate) -> Option<DateRange> {
        let start = self.start.max(min);
        let end = self.end.min(max);
        (start <= end).then_some(DateRange { start, end })
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let result = DateRange::new(date(2012, 2, 1), date(2012, 1, 1));
        assert!(matches!(result, Err(PipelineError::InvalidRange { .. })));
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::new(date(2012, 1, 1), date(2012, 1, 1)).unwrap();
        assert_eq!(range.days(), 1);
        assert!(range.contains(date(2012, 1, 1)));
        assert!(!range.contains(date(2012, 1, 2)));
    }

    #[test]
    fn test_check_within_reports_bounds() {
        let range = DateRange::new(date(2010, 12, 1), date(2011, 1, 5)).unwrap();
        let err = range
            .check_within(date(2011, 1, 1), date(2012, 12, 31))
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::RangeOutOfBounds {
                start: date(2010, 12, 1),
                end: date(2011, 1, 5),
                min: date(2011, 1, 1),
                max: date(2012, 12, 31),
            }
        );
    }

    #[test]
    fn test_covers() {
        let outer = DateRange::new(date(2011, 1, 1), date(2011, 12, 31)).unwrap();
        assert!(outer.covers(&outer));
        assert!(outer.covers(&DateRange::new(date(2011, 3, 1), date(2011, 3, 1)).unwrap()));
        assert!(!outer.covers(&DateRange::new(date(2010, 12, 31), date(2011, 1, 5)).unwrap()));
        assert!(!outer.covers(&DateRange::new(date(2011, 12, 1), date(2012, 1, 1)).unwrap()));
    }

    #[test]
    fn test_clamp_to() {
        let range = DateRange::new(date(2010, 12, 1), date(2011, 1, 5)).unwrap();
        let clamped = range.clamp_to(date(2011, 1, 1), date(2012, 12, 31)).unwrap();
        assert_eq!(clamped.start(), date(2011, 1, 1));
        assert_eq!(clamped.end(), date(2011, 1, 5));

        assert!(range.clamp_to(date(2013, 1, 1), date(2013, 2, 1)).is_none());
    }
}
