//! Summary tables over a date range: daily totals and per-key means

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::data::{date_from_epoch_days, epoch_days, frame_from_records, RentalRecord, Season, WorkingDay};
use crate::error::{ConsistencyWarning, PipelineError};
use crate::grouping::{column_means, group_reduce, group_totals, GroupRow, KeyOrder, KeySelector, Reduction};
use crate::range::DateRange;

/// Summed counts of one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub casual: u64,
    pub registered: u64,
    pub cnt: u64,
}

/// Mean daily counts, the headline figures of a dashboard
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailySummary {
    pub mean_cnt: f64,
    pub mean_casual: f64,
    pub mean_registered: f64,
}

impl DailySummary {
    /// `(cnt, casual, registered)` rounded to the nearest integer
    pub fn rounded(&self) -> (i64, i64, i64) {
        (
            self.mean_cnt.round() as i64,
            self.mean_casual.round() as i64,
            self.mean_registered.round() as i64,
        )
    }
}

/// One row per distinct date, ascending
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTable {
    rows: Vec<DailyRow>,
}

impl DailyTable {
    /// Sum a record frame per date; rows may arrive in any order
    pub fn from_frame(frame: &DataFrame) -> Result<Self, PipelineError> {
        let dates = KeySelector::column("dteday", date_from_epoch_days);
        let rows = group_totals(frame, &dates, &KeyOrder::Ascending)?
            .into_iter()
            .map(|(date, totals)| DailyRow {
                date,
                casual: totals.casual,
                registered: totals.registered,
                cnt: totals.cnt,
            })
            .collect();
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[DailyRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(date, cnt)` pairs, the input of the decomposer
    pub fn cnt_series(&self) -> Vec<(NaiveDate, f64)> {
        self.rows.iter().map(|row| (row.date, row.cnt as f64)).collect()
    }

    /// Mean of each column over the days; `None` for an empty table
    pub fn summary(&self) -> Option<DailySummary> {
        if self.rows.is_empty() {
            return None;
        }
        let n = self.rows.len() as f64;
        let (cnt, casual, registered) = self.rows.iter().fold((0u64, 0u64, 0u64), |acc, row| {
            (acc.0 + row.cnt, acc.1 + row.casual, acc.2 + row.registered)
        });
        Some(DailySummary {
            mean_cnt: cnt as f64 / n,
            mean_casual: casual as f64 / n,
            mean_registered: registered as f64 / n,
        })
    }
}

/// Means per grouping key, ordered for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedTable<K> {
    rows: Vec<GroupRow<K>>,
}

impl<K: Copy + PartialEq> GroupedTable<K> {
    pub fn rows(&self) -> &[GroupRow<K>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: K) -> Option<&GroupRow<K>> {
        self.rows.iter().find(|row| row.key == key)
    }

    pub fn keys(&self) -> Vec<K> {
        self.rows.iter().map(|row| row.key).collect()
    }
}

/// The two disjoint user populations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UserType {
    Casual,
    Registered,
}

impl UserType {
    pub fn label(self) -> &'static str {
        match self {
            UserType::Casual => "Casual",
            UserType::Registered => "Registered",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UserTypeRow {
    pub user_type: UserType,
    pub mean: f64,
}

/// Column-wise means of `casual` and `registered`, always Casual then Registered
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UserTypeTable {
    rows: [UserTypeRow; 2],
}

impl UserTypeTable {
    pub fn rows(&self) -> &[UserTypeRow; 2] {
        &self.rows
    }

    pub fn mean(&self, user_type: UserType) -> f64 {
        match user_type {
            UserType::Casual => self.rows[0].mean,
            UserType::Registered => self.rows[1].mean,
        }
    }

    /// Percentage share of each user type; both zero when there were no rentals
    pub fn shares(&self) -> [(UserType, f64); 2] {
        let total = self.rows[0].mean + self.rows[1].mean;
        self.rows.map(|row| {
            let share = if total > 0.0 { row.mean / total * 100.0 } else { 0.0 };
            (row.user_type, share)
        })
    }
}

/// Everything the dashboard draws for one date range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateBundle {
    pub range: DateRange,
    /// Input records that fell inside the range
    pub records: usize,
    pub daily: DailyTable,
    pub by_month: GroupedTable<u32>,
    pub by_season: GroupedTable<Season>,
    pub by_weekday: GroupedTable<u8>,
    pub by_working_day: GroupedTable<WorkingDay>,
    pub by_user_type: UserTypeTable,
    /// In-range records whose `cnt` differs from `casual + registered`
    pub warnings: Vec<ConsistencyWarning>,
}

/// Compute every summary table for the records inside `range`
///
/// # Arguments
/// * `records` - Full input table, in any order
/// * `range` - Inclusive date range; must lie within the records' first and last date
///
/// # Returns
/// * `AggregateBundle`, or `EmptyRange` when nothing falls inside `range`
pub fn aggregate(records: &[RentalRecord], range: &DateRange) -> Result<AggregateBundle, PipelineError> {
    if records.is_empty() {
        return Err(empty_range(range));
    }
    let frame = frame_from_records(records)?;
    aggregate_frame(&frame, range)
}

/// [`aggregate`] over a record frame as built by [`frame_from_records`]
#[tracing::instrument(skip(frame), fields(start = %range.start(), end = %range.end()))]
pub fn aggregate_frame(frame: &DataFrame, range: &DateRange) -> Result<AggregateBundle, PipelineError> {
    let (min, max) = date_bounds(frame)?.ok_or_else(|| empty_range(range))?;
    range.check_within(min, max)?;

    let rows = frame_in_range(frame, range)?;
    if rows.height() == 0 {
        return Err(empty_range(range));
    }

    let warnings = consistency_warnings(&rows)?;

    let daily = DailyTable::from_frame(&rows)?;
    let months = KeySelector::new(col("dteday").dt().month(), |month| u32::try_from(month).ok());
    let by_month = GroupedTable {
        rows: group_reduce(&rows, &months, Reduction::Mean, &KeyOrder::Ascending)?,
    };
    let by_season = GroupedTable {
        rows: group_reduce(
            &rows,
            &KeySelector::column("season", Season::from_code),
            Reduction::Mean,
            &KeyOrder::Fixed(Season::ALL.to_vec()),
        )?,
    };
    let weekdays = KeySelector::column("weekday", |weekday| u8::try_from(weekday).ok());
    let by_weekday = GroupedTable {
        rows: group_reduce(&rows, &weekdays, Reduction::Mean, &KeyOrder::Ascending)?,
    };
    let by_working_day = GroupedTable {
        rows: group_reduce(
            &rows,
            &KeySelector::column("workingday", WorkingDay::from_flag),
            Reduction::Mean,
            &KeyOrder::Fixed(WorkingDay::ALL.to_vec()),
        )?,
    };
    let by_user_type = user_type_means(&rows)?;

    debug!(
        months = by_month.len(),
        seasons = by_season.len(),
        weekdays = by_weekday.len(),
        "grouped tables built"
    );
    info!(records = rows.height(), days = daily.len(), warnings = warnings.len(), "aggregation complete");

    Ok(AggregateBundle {
        range: *range,
        records: rows.height(),
        daily,
        by_month,
        by_season,
        by_weekday,
        by_working_day,
        by_user_type,
        warnings,
    })
}

/// Rows of `frame` whose `dteday` lies in `range`, ascending by date
pub fn frame_in_range(frame: &DataFrame, range: &DateRange) -> PolarsResult<DataFrame> {
    let bound = |date: NaiveDate| lit(epoch_days(date)).cast(DataType::Date);
    frame
        .clone()
        .lazy()
        .filter(
            col("dteday")
                .gt_eq(bound(range.start()))
                .and(col("dteday").lt_eq(bound(range.end()))),
        )
        .sort(
            ["dteday"],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()
}

fn empty_range(range: &DateRange) -> PipelineError {
    PipelineError::EmptyRange {
        start: range.start(),
        end: range.end(),
    }
}

fn date_bounds(frame: &DataFrame) -> PolarsResult<Option<(NaiveDate, NaiveDate)>> {
    let days = frame.column("dteday")?.cast(&DataType::Int32)?;
    let days = days.i32()?;
    let bounds = match (days.min(), days.max()) {
        (Some(min), Some(max)) => date_from_epoch_days(i64::from(min)).zip(date_from_epoch_days(i64::from(max))),
        _ => None,
    };
    Ok(bounds)
}

fn user_type_means(rows: &DataFrame) -> PolarsResult<UserTypeTable> {
    let means = column_means(rows)?;
    Ok(UserTypeTable {
        rows: [
            UserTypeRow {
                user_type: UserType::Casual,
                mean: means.casual,
            },
            UserTypeRow {
                user_type: UserType::Registered,
                mean: means.registered,
            },
        ],
    })
}

fn count_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<u32>> {
    let values = df.column(name)?.cast(&DataType::UInt32)?;
    let values = values.u32()?.into_no_null_iter().collect();
    Ok(values)
}

fn consistency_warnings(rows: &DataFrame) -> PolarsResult<Vec<ConsistencyWarning>> {
    let mismatched = rows
        .clone()
        .lazy()
        .filter(col("cnt").neq(col("casual") + col("registered")))
        .collect()?;

    let days = mismatched.column("dteday")?.cast(&DataType::Int32)?;
    let casual = count_values(&mismatched, "casual")?;
    let registered = count_values(&mismatched, "registered")?;
    let cnt = count_values(&mismatched, "cnt")?;

    let warnings = days
        .i32()?
        .into_no_null_iter()
        .enumerate()
        .map(|(i, day)| {
            let date = date_from_epoch_days(i64::from(day))
                .ok_or_else(|| PolarsError::ComputeError(format!("day {day} is out of range").into()))?;
            Ok(ConsistencyWarning {
                date,
                casual: casual[i],
                registered: registered[i],
                cnt: cnt[i],
            })
        })
        .collect::<PolarsResult<Vec<_>>>()?;

    if let Some(first) = warnings.first() {
        warn!(
            rows = warnings.len(),
            first = %first,
            "cnt differs from casual + registered; using cnt"
        );
    }
    Ok(warnings)
}
