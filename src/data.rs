//! Rental record model and CSV loading using Polars

use std::path::Path;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::range::DateRange;

/// Columns every input file must carry; anything else (`hr`, weather, ...) is ignored
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "dteday",
    "season",
    "weekday",
    "workingday",
    "casual",
    "registered",
    "cnt",
];

/// Format of the `dteday` column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Days from 0001-01-01 (CE) to 1970-01-01, the epoch of Polars `Date` values
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Meteorological season as coded in the dataset (1 = Spring ... 4 = Winter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    /// Display order
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Fall, Season::Winter];

    /// Map a dataset code to its season
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Season::Spring),
            2 => Some(Season::Summer),
            3 => Some(Season::Fall),
            4 => Some(Season::Winter),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
            Season::Winter => "Winter",
        }
    }
}

/// Working-day flag of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum WorkingDay {
    NonWorking,
    Working,
}

impl WorkingDay {
    /// Display order
    pub const ALL: [WorkingDay; 2] = [WorkingDay::NonWorking, WorkingDay::Working];

    pub fn from_flag(flag: i64) -> Option<Self> {
        match flag {
            0 => Some(WorkingDay::NonWorking),
            1 => Some(WorkingDay::Working),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WorkingDay::NonWorking => "Non-Working Day",
            WorkingDay::Working => "Working Day",
        }
    }
}

/// Name of a weekday code (0 = Sunday)
pub fn weekday_name(weekday: u8) -> Option<&'static str> {
    WEEKDAY_NAMES.get(usize::from(weekday)).copied()
}

/// Short name of a month number (1 = Jan)
pub fn month_name(month: u32) -> Option<&'static str> {
    let index = usize::try_from(month).ok()?.checked_sub(1)?;
    MONTH_NAMES.get(index).copied()
}

/// Days since 1970-01-01, the physical value of a Polars `Date`
pub fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Inverse of [`epoch_days`]
pub fn date_from_epoch_days(days: i64) -> Option<NaiveDate> {
    i32::try_from(days)
        .ok()?
        .checked_add(EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// One row of the input table: a day, or an hour of a day for hourly files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentalRecord {
    pub date: NaiveDate,
    pub season: Season,
    /// 0 = Sunday ... 6 = Saturday
    pub weekday: u8,
    pub workingday: WorkingDay,
    pub casual: u32,
    pub registered: u32,
    pub cnt: u32,
}

impl RentalRecord {
    /// Calendar month (1-12), derived from the date
    pub fn month(&self) -> u32 {
        self.date.month()
    }

    /// Whether `cnt == casual + registered`
    pub fn is_consistent(&self) -> bool {
        u64::from(self.casual) + u64::from(self.registered) == u64::from(self.cnt)
    }
}

/// A loaded table of rental records, sorted by date and never empty
///
/// Holds the validated records alongside a typed frame of the same rows
/// (see [`frame_from_records`]) that the aggregation runs on.
#[derive(Debug, Clone)]
pub struct RentalDataset {
    records: Vec<RentalRecord>,
    frame: DataFrame,
}

impl RentalDataset {
    /// Build a dataset, sorting the records by date.
    ///
    /// The sort is stable so hourly rows of the same day keep their input order.
    pub fn new(mut records: Vec<RentalRecord>) -> crate::Result<Self> {
        if records.is_empty() {
            anyhow::bail!("No rental records found");
        }
        records.sort_by_key(|record| record.date);
        let frame = frame_from_records(&records)?;
        Ok(Self { records, frame })
    }

    pub fn records(&self) -> &[RentalRecord] {
        &self.records
    }

    /// Records as a frame: `dteday` (Date) plus Int64 code and count columns
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false: a dataset holds at least one record
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn min_date(&self) -> NaiveDate {
        self.records[0].date
    }

    pub fn max_date(&self) -> NaiveDate {
        self.records[self.records.len() - 1].date
    }

    /// Range spanning the first to the last date
    pub fn full_range(&self) -> DateRange {
        DateRange::spanning(self.min_date(), self.max_date())
    }

    /// Records whose date lies inside `range`
    pub fn in_range(&self, range: &DateRange) -> &[RentalRecord] {
        let lo = self.records.partition_point(|r| r.date < range.start());
        let hi = self.records.partition_point(|r| r.date <= range.end());
        &self.records[lo..hi.max(lo)]
    }
}

/// Build the typed frame the aggregation works on
///
/// Columns: `dteday` (Date), then `season` (code 1-4), `weekday`, `workingday`
/// (0/1), `casual`, `registered` and `cnt`, all Int64.
pub fn frame_from_records(records: &[RentalRecord]) -> PolarsResult<DataFrame> {
    let days: Vec<i32> = records.iter().map(|record| epoch_days(record.date)).collect();
    let dteday = Int32Chunked::from_vec("dteday", days).into_date().into_series();

    let column = |name: &str, value: fn(&RentalRecord) -> i64| {
        Series::new(name, records.iter().map(value).collect::<Vec<i64>>())
    };

    DataFrame::new(vec![
        dteday,
        column("season", |r| i64::from(r.season.code())),
        column("weekday", |r| i64::from(r.weekday)),
        column("workingday", |r| match r.workingday {
            WorkingDay::NonWorking => 0,
            WorkingDay::Working => 1,
        }),
        column("casual", |r| i64::from(r.casual)),
        column("registered", |r| i64::from(r.registered)),
        column("cnt", |r| i64::from(r.cnt)),
    ])
}

/// Load a rental CSV and build a sorted dataset
///
/// # Arguments
/// * `path` - Path to a daily or hourly CSV carrying at least [`REQUIRED_COLUMNS`]
///
/// # Returns
/// * `RentalDataset` sorted by date
pub fn load_rentals<P: AsRef<Path>>(path: P) -> crate::Result<RentalDataset> {
    let path = path.as_ref();

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("failed to open {}", path.display()))?
        .finish()
        .with_context(|| format!("failed to parse CSV {}", path.display()))?;

    debug!(rows = df.height(), columns = df.width(), "csv parsed");

    let records = records_from_frame(&df)?;
    let dataset = RentalDataset::new(records)
        .with_context(|| format!("no data rows in {}", path.display()))?;

    info!(
        path = %path.display(),
        records = dataset.len(),
        first = %dataset.min_date(),
        last = %dataset.max_date(),
        "loaded rental records"
    );

    Ok(dataset)
}

/// Convert a frame holding [`REQUIRED_COLUMNS`] into records
///
/// Row numbers in error messages are 1-based data rows (header excluded).
pub fn records_from_frame(df: &DataFrame) -> crate::Result<Vec<RentalRecord>> {
    let df = df
        .select(REQUIRED_COLUMNS)
        .context("input is missing a required column")?;

    let dates_series = df.column("dteday")?.cast(&DataType::String)?;
    let dates: Vec<Option<&str>> = dates_series.str()?.into_iter().collect();
    let season = int_column(&df, "season")?;
    let weekday = int_column(&df, "weekday")?;
    let workingday = int_column(&df, "workingday")?;
    let casual = int_column(&df, "casual")?;
    let registered = int_column(&df, "registered")?;
    let cnt = int_column(&df, "cnt")?;

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let line = row + 1;

        let raw_date = dates[row]
            .ok_or_else(|| anyhow::anyhow!("row {line}: missing value in column 'dteday'"))?;
        let date = NaiveDate::parse_from_str(raw_date.trim(), DATE_FORMAT)
            .with_context(|| format!("row {line}: invalid date '{raw_date}'"))?;

        let season_code = cell(&season, row, "season")?;
        let season = Season::from_code(season_code)
            .ok_or_else(|| anyhow::anyhow!("row {line}: unknown season code {season_code}"))?;

        let weekday_code = cell(&weekday, row, "weekday")?;
        let weekday = u8::try_from(weekday_code)
            .ok()
            .filter(|day| *day <= 6)
            .ok_or_else(|| anyhow::anyhow!("row {line}: weekday must be 0-6, got {weekday_code}"))?;

        let flag = cell(&workingday, row, "workingday")?;
        let workingday = WorkingDay::from_flag(flag)
            .ok_or_else(|| anyhow::anyhow!("row {line}: workingday must be 0 or 1, got {flag}"))?;

        records.push(RentalRecord {
            date,
            season,
            weekday,
            workingday,
            casual: count(&casual, row, "casual")?,
            registered: count(&registered, row, "registered")?,
            cnt: count(&cnt, row, "cnt")?,
        });
    }

    Ok(records)
}

/// Collect a column as Int64, rejecting fractional or non-numeric cells
fn int_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<i64>>> {
    let series = df.column(name)?;

    if series.dtype().is_float() {
        let floats = series.cast(&DataType::Float64)?;
        let fractional = floats
            .f64()?
            .into_iter()
            .enumerate()
            .find_map(|(row, value)| value.filter(|v| v.fract() != 0.0).map(|v| (row, v)));
        if let Some((row, value)) = fractional {
            anyhow::bail!(
                "row {}: column '{}' must hold whole numbers, got {}",
                row + 1,
                name,
                value
            );
        }
    }

    let series = series
        .strict_cast(&DataType::Int64)
        .with_context(|| format!("column '{name}' holds non-integer values"))?;
    Ok(series.i64()?.into_iter().collect())
}

fn cell(values: &[Option<i64>], row: usize, name: &str) -> crate::Result<i64> {
    values[row].ok_or_else(|| anyhow::anyhow!("row {}: missing value in column '{}'", row + 1, name))
}

fn count(values: &[Option<i64>], row: usize, name: &str) -> crate::Result<u32> {
    let value = cell(values, row, name)?;
    u32::try_from(value).map_err(|_| {
        anyhow::anyhow!(
            "row {}: column '{}' must be a non-negative count, got {}",
            row + 1,
            name,
            value
        )
    })
}
