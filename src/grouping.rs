//! Group-by-key reduction shared by every summary table, using Polars
//!
//! Input frames carry the columns produced by
//! [`frame_from_records`](crate::data::frame_from_records).

use polars::prelude::*;
use serde::Serialize;

/// Count columns reduced in every grouped table
pub const VALUE_COLUMNS: [&str; 3] = ["casual", "registered", "cnt"];

/// How a group's counts are reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
}

impl Reduction {
    /// Aggregation expression for one column, keeping the column's name
    fn apply(self, column: &str) -> Expr {
        match self {
            Reduction::Sum => col(column).sum(),
            Reduction::Mean => col(column).mean(),
        }
        .alias(column)
    }
}

/// Row order of a grouped table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOrder<K> {
    /// Ascending by the key's natural order
    Ascending,
    /// Listed keys first in the given order, any others after them ascending
    Fixed(Vec<K>),
}

/// Group key: an integer-valued expression and the decoding of its values
#[derive(Debug, Clone)]
pub struct KeySelector<K> {
    expr: Expr,
    decode: fn(i64) -> Option<K>,
}

impl<K> KeySelector<K> {
    pub fn new(expr: Expr, decode: fn(i64) -> Option<K>) -> Self {
        Self { expr, decode }
    }

    /// Group by a column as stored
    pub fn column(name: &str, decode: fn(i64) -> Option<K>) -> Self {
        Self::new(col(name), decode)
    }
}

/// Exact integer totals of one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountTotals {
    pub records: usize,
    pub casual: u64,
    pub registered: u64,
    pub cnt: u64,
}

/// Reduced `casual`, `registered` and `cnt` of a group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnValues {
    pub casual: f64,
    pub registered: f64,
    pub cnt: f64,
}

/// One row of a grouped table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupRow<K> {
    pub key: K,
    /// Number of records reduced into this row
    pub records: usize,
    pub values: ColumnValues,
}

/// Run `group_by(key).agg(...)` and sort by key
///
/// Output columns: `key` (Int64), `records`, then [`VALUE_COLUMNS`].
fn grouped_frame<K>(
    frame: &DataFrame,
    selector: &KeySelector<K>,
    reduction: Reduction,
) -> PolarsResult<DataFrame> {
    let mut aggs = vec![col("cnt").count().alias("records")];
    aggs.extend(VALUE_COLUMNS.iter().map(|column| reduction.apply(column)));

    frame
        .clone()
        .lazy()
        .group_by([selector.expr.clone().cast(DataType::Int64).alias("key")])
        .agg(aggs)
        .sort(["key"], SortMultipleOptions::default())
        .collect()
}

fn decode_keys<K>(grouped: &DataFrame, selector: &KeySelector<K>) -> PolarsResult<Vec<K>> {
    grouped
        .column("key")?
        .i64()?
        .into_iter()
        .map(|code| {
            code.and_then(selector.decode).ok_or_else(|| {
                PolarsError::ComputeError(format!("unexpected group key {code:?}").into())
            })
        })
        .collect()
}

fn record_counts(grouped: &DataFrame) -> PolarsResult<Vec<usize>> {
    let counts = grouped.column("records")?.cast(&DataType::UInt64)?;
    let counts = counts.u64()?.into_no_null_iter().map(|n| n as usize).collect();
    Ok(counts)
}

fn float_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let values = df.column(name)?.cast(&DataType::Float64)?;
    let values = values.f64()?.into_no_null_iter().collect();
    Ok(values)
}

fn total_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<u64>> {
    let values = df.column(name)?.cast(&DataType::UInt64)?;
    let values = values.u64()?.into_no_null_iter().collect();
    Ok(values)
}

/// Reorder rows already ascending by key so listed keys come first
fn apply_order<K: PartialEq, T>(rows: &mut [T], key: impl Fn(&T) -> &K, order: &KeyOrder<K>) {
    if let KeyOrder::Fixed(listed) = order {
        // stable: unlisted keys keep their ascending order at the tail
        rows.sort_by_key(|row| {
            listed
                .iter()
                .position(|l| l == key(row))
                .unwrap_or(listed.len())
        });
    }
}

/// Group the frame by `selector` and return exact totals per key, in `order`
pub fn group_totals<K: PartialEq>(
    frame: &DataFrame,
    selector: &KeySelector<K>,
    order: &KeyOrder<K>,
) -> PolarsResult<Vec<(K, CountTotals)>> {
    let grouped = grouped_frame(frame, selector, Reduction::Sum)?;

    let keys = decode_keys(&grouped, selector)?;
    let records = record_counts(&grouped)?;
    let casual = total_column(&grouped, "casual")?;
    let registered = total_column(&grouped, "registered")?;
    let cnt = total_column(&grouped, "cnt")?;

    let mut rows: Vec<(K, CountTotals)> = keys
        .into_iter()
        .enumerate()
        .map(|(i, key)| {
            let totals = CountTotals {
                records: records[i],
                casual: casual[i],
                registered: registered[i],
                cnt: cnt[i],
            };
            (key, totals)
        })
        .collect();
    apply_order(&mut rows, |(key, _)| key, order);
    Ok(rows)
}

/// Group the frame by `selector`, reduce each group with `reduction`, and order rows by `order`
///
/// # Arguments
/// * `frame` - Record frame, already restricted to the rows of interest
/// * `selector` - Key expression and its decoding
/// * `reduction` - Column reduction applied per group
/// * `order` - Output row order
///
/// # Returns
/// * One row per distinct key present in `frame`
pub fn group_reduce<K: PartialEq>(
    frame: &DataFrame,
    selector: &KeySelector<K>,
    reduction: Reduction,
    order: &KeyOrder<K>,
) -> PolarsResult<Vec<GroupRow<K>>> {
    let grouped = grouped_frame(frame, selector, reduction)?;

    let keys = decode_keys(&grouped, selector)?;
    let records = record_counts(&grouped)?;
    let casual = float_column(&grouped, "casual")?;
    let registered = float_column(&grouped, "registered")?;
    let cnt = float_column(&grouped, "cnt")?;

    let mut rows: Vec<GroupRow<K>> = keys
        .into_iter()
        .enumerate()
        .map(|(i, key)| GroupRow {
            key,
            records: records[i],
            values: ColumnValues {
                casual: casual[i],
                registered: registered[i],
                cnt: cnt[i],
            },
        })
        .collect();
    apply_order(&mut rows, |row| &row.key, order);
    Ok(rows)
}

/// Column-wise mean of every [`VALUE_COLUMNS`] entry over the whole frame
pub fn column_means(frame: &DataFrame) -> PolarsResult<ColumnValues> {
    let means = frame
        .clone()
        .lazy()
        .select(VALUE_COLUMNS.map(|column| Reduction::Mean.apply(column)))
        .collect()?;

    let scalar = |name: &str| -> PolarsResult<f64> {
        means
            .column(name)?
            .f64()?
            .get(0)
            .ok_or_else(|| PolarsError::ComputeError(format!("mean of '{name}' is undefined").into()))
    };

    Ok(ColumnValues {
        casual: scalar("casual")?,
        registered: scalar("registered")?,
        cnt: scalar("cnt")?,
    })
}
