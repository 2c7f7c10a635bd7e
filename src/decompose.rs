//! Additive moving-average decomposition of a daily series

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;

/// Yearly cycle of a daily series
pub const DEFAULT_DAILY_PERIOD: usize = 365;

/// Decomposition model; only the additive form is supported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecompositionModel {
    /// observed = trend + seasonal + residual
    #[default]
    Additive,
}

/// Selects one of the four aligned sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Observed,
    Trend,
    Seasonal,
    Residual,
}

/// One date of a decomposition
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecompositionPoint {
    pub date: NaiveDate,
    pub observed: f64,
    pub trend: Option<f64>,
    pub seasonal: f64,
    pub residual: Option<f64>,
}

/// Observed, trend, seasonal and residual sequences aligned on one date index
///
/// `trend` and `residual` are `None` in the first and last `period / 2`
/// positions, where no full centered window fits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    model: DecompositionModel,
    period: usize,
    dates: Vec<NaiveDate>,
    observed: Vec<f64>,
    trend: Vec<Option<f64>>,
    seasonal: Vec<f64>,
    residual: Vec<Option<f64>>,
}

impl Decomposition {
    pub fn model(&self) -> DecompositionModel {
        self.model
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn observed(&self) -> &[f64] {
        &self.observed
    }

    pub fn trend(&self) -> &[Option<f64>] {
        &self.trend
    }

    /// One full cycle repeated over the whole series
    pub fn seasonal(&self) -> &[f64] {
        &self.seasonal
    }

    pub fn residual(&self) -> &[Option<f64>] {
        &self.residual
    }

    /// A component as `(date, value)` pairs
    pub fn component(&self, component: Component) -> Vec<(NaiveDate, Option<f64>)> {
        let values: Box<dyn Iterator<Item = Option<f64>> + '_> = match component {
            Component::Observed => Box::new(self.observed.iter().map(|&v| Some(v))),
            Component::Trend => Box::new(self.trend.iter().copied()),
            Component::Seasonal => Box::new(self.seasonal.iter().map(|&v| Some(v))),
            Component::Residual => Box::new(self.residual.iter().copied()),
        };
        self.dates.iter().copied().zip(values).collect()
    }

    pub fn points(&self) -> impl Iterator<Item = DecompositionPoint> + '_ {
        (0..self.dates.len()).map(move |i| DecompositionPoint {
            date: self.dates[i],
            observed: self.observed[i],
            trend: self.trend[i],
            seasonal: self.seasonal[i],
            residual: self.residual[i],
        })
    }
}

/// Split a date-indexed series into trend, seasonal and residual components
///
/// # Arguments
/// * `series` - `(date, value)` pairs, strictly ascending by date
/// * `period` - Observations per seasonal cycle, at least 2
/// * `model` - Decomposition model
///
/// # Returns
/// * `Decomposition` aligned with `series`, or an error when the series is
///   shorter than two full periods or not strictly ascending
#[tracing::instrument(skip(series), fields(len = series.len()))]
pub fn decompose(
    series: &[(NaiveDate, f64)],
    period: usize,
    model: DecompositionModel,
) -> Result<Decomposition, PipelineError> {
    if period < 2 {
        return Err(PipelineError::InvalidPeriod { period });
    }
    // no series can hold more than usize::MAX points
    let required = period.saturating_mul(2);
    if series.len() < required {
        return Err(PipelineError::InvalidSeries {
            len: series.len(),
            required,
        });
    }
    if let Some(index) = series.windows(2).position(|pair| pair[0].0 >= pair[1].0) {
        return Err(PipelineError::UnorderedSeries { index: index + 1 });
    }

    let dates: Vec<NaiveDate> = series.iter().map(|&(date, _)| date).collect();
    let observed: Vec<f64> = series.iter().map(|&(_, value)| value).collect();

    let trend = centered_moving_average(&observed, period);
    let cycle = seasonal_cycle(&observed, &trend, period);
    let seasonal: Vec<f64> = (0..observed.len()).map(|t| cycle[t % period]).collect();
    let residual: Vec<Option<f64>> = observed
        .iter()
        .zip(&trend)
        .zip(&seasonal)
        .map(|((&obs, trend), &season)| trend.map(|trend| obs - trend - season))
        .collect();

    debug!(
        period,
        defined = trend.iter().filter(|t| t.is_some()).count(),
        "decomposition complete"
    );

    Ok(Decomposition {
        model,
        period,
        dates,
        observed,
        trend,
        seasonal,
        residual,
    })
}

/// Centered moving average of length `period`
///
/// Even periods use the `2 x period` filter `[0.5, 1, ..., 1, 0.5] / period`;
/// odd periods the plain mean. `None` where the window does not fit.
fn centered_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = period / 2;
    let mut trend = vec![None; n];
    if n < 2 * half + 1 {
        return trend;
    }

    for t in half..n - half {
        let window = &values[t - half..=t + half];
        let sum = if period % 2 == 0 {
            0.5 * window[0] + window[1..period].iter().sum::<f64>() + 0.5 * window[period]
        } else {
            window.iter().sum::<f64>()
        };
        trend[t] = Some(sum / period as f64);
    }
    trend
}

/// Mean detrended value per position in the cycle, centered to sum to zero
fn seasonal_cycle(observed: &[f64], trend: &[Option<f64>], period: usize) -> Vec<f64> {
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (t, (&obs, trend)) in observed.iter().zip(trend).enumerate() {
        if let Some(trend) = trend {
            sums[t % period] += obs - trend;
            counts[t % period] += 1;
        }
    }

    let mut cycle: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(&sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
        .collect();
    let offset = cycle.iter().sum::<f64>() / period as f64;
    for value in &mut cycle {
        *value -= offset;
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::Duration;

    fn series(values: &[f64]) -> Vec<(NaiveDate, f64)> {
        let start = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (start + Duration::days(i as i64), v))
            .collect()
    }

    #[test]
    fn test_recovers_linear_trend_and_even_cycle() {
        let pattern = [3.0, -1.0, 2.0, -4.0];
        let values: Vec<f64> = (0..16).map(|t| 10.0 + 0.5 * t as f64 + pattern[t % 4]).collect();

        let result = decompose(&series(&values), 4, DecompositionModel::Additive).unwrap();

        for t in 2..14 {
            assert_abs_diff_eq!(result.trend()[t].unwrap(), 10.0 + 0.5 * t as f64, epsilon = 1e-9);
            assert_abs_diff_eq!(result.residual()[t].unwrap(), 0.0, epsilon = 1e-9);
        }
        for t in 0..16 {
            assert_abs_diff_eq!(result.seasonal()[t], pattern[t % 4], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_odd_period_uses_plain_mean() {
        let values = [1.0, 2.0, 6.0, 1.0, 2.0, 6.0];
        let trend = centered_moving_average(&values, 3);
        assert_eq!(trend[0], None);
        assert_eq!(trend[1], Some(3.0));
        assert_eq!(trend[4], Some(3.0));
        assert_eq!(trend[5], None);
    }

    #[test]
    fn test_seasonal_cycle_sums_to_zero() {
        let values: Vec<f64> = (0..30).map(|t| ((t * 7) % 11) as f64).collect();
        let result = decompose(&series(&values), 5, DecompositionModel::Additive).unwrap();

        let cycle_sum: f64 = result.seasonal()[..5].iter().sum();
        assert_abs_diff_eq!(cycle_sum, 0.0, epsilon = 1e-9);
        for t in 5..30 {
            assert_eq!(result.seasonal()[t], result.seasonal()[t - 5]);
        }
    }

    #[test]
    fn test_boundary_markers_at_exact_minimum_length() {
        let values: Vec<f64> = (0..8).map(|t| t as f64).collect();
        let result = decompose(&series(&values), 4, DecompositionModel::Additive).unwrap();

        let defined: Vec<usize> = (0..8).filter(|&t| result.trend()[t].is_some()).collect();
        assert_eq!(defined, vec![2, 3, 4, 5]);
        assert!(result.residual()[..2].iter().all(Option::is_none));
        assert!(result.residual()[6..].iter().all(Option::is_none));
    }

    #[test]
    fn test_short_series_is_rejected() {
        let values = vec![1.0; 7];
        let result = decompose(&series(&values), 4, DecompositionModel::Additive);
        assert_eq!(result, Err(PipelineError::InvalidSeries { len: 7, required: 8 }));
    }

    #[test]
    fn test_huge_period_is_rejected_without_overflow() {
        let values = vec![1.0; 10];
        let result = decompose(&series(&values), usize::MAX / 2 + 1, DecompositionModel::Additive);
        assert_eq!(
            result,
            Err(PipelineError::InvalidSeries {
                len: 10,
                required: usize::MAX,
            })
        );
    }

    #[test]
    fn test_invalid_period_is_rejected() {
        let values = vec![1.0; 10];
        let result = decompose(&series(&values), 1, DecompositionModel::Additive);
        assert_eq!(result, Err(PipelineError::InvalidPeriod { period: 1 }));
    }

    #[test]
    fn test_duplicate_dates_are_rejected() {
        let mut input = series(&[1.0; 8]);
        input[5].0 = input[4].0;
        let result = decompose(&input, 2, DecompositionModel::Additive);
        assert_eq!(result, Err(PipelineError::UnorderedSeries { index: 5 }));
    }

    #[test]
    fn test_component_pairs_follow_dates() {
        let values: Vec<f64> = (0..6).map(|t| t as f64).collect();
        let input = series(&values);
        let result = decompose(&input, 2, DecompositionModel::Additive).unwrap();

        let observed = result.component(Component::Observed);
        assert_eq!(observed[3], (input[3].0, Some(3.0)));

        let trend = result.component(Component::Trend);
        assert_eq!(trend[0], (input[0].0, None));
        assert_eq!(result.points().count(), 6);
    }
}
