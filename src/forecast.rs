use chrono::{Duration, NaiveDate};

use crate::models::{DatedForecast, ForecastPoint};
use crate::trend::fit_line;

/// A single score projects flat at that score.
pub fn predict_future_values(scores: &[f64], count: usize) -> Vec<ForecastPoint> {
    let finite: Vec<f64> = scores.iter().copied().filter(|v| v.is_finite()).collect();
    if count == 0 || finite.is_empty() {
        return Vec::new();
    }

    let (slope, intercept) = match fit_line(&finite) {
        Some(fit) => (fit.slope, fit.intercept),
        None => (0.0, finite[0]),
    };
    let last_index = (finite.len() - 1) as f64;

    (1..=count)
        .map(|step| ForecastPoint {
            value: slope * (last_index + step as f64) + intercept,
        })
        .collect()
}

/// Stops at the last representable date.
pub fn project_dates(
    last_date: NaiveDate,
    cadence_days: i64,
    forecasts: &[ForecastPoint],
) -> Vec<DatedForecast> {
    let cadence = cadence_days.max(1);
    forecasts
        .iter()
        .zip(1i64..)
        .map_while(|(point, step)| {
            let date = cadence
                .checked_mul(step)
                .and_then(Duration::try_days)
                .and_then(|span| last_date.checked_add_signed(span))?;
            Some(DatedForecast {
                date,
                value: point.value,
            })
        })
        .collect()
}
