use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};

use crate::models::{ProgressLog, SmoothedPoint, TimeSeriesPoint};
use crate::score::parse_score;
use crate::stats::mean;

/// Exactly `days` entries ending at `end`, or none when the window would
/// start before the earliest representable date. Days without scores are
/// gaps, never zero-filled.
pub fn generate_time_series_data(
    logs: &[ProgressLog],
    days: usize,
    end: NaiveDate,
) -> Vec<TimeSeriesPoint> {
    if days == 0 {
        return Vec::new();
    }
    let Some(start) = i64::try_from(days - 1)
        .ok()
        .and_then(Duration::try_days)
        .and_then(|span| end.checked_sub_signed(span))
    else {
        return Vec::new();
    };

    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for log in logs {
        if log.date < start || log.date > end {
            continue;
        }
        if let Some(value) = parse_score(&log.score) {
            by_day.entry(log.date).or_default().push(value);
        }
    }

    (0..days)
        .map(|offset| {
            let date = start + Duration::days(offset as i64);
            TimeSeriesPoint {
                date,
                avg_score: by_day.get(&date).map(|values| mean(values)),
            }
        })
        .collect()
}

pub fn generate_time_series_ending_today(
    logs: &[ProgressLog],
    days: usize,
) -> Vec<TimeSeriesPoint> {
    generate_time_series_data(logs, days, Utc::now().date_naive())
}

/// Gaps and points with fewer than `window` values so far get `None`.
pub fn calculate_moving_average(
    series: &[TimeSeriesPoint],
    window: usize,
) -> Vec<SmoothedPoint> {
    let mut seen: Vec<f64> = Vec::new();

    series
        .iter()
        .map(|point| {
            let moving_average = match point.avg_score {
                Some(value) if window > 0 => {
                    seen.push(value);
                    if seen.len() >= window {
                        Some(mean(&seen[seen.len() - window..]))
                    } else {
                        None
                    }
                }
                _ => None,
            };

            SmoothedPoint {
                date: point.date,
                avg_score: point.avg_score,
                moving_average,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    fn log(id: &str, date: NaiveDate, score: Value) -> ProgressLog {
        ProgressLog {
            id: id.to_string(),
            goal_id: "g1".to_string(),
            date,
            score,
            notes: None,
        }
    }

    #[test]
    fn returns_exactly_requested_days_with_gaps() {
        let logs = vec![
            log("3", day(20), json!(90)),
            log("1", day(2), json!(40)),
            log("2", day(20), json!("70%")),
            log("4", day(25), json!("skipped")),
        ];
        let series = generate_time_series_data(&logs, 30, day(30));

        assert_eq!(series.len(), 30);
        assert_eq!(series[0].date, day(1));
        assert_eq!(series[29].date, day(30));
        assert_eq!(series[1].avg_score, Some(40.0));
        assert_eq!(series[19].avg_score, Some(80.0));
        assert_eq!(series[24].avg_score, None);
        assert_eq!(series.iter().filter(|p| p.avg_score.is_some()).count(), 2);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut logs = vec![
            log("a", day(3), json!(10)),
            log("b", day(4), json!(20)),
            log("c", day(4), json!(30)),
        ];
        let forward = generate_time_series_data(&logs, 7, day(7));
        logs.reverse();
        assert_eq!(generate_time_series_data(&logs, 7, day(7)), forward);
    }

    #[test]
    fn logs_outside_window_are_ignored() {
        let logs = vec![log("a", day(1), json!(10)), log("b", day(31), json!(10))];
        let series = generate_time_series_data(&logs, 5, day(10));
        assert!(series.iter().all(|p| p.avg_score.is_none()));
        assert!(generate_time_series_data(&logs, 0, day(10)).is_empty());
    }

    #[test]
    fn oversized_windows_return_nothing_instead_of_panicking() {
        let logs = vec![log("a", day(1), json!(10))];
        assert!(generate_time_series_data(&logs, 200_000_000_000_000, day(10)).is_empty());
        assert!(generate_time_series_data(&logs, usize::MAX, day(10)).is_empty());

        let near_start = NaiveDate::MIN + Duration::days(2);
        let series = generate_time_series_data(&[], 3, near_start);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].date, NaiveDate::MIN);
        assert!(generate_time_series_data(&[], 4, near_start).is_empty());
    }

    #[test]
    fn moving_average_requires_full_window() {
        let averages = [Some(10.0), None, Some(20.0), Some(30.0), None, Some(60.0)];
        let series: Vec<TimeSeriesPoint> = averages
            .into_iter()
            .enumerate()
            .map(|(i, avg_score)| TimeSeriesPoint {
                date: day(i as u32 + 1),
                avg_score,
            })
            .collect();

        let smoothed = calculate_moving_average(&series, 3);
        let values: Vec<Option<f64>> = smoothed.iter().map(|p| p.moving_average).collect();
        assert_eq!(values, vec![None, None, None, Some(20.0), None, Some(110.0 / 3.0)]);
        assert!(calculate_moving_average(&series, 0)
            .iter()
            .all(|p| p.moving_average.is_none()));
    }
}
