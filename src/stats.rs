use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{Descriptive, DistributionBucket, PassRate};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum = values.iter().sum::<f64>();
    if sum.is_finite() {
        sum / n
    } else {
        values.iter().map(|value| value / n).sum()
    }
}

pub(crate) fn magnitude(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc: f64, value| acc.max(value.abs()))
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let deviation = population_deviation(values);
    if deviation.is_finite() {
        return deviation;
    }

    let scale = magnitude(values);
    let scaled: Vec<f64> = values.iter().map(|value| value / scale).collect();
    population_deviation(&scaled) * scale
}

fn population_deviation(values: &[f64]) -> f64 {
    let avg = mean(values);
    let variance = values.iter().map(|value| (value - avg).powi(2)).sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

pub fn describe(values: &[f64]) -> Descriptive {
    if values.is_empty() {
        return Descriptive {
            count: 0,
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            min: 0.0,
            max: 0.0,
        };
    }

    Descriptive {
        count: values.len(),
        mean: mean(values),
        median: median(values),
        std_dev: std_dev(values),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Whole percentages summing to exactly 100, largest bucket first. The
/// rounding remainder goes to the largest bucket.
pub fn distribution_by_key<T, K, F>(items: &[T], key_fn: F) -> Vec<DistributionBucket>
where
    K: Into<String>,
    F: Fn(&T) -> K,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(key_fn(item).into()).or_insert(0) += 1;
    }

    let total = items.len();
    let mut buckets: Vec<(String, usize, i64)> = counts
        .into_iter()
        .map(|(key, count)| {
            let share = (count as f64 / total as f64 * 100.0).round() as i64;
            (key, count, share)
        })
        .collect();
    buckets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut remainder = 100 - buckets.iter().map(|bucket| bucket.2).sum::<i64>();
    for bucket in buckets.iter_mut() {
        if remainder == 0 {
            break;
        }
        let adjusted = (bucket.2 + remainder).max(0);
        remainder -= adjusted - bucket.2;
        bucket.2 = adjusted;
    }

    buckets
        .into_iter()
        .map(|(key, count, percentage)| DistributionBucket {
            key,
            count,
            percentage: percentage as u32,
        })
        .collect()
}

pub fn pass_rate(values: &[f64], passing_score: f64) -> PassRate {
    let total = values.len();
    let passed = values.iter().filter(|value| **value >= passing_score).count();
    let failed = total - passed;
    let rate = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        }
    };

    PassRate {
        total,
        passed,
        failed,
        pass_rate: rate(passed),
        fail_rate: rate(failed),
    }
}

pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let mean_x = mean(xs);
    let mean_y = mean(ys);
    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(covariance / (var_x.sqrt() * var_y.sqrt()))
}

pub fn interpret_correlation(r: f64) -> String {
    let magnitude = r.abs();
    let strength = if magnitude >= 0.7 {
        "strong"
    } else if magnitude >= 0.4 {
        "moderate"
    } else if magnitude >= 0.2 {
        "weak"
    } else {
        "very weak"
    };
    let direction = if r > 0.0 { "positive" } else { "negative" };
    format!("{strength} {direction}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_median_of_empty_input_are_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(median(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
    }

    #[test]
    fn mean_lies_between_min_and_max() {
        let samples: [&[f64]; 4] = [
            &[3.0],
            &[10.0, -4.0, 7.5],
            &[0.1, 0.2, 0.3, 1e6],
            &[55.0, 55.0, 55.0],
        ];
        for values in samples {
            let stats = describe(values);
            assert!(stats.mean >= stats.min && stats.mean <= stats.max);
        }
    }

    #[test]
    fn extreme_magnitudes_do_not_overflow() {
        let huge = [1.5e308, 1.5e308];
        assert_eq!(mean(&huge), 1.5e308);

        let mixed = [1.7e308, -1.0e308, 1.7e308];
        let stats = describe(&mixed);
        assert!(stats.mean.is_finite());
        assert!(stats.mean >= stats.min && stats.mean <= stats.max);

        let spread = std_dev(&[1.5e308, -1.5e308]);
        assert!((spread / 1.5e308 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn median_handles_odd_and_even_lengths() {
        assert_eq!(median(&[9.0, 1.0, 5.0]), 5.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn std_dev_is_population_based() {
        let value = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((value - 2.0).abs() < 0.001);
    }

    #[test]
    fn distribution_percentages_sum_to_one_hundred() {
        let thirds = ["a", "b", "c"];
        let buckets = distribution_by_key(&thirds, |item| item.to_string());
        assert_eq!(buckets.iter().map(|b| b.percentage).sum::<u32>(), 100);
        assert_eq!(buckets[0].key, "a");
        assert_eq!(buckets[0].percentage, 34);

        let skewed = ["x", "x", "y", "z", "z", "z", "w"];
        let buckets = distribution_by_key(&skewed, |item| item.to_string());
        assert_eq!(buckets.iter().map(|b| b.percentage).sum::<u32>(), 100);
        assert_eq!(buckets[0].key, "z");
        assert_eq!(buckets[0].count, 3);
    }

    #[test]
    fn distribution_never_goes_negative_with_many_small_buckets() {
        let items: Vec<usize> = (0..200).collect();
        let buckets = distribution_by_key(&items, |item| format!("k{item:03}"));
        assert_eq!(buckets.len(), 200);
        assert_eq!(buckets.iter().map(|b| b.percentage).sum::<u32>(), 100);
    }

    #[test]
    fn distribution_of_empty_input_is_empty() {
        let items: [&str; 0] = [];
        assert!(distribution_by_key(&items, |item| item.to_string()).is_empty());
    }

    #[test]
    fn pass_rate_counts_threshold_inclusively() {
        let rate = pass_rate(&[60.0, 59.9, 75.0, 40.0], 60.0);
        assert_eq!(rate.passed, 2);
        assert_eq!(rate.failed, 2);
        assert!((rate.pass_rate - 50.0).abs() < 0.001);

        let empty = pass_rate(&[], 60.0);
        assert_eq!(empty.pass_rate, 0.0);
        assert_eq!(empty.fail_rate, 0.0);
    }

    #[test]
    fn correlation_detects_direction() {
        let r = pearson(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 6.0, 8.0]).unwrap();
        assert!((r - 1.0).abs() < 0.001);
        assert_eq!(interpret_correlation(r), "strong positive");
        assert_eq!(interpret_correlation(-0.45), "moderate negative");
        assert_eq!(pearson(&[1.0, 1.0], &[3.0, 4.0]), None);
        assert_eq!(pearson(&[1.0], &[3.0]), None);
    }
}
