use crate::config::TrendConfig;
use crate::models::{ProgressLog, TrendDirection, TrendResult, TrendStrength};
use crate::score::parse_score;
use crate::stats::{magnitude, mean};

/// Normalized scores in chronological order, ties broken by log id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericSeries {
    values: Vec<f64>,
}

impl NumericSeries {
    pub fn from_logs<'a, I>(logs: I) -> Self
    where
        I: IntoIterator<Item = &'a ProgressLog>,
    {
        let mut ordered: Vec<&ProgressLog> = logs.into_iter().collect();
        ordered.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

        let values = ordered
            .into_iter()
            .filter_map(|log| parse_score(&log.score))
            .collect();
        Self { values }
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

pub fn fit_line(values: &[f64]) -> Option<LinearFit> {
    if values.len() < 2 {
        return None;
    }

    let fit = least_squares(values);
    if fit.slope.is_finite() && fit.intercept.is_finite() && !fit.r_squared.is_nan() {
        return Some(fit);
    }

    // Sums of squares overflowed; fit on values scaled into [-1, 1].
    let scale = magnitude(values);
    let scaled: Vec<f64> = values.iter().map(|value| value / scale).collect();
    let fit = least_squares(&scaled);
    Some(LinearFit {
        slope: fit.slope * scale,
        intercept: fit.intercept * scale,
        r_squared: fit.r_squared,
    })
}

fn least_squares(values: &[f64]) -> LinearFit {
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = mean(values);

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (index, value) in values.iter().enumerate() {
        let dx = index as f64 - mean_x;
        let dy = value - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let r_squared = if syy == 0.0 {
        0.0
    } else {
        ((sxy * sxy) / (sxx * syy)).clamp(0.0, 1.0)
    };

    LinearFit {
        slope,
        intercept,
        r_squared,
    }
}

pub fn analyze_trend(scores: &[f64]) -> TrendResult {
    analyze_trend_with(scores, &TrendConfig::default())
}

pub fn analyze_trend_with(scores: &[f64], config: &TrendConfig) -> TrendResult {
    let finite: Vec<f64> = scores.iter().copied().filter(|v| v.is_finite()).collect();
    let Some(fit) = fit_line(&finite) else {
        return TrendResult::flat();
    };

    let direction = if fit.slope > config.direction_epsilon {
        TrendDirection::Improving
    } else if fit.slope < -config.direction_epsilon {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    let magnitude = fit.slope.abs();
    let strength = if magnitude >= config.strong_slope {
        TrendStrength::Strong
    } else if magnitude >= config.moderate_slope {
        TrendStrength::Moderate
    } else {
        TrendStrength::Weak
    };

    TrendResult {
        direction,
        strength,
        confidence: confidence(fit.r_squared, finite.len(), config),
        slope: fit.slope,
        intercept: fit.intercept,
    }
}

fn confidence(r_squared: f64, samples: usize, config: &TrendConfig) -> u8 {
    let full = config.full_confidence_samples.max(1);
    let size_weight = samples.min(full) as f64 / full as f64;
    (r_squared * size_weight * 100.0).round().clamp(0.0, 100.0) as u8
}
