use serde_json::Value;

use crate::models::Goal;

/// Strings may carry a single trailing `%`.
pub fn parse_score(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(number) => number.as_f64().filter(|value| value.is_finite()),
        Value::String(text) => parse_score_str(text),
        _ => None,
    }
}

pub fn parse_score_str(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    if trimmed.is_empty() {
        return None;
    }

    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

pub fn letter_grade(score: f64) -> &'static str {
    match score {
        s if s >= 90.0 => "A",
        s if s >= 80.0 => "B",
        s if s >= 70.0 => "C",
        s if s >= 60.0 => "D",
        _ => "F",
    }
}

pub fn goal_progress(goal: &Goal, score: f64) -> f64 {
    let span = goal.target - goal.baseline;
    if span == 0.0 || !span.is_finite() || !score.is_finite() {
        return 0.0;
    }

    ((score - goal.baseline) / span * 100.0).clamp(0.0, 100.0)
}
