use std::collections::BTreeMap;

use crate::config::AnomalyConfig;
use crate::models::{Anomaly, AnomalyKind, Goal, GoalAnomalies, ProgressLog};
use crate::score::parse_score;
use crate::stats::{mean, std_dev};

pub fn detect_anomalies(logs: &[ProgressLog]) -> Vec<Anomaly> {
    detect_anomalies_with(logs, &AnomalyConfig::default())
}

/// Samples smaller than `min_samples` and constant series never produce
/// anomalies.
pub fn detect_anomalies_with(logs: &[ProgressLog], config: &AnomalyConfig) -> Vec<Anomaly> {
    let mut scored: Vec<(&ProgressLog, f64)> = logs
        .iter()
        .filter_map(|log| parse_score(&log.score).map(|value| (log, value)))
        .collect();
    if scored.len() < config.min_samples.max(2) {
        return Vec::new();
    }

    let values: Vec<f64> = scored.iter().map(|(_, value)| *value).collect();
    let avg = mean(&values);
    let deviation = std_dev(&values);
    if deviation == 0.0 {
        return Vec::new();
    }

    scored.sort_by(|a, b| a.0.date.cmp(&b.0.date).then_with(|| a.0.id.cmp(&b.0.id)));
    scored
        .into_iter()
        .filter_map(|(log, value)| {
            let z_score = (value - avg) / deviation;
            if z_score.abs() <= config.z_threshold {
                return None;
            }
            Some(Anomaly {
                data: log.clone(),
                value,
                z_score,
                kind: if z_score > 0.0 {
                    AnomalyKind::Spike
                } else {
                    AnomalyKind::Drop
                },
            })
        })
        .collect()
}

pub fn detect_goal_anomalies(
    goals: &[Goal],
    logs: &[ProgressLog],
    config: &AnomalyConfig,
) -> Vec<GoalAnomalies> {
    let mut by_goal: BTreeMap<&str, Vec<ProgressLog>> = BTreeMap::new();
    for log in logs {
        by_goal.entry(log.goal_id.as_str()).or_default().push(log.clone());
    }

    goals
        .iter()
        .filter_map(|goal| {
            let history = by_goal.get(goal.id.as_str())?;
            let anomalies = detect_anomalies_with(history, config);
            if anomalies.is_empty() {
                None
            } else {
                Some(GoalAnomalies {
                    goal_id: goal.id.clone(),
                    anomalies,
                })
            }
        })
        .collect()
}
