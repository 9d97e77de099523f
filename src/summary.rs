use std::collections::HashSet;

use chrono::{Duration, NaiveDate};

use crate::compare::{active_goal_count, calculate_goal_summaries};
use crate::config::{AnalyticsConfig, SummaryConfig};
use crate::models::{Goal, GoalStatus, GoalSummary, ProgressLog, Student, Summary};
use crate::score::letter_grade;
use crate::stats::{distribution_by_key, mean, pass_rate};
use crate::timeseries::generate_time_series_data;
use crate::trend::{analyze_trend_with, NumericSeries};

fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}

pub fn generate_summary(
    students: &[Student],
    goals: &[Goal],
    logs: &[ProgressLog],
    as_of: NaiveDate,
    config: &AnalyticsConfig,
) -> Summary {
    let goal_summaries = calculate_goal_summaries(goals, logs, &config.trend, &config.summary);
    let on_track = goal_summaries.iter().filter(|goal| goal.on_track).count();
    let completed = goals
        .iter()
        .filter(|goal| goal.status == GoalStatus::Completed)
        .count();

    let series = NumericSeries::from_logs(logs);
    let scores = series.values();

    let graded: Vec<&GoalSummary> = goal_summaries
        .iter()
        .filter(|goal| goal.recent_average.is_some())
        .collect();
    let grade_distribution = distribution_by_key(&graded, |goal| {
        letter_grade(goal.recent_average.unwrap_or_default())
    });
    let recent_averages: Vec<f64> = graded.iter().filter_map(|goal| goal.recent_average).collect();

    Summary {
        as_of,
        total_students: students.len(),
        total_goals: goals.len(),
        active_goals: active_goal_count(goals),
        total_logs: logs.len(),
        average_score: mean(&scores),
        on_track_percentage: percentage(on_track, goals.len()),
        completion_rate: percentage(completed, goals.len()),
        data_quality: data_quality(goals, logs, as_of, &config.summary),
        overall_trend: analyze_trend_with(&scores, &config.trend),
        grade_distribution,
        goal_pass_rate: pass_rate(&recent_averages, config.summary.struggling_threshold),
        recent_activity: generate_time_series_data(logs, config.summary.activity_days, as_of),
    }
}

/// See [`SummaryConfig`] for the formula.
pub fn data_quality(
    goals: &[Goal],
    logs: &[ProgressLog],
    as_of: NaiveDate,
    config: &SummaryConfig,
) -> u32 {
    if goals.is_empty() {
        return 0;
    }

    let goal_ids: HashSet<&str> = goals.iter().map(|goal| goal.id.as_str()).collect();
    let window_start = Duration::try_days(config.recency_days.max(0))
        .and_then(|span| as_of.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN);
    let mut attached = 0usize;
    let mut recent_goals: HashSet<&str> = HashSet::new();
    for log in logs {
        if !goal_ids.contains(log.goal_id.as_str()) {
            continue;
        }
        attached += 1;
        if log.date >= window_start && log.date <= as_of {
            recent_goals.insert(log.goal_id.as_str());
        }
    }

    let logs_per_goal = attached as f64 / goals.len() as f64;
    let density = if config.target_logs_per_goal > 0.0 {
        (logs_per_goal / config.target_logs_per_goal).min(1.0)
    } else {
        1.0
    };
    let recency = recent_goals.len() as f64 / goals.len() as f64;

    let blended = config.density_weight * density + config.recency_weight * recency;
    (blended * 100.0).round().clamp(0.0, 100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
    }

    fn goal(id: &str, target: f64, status: GoalStatus) -> Goal {
        Goal {
            id: id.to_string(),
            student_id: "s1".to_string(),
            area: "Behavior".to_string(),
            baseline: 0.0,
            target,
            metric: "%".to_string(),
            status,
            description: None,
        }
    }

    fn log(id: &str, goal_id: &str, days_ago: i64, score: Value) -> ProgressLog {
        ProgressLog {
            id: id.to_string(),
            goal_id: goal_id.to_string(),
            date: as_of() - Duration::days(days_ago),
            score,
            notes: Some("observed in class".to_string()),
        }
    }

    fn fixture() -> (Vec<Student>, Vec<Goal>, Vec<ProgressLog>) {
        let students = vec![Student {
            id: "s1".to_string(),
            name: "Avery Lee".to_string(),
            grade: None,
            disability: None,
        }];
        let goals = vec![
            goal("g1", 80.0, GoalStatus::Active),
            goal("g2", 90.0, GoalStatus::Completed),
            goal("g3", 50.0, GoalStatus::Archived),
            goal("g4", 70.0, GoalStatus::Active),
        ];
        let logs = vec![
            log("a", "g1", 40, json!(70)),
            log("b", "g1", 3, json!(90)),
            log("c", "g2", 60, json!(60)),
            log("d", "g3", 1, json!("55%")),
            log("e", "g3", 20, json!(45)),
        ];
        (students, goals, logs)
    }

    #[test]
    fn summarizes_goal_outcomes() {
        let (students, goals, logs) = fixture();
        let config = AnalyticsConfig::default();
        let summary = generate_summary(&students, &goals, &logs, as_of(), &config);

        assert_eq!(summary.total_students, 1);
        assert_eq!(summary.total_goals, 4);
        assert_eq!(summary.active_goals, 2);
        assert_eq!(summary.total_logs, 5);
        // g1 averages 80 against 80, g3 averages 50 against 50
        assert_eq!(summary.on_track_percentage, 50);
        assert_eq!(summary.completion_rate, 25);
        assert!((summary.average_score - 64.0).abs() < 0.001);
        assert_eq!(summary.recent_activity.len(), 30);
        assert_eq!(summary.recent_activity[29].date, as_of());
        assert_eq!(
            summary.grade_distribution.iter().map(|b| b.percentage).sum::<u32>(),
            100
        );
        // recent averages 80, 60 and 50 against a passing score of 60
        assert_eq!(summary.goal_pass_rate.total, 3);
        assert_eq!(summary.goal_pass_rate.passed, 2);
    }

    #[test]
    fn data_quality_blends_density_and_recency() {
        let (_, goals, logs) = fixture();
        // 5 logs over 4 goals against a target of 10 per goal, 2 of 4 goals recent
        let quality = data_quality(&goals, &logs, as_of(), &SummaryConfig::default());
        assert_eq!(quality, 31);

        let recency_only = SummaryConfig {
            density_weight: 0.0,
            recency_weight: 1.0,
            ..SummaryConfig::default()
        };
        assert_eq!(data_quality(&goals, &logs, as_of(), &recency_only), 50);
    }

    #[test]
    fn unbounded_windows_do_not_panic() {
        let (students, goals, logs) = fixture();
        let recency_only = SummaryConfig {
            density_weight: 0.0,
            recency_weight: 1.0,
            recency_days: i64::MAX,
            ..SummaryConfig::default()
        };
        // every goal with a log counts as recent: g1, g2 and g3 of 4
        assert_eq!(data_quality(&goals, &logs, as_of(), &recency_only), 75);

        let mut config = AnalyticsConfig::default();
        config.summary.recency_days = i64::MAX;
        config.summary.activity_days = usize::MAX;
        let summary = generate_summary(&students, &goals, &logs, as_of(), &config);
        assert!(summary.recent_activity.is_empty());
        assert_eq!(summary.total_logs, 5);
    }

    #[test]
    fn empty_snapshot_produces_zeroed_summary() {
        let summary = generate_summary(&[], &[], &[], as_of(), &AnalyticsConfig::default());
        assert_eq!(summary.on_track_percentage, 0);
        assert_eq!(summary.completion_rate, 0);
        assert_eq!(summary.data_quality, 0);
        assert_eq!(summary.average_score, 0.0);
        assert!(summary.grade_distribution.is_empty());
        assert!(summary.recent_activity.iter().all(|p| p.avg_score.is_none()));
    }

    #[test]
    fn summary_serializes_with_camel_case_fields() {
        let (students, goals, logs) = fixture();
        let config = AnalyticsConfig::default();
        let summary = generate_summary(&students, &goals, &logs, as_of(), &config);
        let value = serde_json::to_value(&summary).unwrap();
        assert!(value.get("onTrackPercentage").is_some());
        assert!(value.get("dataQuality").is_some());
        assert_eq!(value["overallTrend"]["direction"], json!("improving"));
    }
}
