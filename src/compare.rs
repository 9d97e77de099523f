use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::{SummaryConfig, TrendConfig};
use crate::models::{
    ComparisonRow, Goal, GoalStatus, GoalSummary, ProgressLog, SkillAreaSummary, Student,
    StudentRanking,
};
use crate::score::{goal_progress, parse_score};
use crate::stats::{describe, mean, median};
use crate::trend::{analyze_trend_with, NumericSeries};

fn logs_by_goal(logs: &[ProgressLog]) -> HashMap<&str, Vec<&ProgressLog>> {
    let mut grouped: HashMap<&str, Vec<&ProgressLog>> = HashMap::new();
    for log in logs {
        grouped.entry(log.goal_id.as_str()).or_default().push(log);
    }
    grouped
}

pub fn calculate_student_comparisons(
    students: &[Student],
    goals: &[Goal],
    logs: &[ProgressLog],
) -> Vec<ComparisonRow> {
    calculate_student_comparisons_with(students, goals, logs, &TrendConfig::default())
}

/// One row per student, in input order, including students with no goals
/// or no logs. Logs pointing at unknown goals are ignored.
pub fn calculate_student_comparisons_with(
    students: &[Student],
    goals: &[Goal],
    logs: &[ProgressLog],
    config: &TrendConfig,
) -> Vec<ComparisonRow> {
    let grouped = logs_by_goal(logs);
    let mut goals_by_student: HashMap<&str, Vec<&Goal>> = HashMap::new();
    for goal in goals {
        goals_by_student
            .entry(goal.student_id.as_str())
            .or_default()
            .push(goal);
    }

    students
        .iter()
        .map(|student| {
            let owned = goals_by_student
                .get(student.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();

            let mut student_logs: Vec<&ProgressLog> = Vec::new();
            let mut by_area: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for goal in owned {
                let Some(goal_logs) = grouped.get(goal.id.as_str()) else {
                    continue;
                };
                for log in goal_logs {
                    if let Some(value) = parse_score(&log.score) {
                        by_area.entry(goal.area.clone()).or_default().push(value);
                    }
                }
                student_logs.extend(goal_logs.iter().copied());
            }

            let series = NumericSeries::from_logs(student_logs);
            let scores = series.values();
            let skill_averages = by_area
                .into_iter()
                .map(|(area, values)| (area, mean(&values)))
                .collect();

            ComparisonRow {
                id: student.id.clone(),
                name: student.name.clone(),
                grade: student.grade.clone(),
                disability: student.disability.clone(),
                total_goals: owned.len(),
                data_points: scores.len(),
                avg_score: mean(&scores),
                median_score: median(&scores),
                skill_averages,
                trend: analyze_trend_with(&scores, config),
            }
        })
        .collect()
}

pub fn calculate_goal_summaries(
    goals: &[Goal],
    logs: &[ProgressLog],
    trend_config: &TrendConfig,
    summary_config: &SummaryConfig,
) -> Vec<GoalSummary> {
    let grouped = logs_by_goal(logs);

    goals
        .iter()
        .map(|goal| {
            let history = grouped.get(goal.id.as_str()).cloned().unwrap_or_default();
            let scores = NumericSeries::from_logs(history).values();

            let window = summary_config.recent_window.max(1);
            let recent = &scores[scores.len().saturating_sub(window)..];
            let recent_average = if recent.is_empty() {
                None
            } else {
                Some(mean(recent))
            };
            let latest_score = scores.last().copied();

            GoalSummary {
                goal_id: goal.id.clone(),
                student_id: goal.student_id.clone(),
                area: goal.area.clone(),
                status: goal.status,
                data_points: scores.len(),
                latest_score,
                recent_average,
                progress_percentage: latest_score
                    .map(|score| goal_progress(goal, score))
                    .unwrap_or(0.0),
                on_track: recent_average.is_some_and(|avg| avg >= goal.target),
                trend: analyze_trend_with(&scores, trend_config),
            }
        })
        .collect()
}

pub fn calculate_skill_area_summaries(
    goals: &[Goal],
    logs: &[ProgressLog],
    config: &TrendConfig,
) -> Vec<SkillAreaSummary> {
    let grouped = logs_by_goal(logs);
    let mut areas: BTreeMap<&str, Vec<&Goal>> = BTreeMap::new();
    for goal in goals {
        areas.entry(goal.area.as_str()).or_default().push(goal);
    }

    areas
        .into_iter()
        .map(|(area, area_goals)| {
            let students: BTreeSet<&str> =
                area_goals.iter().map(|goal| goal.student_id.as_str()).collect();
            let area_logs: Vec<&ProgressLog> = area_goals
                .iter()
                .filter_map(|goal| grouped.get(goal.id.as_str()))
                .flatten()
                .copied()
                .collect();
            let scores = NumericSeries::from_logs(area_logs).values();

            SkillAreaSummary {
                area: area.to_string(),
                goal_count: area_goals.len(),
                student_count: students.len(),
                statistics: describe(&scores),
                trend: analyze_trend_with(&scores, config),
            }
        })
        .collect()
}

/// Highest averages first among students with data, plus everyone with data
/// averaging under `struggling_threshold`, lowest first. Ties break by id.
pub fn rank_students(
    rows: &[ComparisonRow],
    limit: usize,
    struggling_threshold: f64,
) -> StudentRanking {
    let mut with_data: Vec<&ComparisonRow> =
        rows.iter().filter(|row| row.data_points > 0).collect();
    with_data.sort_by(|a, b| {
        b.avg_score
            .partial_cmp(&a.avg_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    let top_performers = with_data.iter().take(limit).map(|row| (*row).clone()).collect();
    let struggling = with_data
        .iter()
        .rev()
        .filter(|row| row.avg_score < struggling_threshold)
        .take(limit)
        .map(|row| (*row).clone())
        .collect();

    StudentRanking {
        top_performers,
        struggling,
    }
}

pub fn active_goal_count(goals: &[Goal]) -> usize {
    goals
        .iter()
        .filter(|goal| goal.status == GoalStatus::Active)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrendDirection;
    use chrono::{Duration, NaiveDate};
    use serde_json::{json, Value};

    fn student(id: &str, name: &str) -> Student {
        Student {
            id: id.to_string(),
            name: name.to_string(),
            grade: Some("4".to_string()),
            disability: Some("SLD".to_string()),
        }
    }

    fn goal(id: &str, student_id: &str, area: &str, target: f64) -> Goal {
        Goal {
            id: id.to_string(),
            student_id: student_id.to_string(),
            area: area.to_string(),
            baseline: 20.0,
            target,
            metric: "%".to_string(),
            status: GoalStatus::Active,
            description: None,
        }
    }

    fn log(id: &str, goal_id: &str, day: i64, score: Value) -> ProgressLog {
        ProgressLog {
            id: id.to_string(),
            goal_id: goal_id.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap() + Duration::days(day),
            score,
            notes: None,
        }
    }

    fn fixture() -> (Vec<Student>, Vec<Goal>, Vec<ProgressLog>) {
        let students = vec![
            student("s1", "Avery Lee"),
            student("s2", "Jules Moreno"),
            student("s3", "Kiara Patel"),
        ];
        let goals = vec![
            goal("g1", "s1", "Reading", 80.0),
            goal("g2", "s1", "Math", 70.0),
            goal("g3", "s2", "Reading", 90.0),
        ];
        let logs = vec![
            log("l4", "g2", 3, json!("60%")),
            log("l1", "g1", 0, json!(40)),
            log("l2", "g1", 7, json!(50)),
            log("l3", "g2", 1, json!(70)),
            log("l5", "g1", 14, Value::Null),
            log("l6", "missing-goal", 2, json!(100)),
        ];
        (students, goals, logs)
    }

    #[test]
    fn builds_one_row_per_student() {
        let (students, goals, logs) = fixture();
        let rows = calculate_student_comparisons(&students, &goals, &logs);

        assert_eq!(rows.len(), 3);
        let avery = &rows[0];
        assert_eq!(avery.id, "s1");
        assert_eq!(avery.total_goals, 2);
        assert_eq!(avery.data_points, 4);
        assert!((avery.avg_score - 55.0).abs() < 0.001);
        assert!((avery.median_score - 55.0).abs() < 0.001);
        assert!((avery.skill_averages["Reading"] - 45.0).abs() < 0.001);
        assert!((avery.skill_averages["Math"] - 65.0).abs() < 0.001);
    }

    #[test]
    fn students_without_data_still_get_rows() {
        let (students, goals, logs) = fixture();
        let rows = calculate_student_comparisons(&students, &goals, &logs);

        let jules = &rows[1];
        assert_eq!(jules.total_goals, 1);
        assert_eq!(jules.data_points, 0);
        assert_eq!(jules.avg_score, 0.0);
        assert!(jules.skill_averages.is_empty());

        let kiara = &rows[2];
        assert_eq!(kiara.total_goals, 0);
        assert_eq!(kiara.data_points, 0);
        assert_eq!(kiara.trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn student_trend_uses_chronological_order_across_goals() {
        let students = vec![student("s1", "Avery Lee")];
        let goals = vec![goal("g1", "s1", "Reading", 80.0), goal("g2", "s1", "Math", 80.0)];
        let logs = vec![
            log("a", "g2", 4, json!(70)),
            log("b", "g1", 0, json!(30)),
            log("c", "g2", 2, json!(50)),
        ];
        let rows = calculate_student_comparisons(&students, &goals, &logs);
        assert_eq!(rows[0].trend.direction, TrendDirection::Improving);
        assert!((rows[0].trend.slope - 20.0).abs() < 0.001);
    }

    #[test]
    fn comparisons_are_deterministic() {
        let (students, goals, logs) = fixture();
        let first = calculate_student_comparisons(&students, &goals, &logs);
        let second = calculate_student_comparisons(&students, &goals, &logs);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn goal_summaries_report_progress_and_on_track() {
        let (_, goals, logs) = fixture();
        let summaries = calculate_goal_summaries(
            &goals,
            &logs,
            &TrendConfig::default(),
            &SummaryConfig::default(),
        );

        let reading = &summaries[0];
        assert_eq!(reading.data_points, 2);
        assert_eq!(reading.latest_score, Some(50.0));
        assert_eq!(reading.recent_average, Some(45.0));
        assert!((reading.progress_percentage - 50.0).abs() < 0.001);
        assert!(!reading.on_track);

        let math = &summaries[1];
        assert_eq!(math.latest_score, Some(60.0));
        assert_eq!(math.recent_average, Some(65.0));
        assert!(!math.on_track);

        let empty = &summaries[2];
        assert_eq!(empty.data_points, 0);
        assert_eq!(empty.recent_average, None);
        assert!(!empty.on_track);
        assert_eq!(empty.progress_percentage, 0.0);
    }

    #[test]
    fn skill_areas_aggregate_across_students() {
        let (_, goals, logs) = fixture();
        let areas = calculate_skill_area_summaries(&goals, &logs, &TrendConfig::default());

        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].area, "Math");
        assert_eq!(areas[1].area, "Reading");
        assert_eq!(areas[1].goal_count, 2);
        assert_eq!(areas[1].student_count, 2);
        assert_eq!(areas[1].statistics.count, 2);
        assert!((areas[1].statistics.mean - 45.0).abs() < 0.001);
    }

    #[test]
    fn ranking_orders_and_filters() {
        let (students, goals, mut logs) = fixture();
        logs.push(log("l7", "g3", 5, json!(92)));
        let rows = calculate_student_comparisons(&students, &goals, &logs);
        let ranking = rank_students(&rows, 5, 60.0);

        let top: Vec<&str> = ranking.top_performers.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(top, vec!["s2", "s1"]);
        let struggling: Vec<&str> = ranking.struggling.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(struggling, vec!["s1"]);
    }
}
