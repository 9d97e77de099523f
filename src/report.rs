use std::fmt::Write;

use chrono::NaiveDate;

use crate::anomaly::detect_goal_anomalies;
use crate::compare::{
    calculate_skill_area_summaries, calculate_student_comparisons_with, rank_students,
};
use crate::config::AnalyticsConfig;
use crate::models::{AnomalyKind, ProgressLog};
use crate::snapshot::Snapshot;
use crate::stats::{interpret_correlation, pearson};
use crate::summary::generate_summary;

pub fn build_report(
    scope: Option<&str>,
    as_of: NaiveDate,
    snapshot: &Snapshot,
    config: &AnalyticsConfig,
) -> String {
    let Snapshot {
        students,
        goals,
        logs,
        rejected,
    } = snapshot;

    let summary = generate_summary(students, goals, logs, as_of, config);
    let rows = calculate_student_comparisons_with(students, goals, logs, &config.trend);
    let ranking = rank_students(&rows, 10, config.summary.struggling_threshold);
    let areas = calculate_skill_area_summaries(goals, logs, &config.trend);
    let anomalies = detect_goal_anomalies(goals, logs, &config.anomaly);

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all students");

    let _ = writeln!(output, "# Student Progress Report");
    let _ = writeln!(output, "Generated for {} as of {}", scope_label, as_of);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- {} students, {} goals ({} active), {} progress logs",
        summary.total_students, summary.total_goals, summary.active_goals, summary.total_logs
    );
    let _ = writeln!(output, "- Goals on track: {}%", summary.on_track_percentage);
    let _ = writeln!(output, "- Goals completed: {}%", summary.completion_rate);
    let _ = writeln!(output, "- Data quality: {}/100", summary.data_quality);
    let _ = writeln!(
        output,
        "- Overall trend: {} ({}, confidence {}%)",
        summary.overall_trend.direction,
        summary.overall_trend.strength,
        summary.overall_trend.confidence
    );
    let (frequency, averages): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter(|row| row.data_points > 0)
        .map(|row| (row.data_points as f64, row.avg_score))
        .unzip();
    if let Some(r) = pearson(&frequency, &averages) {
        let _ = writeln!(
            output,
            "- Logging frequency vs. average score: {} (r = {:.2})",
            interpret_correlation(r),
            r
        );
    }
    if !rejected.is_empty() {
        let _ = writeln!(output, "- Records skipped as invalid: {}", rejected.len());
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Skill Areas");

    if areas.is_empty() {
        let _ = writeln!(output, "No goals recorded.");
    } else {
        for area in areas.iter() {
            let _ = writeln!(
                output,
                "- {}: {} goals across {} students, avg {:.1} (median {:.1}, {} data points), {}",
                area.area,
                area.goal_count,
                area.student_count,
                area.statistics.mean,
                area.statistics.median,
                area.statistics.count,
                area.trend.direction
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performers");

    if ranking.top_performers.is_empty() {
        let _ = writeln!(output, "No students with progress data.");
    } else {
        for row in ranking.top_performers.iter() {
            let _ = writeln!(
                output,
                "- {} (grade {}) avg {:.1} across {} data points, {}",
                row.name,
                row.grade.as_deref().unwrap_or("n/a"),
                row.avg_score,
                row.data_points,
                row.trend.direction
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Support");

    if ranking.struggling.is_empty() {
        let _ = writeln!(
            output,
            "No students averaging below {:.0}.",
            config.summary.struggling_threshold
        );
    } else {
        for row in ranking.struggling.iter() {
            let _ = writeln!(
                output,
                "- {} avg {:.1} (median {:.1}), {}",
                row.name, row.avg_score, row.median_score, row.trend.direction
            );
        }
    }

    let without_data: Vec<&str> = rows
        .iter()
        .filter(|row| row.data_points == 0)
        .map(|row| row.name.as_str())
        .collect();
    if !without_data.is_empty() {
        let _ = writeln!(output, "- No data yet: {}", without_data.join(", "));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Unusual Observations");

    if anomalies.is_empty() {
        let _ = writeln!(output, "No anomalies detected.");
    } else {
        for goal in anomalies.iter() {
            for anomaly in goal.anomalies.iter() {
                let kind = match anomaly.kind {
                    AnomalyKind::Spike => "spike",
                    AnomalyKind::Drop => "drop",
                };
                let _ = writeln!(
                    output,
                    "- Goal {} on {}: {} to {:.1} (z {:.2})",
                    goal.goal_id, anomaly.data.date, kind, anomaly.value, anomaly.z_score
                );
            }
        }
    }

    let mut noted: Vec<&ProgressLog> = logs.iter().filter(|log| log.notes.is_some()).collect();
    noted.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Notes");

    if noted.is_empty() {
        let _ = writeln!(output, "No notes recorded.");
    } else {
        for log in noted.iter().take(5) {
            let _ = writeln!(
                output,
                "- Goal {} on {}: {}",
                log.goal_id,
                log.date,
                log.notes.as_deref().unwrap_or_default()
            );
        }
    }

    output
}
