use anyhow::Context;
use chrono::NaiveDate;
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::snapshot::{RawSnapshot, Snapshot};

fn text(row: &PgRow, column: &str) -> Value {
    row.get::<Option<String>, _>(column)
        .map(Value::String)
        .unwrap_or(Value::Null)
}

/// Columns are read as text and validated like JSON and CSV input.
pub async fn fetch_snapshot(
    pool: &PgPool,
    student_id: Option<&str>,
    since: Option<NaiveDate>,
) -> anyhow::Result<Snapshot> {
    let mut students_sql = String::from(
        "SELECT id::text AS id, full_name, grade::text AS grade, disability \
         FROM progress_analytics.students",
    );
    let mut goals_sql = String::from(
        "SELECT id::text AS id, student_id::text AS student_id, area, \
         baseline::text AS baseline, target::text AS target, metric, status, description \
         FROM progress_analytics.goals",
    );
    let mut logs_sql = String::from(
        "SELECT l.id::text AS id, l.goal_id::text AS goal_id, l.logged_on::text AS logged_on, \
         l.score::text AS score, l.notes \
         FROM progress_analytics.progress_logs l \
         JOIN progress_analytics.goals g ON g.id = l.goal_id \
         WHERE ($1::text IS NULL OR g.student_id::text = $1) \
         AND ($2::date IS NULL OR l.logged_on >= $2)",
    );

    if student_id.is_some() {
        students_sql.push_str(" WHERE id::text = $1");
        goals_sql.push_str(" WHERE student_id::text = $1");
    }
    students_sql.push_str(" ORDER BY id");
    goals_sql.push_str(" ORDER BY id");
    logs_sql.push_str(" ORDER BY l.logged_on, l.id");

    let mut students_query = sqlx::query(&students_sql);
    let mut goals_query = sqlx::query(&goals_sql);
    if let Some(value) = student_id {
        students_query = students_query.bind(value);
        goals_query = goals_query.bind(value);
    }

    let student_rows = students_query
        .fetch_all(pool)
        .await
        .context("failed to fetch students")?;
    let goal_rows = goals_query
        .fetch_all(pool)
        .await
        .context("failed to fetch goals")?;
    let log_rows = sqlx::query(&logs_sql)
        .bind(student_id)
        .bind(since)
        .fetch_all(pool)
        .await
        .context("failed to fetch progress logs")?;

    let raw = RawSnapshot {
        students: student_rows
            .iter()
            .map(|row| {
                json!({
                    "id": text(row, "id"),
                    "name": text(row, "full_name"),
                    "grade": text(row, "grade"),
                    "disability": text(row, "disability"),
                })
            })
            .collect(),
        goals: goal_rows
            .iter()
            .map(|row| {
                json!({
                    "id": text(row, "id"),
                    "studentId": text(row, "student_id"),
                    "area": text(row, "area"),
                    "baseline": text(row, "baseline"),
                    "target": text(row, "target"),
                    "metric": text(row, "metric"),
                    "status": text(row, "status"),
                    "description": text(row, "description"),
                })
            })
            .collect(),
        logs: log_rows
            .iter()
            .map(|row| {
                json!({
                    "id": text(row, "id"),
                    "goalId": text(row, "goal_id"),
                    "date": text(row, "logged_on"),
                    "score": text(row, "score"),
                    "notes": text(row, "notes"),
                })
            })
            .collect(),
    };

    Ok(Snapshot::from_raw(raw))
}
