use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RecordError, RecordKind, Rejection};
use crate::models::{Goal, GoalStatus, ProgressLog, Student};
use crate::score::parse_score;

// Every field is read as a loose JSON value so a wrongly typed field only
// affects its own record.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawStudent {
    pub id: Option<Value>,
    pub name: Option<Value>,
    pub grade: Option<Value>,
    pub disability: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawGoal {
    pub id: Option<Value>,
    #[serde(alias = "student_id")]
    pub student_id: Option<Value>,
    pub area: Option<Value>,
    pub baseline: Option<Value>,
    pub target: Option<Value>,
    pub metric: Option<Value>,
    pub status: Option<Value>,
    pub description: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawLog {
    pub id: Option<Value>,
    #[serde(alias = "goal_id")]
    pub goal_id: Option<Value>,
    pub date: Option<Value>,
    pub score: Option<Value>,
    pub notes: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSnapshot {
    pub students: Vec<Value>,
    pub goals: Vec<Value>,
    pub logs: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub goals: Vec<Goal>,
    pub logs: Vec<ProgressLog>,
    pub rejected: Vec<Rejection>,
}

type Entry = Result<Value, RecordError>;

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn field_text(value: Option<&Value>) -> Option<String> {
    value.and_then(value_text)
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(timestamp.date_naive());
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|timestamp| timestamp.date())
}

fn validate_student(raw: RawStudent) -> Result<Student, RecordError> {
    let id = field_text(raw.id.as_ref()).ok_or(RecordError::MissingField("id"))?;

    Ok(Student {
        id,
        name: field_text(raw.name.as_ref()).unwrap_or_default(),
        grade: field_text(raw.grade.as_ref()),
        disability: field_text(raw.disability.as_ref()),
    })
}

fn number_field(raw: Option<&Value>, field: &'static str) -> Result<Option<f64>, RecordError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(value) => parse_score(value)
            .map(Some)
            .ok_or_else(|| RecordError::InvalidNumber {
                field,
                value: value.to_string(),
            }),
    }
}

fn validate_goal(raw: RawGoal) -> Result<Goal, RecordError> {
    let id = field_text(raw.id.as_ref()).ok_or(RecordError::MissingField("id"))?;
    let student_id =
        field_text(raw.student_id.as_ref()).ok_or(RecordError::MissingField("studentId"))?;
    let target = number_field(raw.target.as_ref(), "target")?
        .ok_or(RecordError::MissingField("target"))?;
    let baseline = number_field(raw.baseline.as_ref(), "baseline")?.unwrap_or(0.0);
    let status = match field_text(raw.status.as_ref()) {
        None => GoalStatus::Active,
        Some(text) => GoalStatus::parse(&text).ok_or(RecordError::UnknownStatus(text))?,
    };

    Ok(Goal {
        id,
        student_id,
        area: field_text(raw.area.as_ref()).unwrap_or_else(|| "Uncategorized".to_string()),
        baseline,
        target,
        metric: field_text(raw.metric.as_ref()).unwrap_or_default(),
        status,
        description: field_text(raw.description.as_ref()),
    })
}

fn synthesized_log_id(index: usize, taken: &HashSet<String>) -> String {
    let base = format!("log-{index}");
    let mut candidate = base.clone();
    let mut suffix = 1;
    while taken.contains(&candidate) {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    candidate
}

fn validate_log(
    raw: RawLog,
    index: usize,
    taken: &HashSet<String>,
) -> Result<ProgressLog, RecordError> {
    let goal_id = field_text(raw.goal_id.as_ref()).ok_or(RecordError::MissingField("goalId"))?;
    let raw_date = field_text(raw.date.as_ref()).ok_or(RecordError::MissingField("date"))?;
    let date = parse_date(&raw_date).ok_or(RecordError::InvalidDate(raw_date))?;

    Ok(ProgressLog {
        id: field_text(raw.id.as_ref()).unwrap_or_else(|| synthesized_log_id(index, taken)),
        goal_id,
        date,
        score: raw.score.unwrap_or(Value::Null),
        notes: field_text(raw.notes.as_ref()),
    })
}

fn entry_id(entry: &Entry) -> Option<String> {
    entry
        .as_ref()
        .ok()
        .and_then(|value| field_text(value.get("id")))
}

fn collect_valid<R, T>(
    entries: Vec<Entry>,
    kind: RecordKind,
    rejected: &mut Vec<Rejection>,
    id_of: impl Fn(&T) -> &str,
    validate: impl Fn(R, usize) -> Result<T, RecordError>,
) -> Vec<T>
where
    R: DeserializeOwned,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut valid = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let id = entry_id(&entry);
        let outcome = entry
            .and_then(|value| {
                serde_json::from_value::<R>(value)
                    .map_err(|error| RecordError::Malformed(error.to_string()))
            })
            .and_then(|raw| validate(raw, index))
            .and_then(|record| {
                if seen.insert(id_of(&record).to_string()) {
                    Ok(record)
                } else {
                    Err(RecordError::DuplicateId(id_of(&record).to_string()))
                }
            });

        match outcome {
            Ok(record) => valid.push(record),
            Err(error) => {
                tracing::warn!(kind = ?kind, index, id = ?id, %error, "Skipping record");
                rejected.push(Rejection {
                    kind,
                    index,
                    id,
                    error,
                });
            }
        }
    }

    valid
}

// Rows that cannot be decoded or have the wrong field count become rejections.
fn read_csv_table<R: Read>(reader: R, name: &str) -> anyhow::Result<Vec<Entry>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader
        .headers()
        .with_context(|| format!("invalid header in {name}"))?
        .clone();

    let entries: Vec<Entry> = reader
        .records()
        .map(|row| {
            let record = row.map_err(|error| RecordError::Malformed(error.to_string()))?;
            if record.len() != headers.len() {
                return Err(RecordError::Malformed(format!(
                    "expected {} fields, found {}",
                    headers.len(),
                    record.len()
                )));
            }
            let object: Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(header, field)| (header.trim().to_string(), Value::String(field.into())))
                .collect();
            Ok(Value::Object(object))
        })
        .collect();
    Ok(entries)
}

impl Snapshot {
    pub fn from_raw(raw: RawSnapshot) -> Self {
        Self::from_entries(
            raw.students.into_iter().map(Ok).collect(),
            raw.goals.into_iter().map(Ok).collect(),
            raw.logs.into_iter().map(Ok).collect(),
        )
    }

    fn from_entries(students: Vec<Entry>, goals: Vec<Entry>, logs: Vec<Entry>) -> Self {
        let mut rejected = Vec::new();

        let students = collect_valid(
            students,
            RecordKind::Student,
            &mut rejected,
            |s: &Student| s.id.as_str(),
            |r: RawStudent, _| validate_student(r),
        );
        let goals = collect_valid(
            goals,
            RecordKind::Goal,
            &mut rejected,
            |g: &Goal| g.id.as_str(),
            |r: RawGoal, _| validate_goal(r),
        );
        let taken: HashSet<String> = logs.iter().filter_map(entry_id).collect();
        let logs = collect_valid(
            logs,
            RecordKind::Log,
            &mut rejected,
            |l: &ProgressLog| l.id.as_str(),
            |r: RawLog, index| validate_log(r, index, &taken),
        );

        tracing::info!(
            students = students.len(),
            goals = goals.len(),
            logs = logs.len(),
            rejected = rejected.len(),
            "Snapshot loaded"
        );

        Self {
            students,
            goals,
            logs,
            rejected,
        }
    }

    pub fn scoped_to_student(&self, student_id: &str) -> Self {
        let goals: Vec<Goal> = self
            .goals
            .iter()
            .filter(|goal| goal.student_id == student_id)
            .cloned()
            .collect();
        let goal_ids: HashSet<&str> = goals.iter().map(|goal| goal.id.as_str()).collect();

        Self {
            students: self
                .students
                .iter()
                .filter(|student| student.id == student_id)
                .cloned()
                .collect(),
            logs: self
                .logs
                .iter()
                .filter(|log| goal_ids.contains(log.goal_id.as_str()))
                .cloned()
                .collect(),
            goals,
            rejected: self.rejected.clone(),
        }
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let raw: RawSnapshot = serde_json::from_str(raw).context("snapshot is not valid JSON")?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_json_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn from_csv_readers<S: Read, G: Read, L: Read>(
        students: S,
        goals: G,
        logs: L,
    ) -> anyhow::Result<Self> {
        Ok(Self::from_entries(
            read_csv_table(students, "students.csv")?,
            read_csv_table(goals, "goals.csv")?,
            read_csv_table(logs, "logs.csv")?,
        ))
    }

    pub fn from_csv_dir(dir: &Path) -> anyhow::Result<Self> {
        let open = |name: &str| {
            let path = dir.join(name);
            File::open(&path).with_context(|| format!("failed to open {}", path.display()))
        };
        Self::from_csv_readers(open("students.csv")?, open("goals.csv")?, open("logs.csv")?)
    }
}
