use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", content = "detail", rename_all = "camelCase")]
pub enum RecordError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not a number: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unrecognized date: {0}")]
    InvalidDate(String),

    #[error("unknown goal status: {0}")]
    UnknownStatus(String),

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("malformed record: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Student,
    Goal,
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub kind: RecordKind,
    pub index: usize,
    pub id: Option<String>,
    pub error: RecordError,
}
