use thiserror::Error;

use super::ValueKind;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("log type `{name}` already exists")]
    DuplicateName { name: String },
    #[error("log type `{name}` doesn't exist")]
    UnknownLogType { name: String },
    #[error("log type `{name}` records {expected} values, got {found}")]
    ValueKindMismatch {
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<serde_json::Error> for LogError {
    fn from(value: serde_json::Error) -> Self {
        LogError::Storage(value.into())
    }
}
