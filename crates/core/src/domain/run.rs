use serde::{Deserialize, Serialize};

use crate::domain::ids::RunId;

/// Terminal status of one run, as far as this client cares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    /// Any other terminal status string reported by the service.
    Unexpected(String),
}

impl RunStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => Self::Unexpected(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unexpected(raw) => raw,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code.as_deref(), self.message.as_deref()) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (Some(value), None) | (None, Some(value)) => f.write_str(value),
            (None, None) => f.write_str("Unknown error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub id: RunId,
    pub status: RunStatus,
    pub last_error: Option<RunError>,
}
