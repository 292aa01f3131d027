use std::time::Duration;

use serde::Serialize;

use crate::domain::ids::{RunId, ThreadId};
use crate::errors::ErrorKind;

pub const NO_RESPONSE_CONTENT: &str = "No response received from agent";

/// What a finished run means for the caller, before timing is attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    Answered { run_id: RunId, content: String },
    RunFailed { run_id: RunId, error_message: String },
    UnexpectedStatus { run_id: RunId, status: String },
}

impl QueryOutcome {
    pub fn run_id(&self) -> &RunId {
        match self {
            Self::Answered { run_id, .. }
            | Self::RunFailed { run_id, .. }
            | Self::UnexpectedStatus { run_id, .. } => run_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Answered { .. })
    }
}

/// Uniform answer to one question. `content` is meaningful when `success`,
/// `error_message` otherwise. `execution_time` is wall-clock seconds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryResult {
    pub success: bool,
    pub content: String,
    pub run_id: Option<RunId>,
    pub thread_id: Option<ThreadId>,
    pub error_message: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub execution_time: f64,
}

impl QueryResult {
    pub fn from_outcome(outcome: QueryOutcome, thread_id: ThreadId, elapsed: Duration) -> Self {
        let execution_time = elapsed.as_secs_f64();
        match outcome {
            QueryOutcome::Answered { run_id, content } => Self {
                success: true,
                content,
                run_id: Some(run_id),
                thread_id: Some(thread_id),
                error_message: None,
                error_kind: None,
                execution_time,
            },
            QueryOutcome::RunFailed { run_id, error_message } => Self {
                success: false,
                content: String::new(),
                run_id: Some(run_id),
                thread_id: Some(thread_id),
                error_message: Some(error_message),
                error_kind: Some(ErrorKind::Unclassified),
                execution_time,
            },
            QueryOutcome::UnexpectedStatus { run_id, status } => Self {
                success: false,
                content: String::new(),
                run_id: Some(run_id),
                thread_id: Some(thread_id),
                error_message: Some(format!("Unexpected run status: {status}")),
                error_kind: Some(ErrorKind::Unclassified),
                execution_time,
            },
        }
    }

    pub fn failure(
        error_message: impl Into<String>,
        error_kind: ErrorKind,
        thread_id: Option<ThreadId>,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: false,
            content: String::new(),
            run_id: None,
            thread_id,
            error_message: Some(error_message.into()),
            error_kind: Some(error_kind),
            execution_time: elapsed.as_secs_f64(),
        }
    }

    /// The content on success, the error message otherwise.
    pub fn display_text(&self) -> &str {
        if self.success {
            &self.content
        } else {
            self.error_message.as_deref().unwrap_or("Unknown error")
        }
    }
}
