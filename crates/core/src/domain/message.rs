use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::MessageId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    Other(String),
}

impl MessageRole {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One thread message with its text content parts in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub text_segments: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    pub fn last_text(&self) -> Option<&str> {
        self.text_segments.last().map(String::as_str)
    }
}
