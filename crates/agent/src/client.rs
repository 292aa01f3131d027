use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spfoundry_core::{
    AgentId, ConnectionId, ErrorKind, Message, MessageId, RunId, RunResult, ThreadId,
};
use thiserror::Error;

use crate::auth::CredentialError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("transient service error: {0}")]
    Transient(String),
    #[error("service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("invalid service response: {0}")]
    InvalidResponse(String),
    #[error("run {run_id} did not reach a terminal status within {waited_secs}s")]
    RunTimedOut { run_id: RunId, waited_secs: u64 },
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::NotFound { .. } => ErrorKind::ResourceNotFound,
            Self::Transient(_) => ErrorKind::TransientService,
            Self::Service { .. } | Self::InvalidResponse(_) | Self::RunTimedOut { .. } => {
                ErrorKind::Unclassified
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<CredentialError> for ClientError {
    fn from(error: CredentialError) -> Self {
        Self::Authentication(error.to_string())
    }
}

/// A named project connection, e.g. the SharePoint site the tool reads.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub name: String,
    #[serde(default, rename = "type")]
    pub connection_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolConnection {
    pub connection_id: ConnectionId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SharepointGroundingSpec {
    pub connections: Vec<ToolConnection>,
}

/// Tool binding sent with the agent definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDefinition {
    SharepointGrounding { sharepoint_grounding: SharepointGroundingSpec },
}

impl ToolDefinition {
    pub fn sharepoint(connection_id: ConnectionId) -> Self {
        Self::SharepointGrounding {
            sharepoint_grounding: SharepointGroundingSpec {
                connections: vec![ToolConnection { connection_id }],
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentDefinition {
    pub model: String,
    pub name: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentHandle {
    pub id: AgentId,
    pub name: String,
    pub model: String,
}

/// Remote operations the session needs from the agent service. Every call is
/// an independent network round trip.
#[async_trait]
pub trait AgentsClient: Send + Sync {
    async fn get_connection(&self, name: &str) -> Result<Connection, ClientError>;

    async fn create_agent(&self, definition: &AgentDefinition)
        -> Result<AgentHandle, ClientError>;

    async fn delete_agent(&self, agent_id: &AgentId) -> Result<(), ClientError>;

    async fn create_thread(&self) -> Result<ThreadId, ClientError>;

    async fn send_message(&self, thread_id: &ThreadId, text: &str)
        -> Result<MessageId, ClientError>;

    /// One run to a terminal status. No retry at this level.
    async fn execute_run(
        &self,
        thread_id: &ThreadId,
        agent_id: &AgentId,
    ) -> Result<RunResult, ClientError>;

    /// Thread history, newest message first.
    async fn list_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>, ClientError>;
}

#[cfg(test)]
mod tests {
    use spfoundry_core::{ConnectionId, ErrorKind, RunId};

    use super::{ClientError, ToolDefinition};
    use crate::auth::CredentialError;

    #[test]
    fn sharepoint_tool_serializes_in_service_shape() {
        let tool = ToolDefinition::sharepoint(ConnectionId::new("/subscriptions/x/connections/sp"));
        let json = serde_json::to_value(&tool).expect("serialize");

        assert_eq!(
            json,
            serde_json::json!({
                "type": "sharepoint_grounding",
                "sharepoint_grounding": {
                    "connections": [{ "connection_id": "/subscriptions/x/connections/sp" }]
                }
            })
        );
    }

    #[test]
    fn every_variant_maps_to_a_kind() {
        let cases = [
            (ClientError::Authentication("expired".into()), ErrorKind::Authentication),
            (ClientError::NotFound { resource: "connection `sp`".into() }, ErrorKind::ResourceNotFound),
            (ClientError::Transient("429".into()), ErrorKind::TransientService),
            (ClientError::Service { status: 400, message: "bad".into() }, ErrorKind::Unclassified),
            (ClientError::InvalidResponse("eof".into()), ErrorKind::Unclassified),
            (
                ClientError::RunTimedOut { run_id: RunId::new("run_1"), waited_secs: 5 },
                ErrorKind::Unclassified,
            ),
        ];

        for (error, kind) in cases {
            assert_eq!(error.kind(), kind, "{error}");
            assert_eq!(error.is_transient(), kind == ErrorKind::TransientService);
        }
    }

    #[test]
    fn credential_failures_become_authentication_errors() {
        let error = ClientError::from(CredentialError::Unavailable {
            credential: "AzureCliCredential",
            message: "Please run 'az login'".to_string(),
        });

        assert_eq!(error.kind(), ErrorKind::Authentication);
        assert!(error.to_string().contains("az login"));
    }
}
