use std::sync::Arc;
use std::time::Instant;

use spfoundry_core::config::AppConfig;
use spfoundry_core::{ErrorKind, QueryOutcome, QueryResult, ThreadId};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::{AgentDefinition, AgentHandle, AgentsClient, ClientError, ToolDefinition};
use crate::normalize::normalize;
use crate::retry::{execute_run_with_retry, RetryPolicy, Sleeper, TokioSleeper};

pub const DEFAULT_AGENT_NAME: &str = "sharepoint-agent";

pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful AI assistant specialized in analyzing SharePoint content. \
You can summarize documents, answer questions about SharePoint resources, \
and provide insights based on the content available. Always be thorough \
and provide specific references to the documents you analyze.";

pub const CHAT_AGENT_NAME: &str = "sharepoint-cli-agent";

pub const CHAT_INSTRUCTIONS: &str = "You are a helpful SharePoint assistant. Provide clear, \
detailed responses about SharePoint content. Always cite \
specific documents when possible and be conversational in your tone.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub model_deployment_name: String,
    pub sharepoint_connection_name: String,
    pub retry: RetryPolicy,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model_deployment_name: config.project.model_deployment_name.clone(),
            sharepoint_connection_name: config.project.sharepoint_resource_name.clone(),
            retry: RetryPolicy::from_config(&config.agent),
        }
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("SharePoint connection `{name}` was not found in the project")]
    ConnectionNotFound { name: String },
    #[error("agent creation failed: {0}")]
    Agent(ClientError),
}

impl SetupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::ConnectionNotFound { .. } => ErrorKind::ResourceNotFound,
            Self::Agent(error) => error.kind(),
        }
    }

    fn from_client(error: ClientError, connection_name: &str) -> Self {
        match error {
            ClientError::Authentication(message) => Self::Authentication(message),
            ClientError::NotFound { .. } => {
                Self::ConnectionNotFound { name: connection_name.to_string() }
            }
            other => Self::Agent(other),
        }
    }
}

/// A session that has not created its remote agent yet.
pub struct SharePointAgent<C> {
    client: C,
    settings: SessionSettings,
    sleeper: Arc<dyn Sleeper>,
}

impl<C: AgentsClient> SharePointAgent<C> {
    pub fn new(client: C, settings: SessionSettings) -> Self {
        Self { client, settings, sleeper: Arc::new(TokioSleeper) }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Looks up the SharePoint connection and creates an agent bound to it.
    pub async fn initialize(
        self,
        name: &str,
        instructions: Option<&str>,
    ) -> Result<ReadyAgent<C>, SetupError> {
        let connection_name = self.settings.sharepoint_connection_name.clone();
        let connection = self
            .client
            .get_connection(&connection_name)
            .await
            .map_err(|error| SetupError::from_client(error, &connection_name))?;
        debug!(
            event_name = "agent.connection_resolved",
            connection = %connection.name,
            connection_id = %connection.id,
            "resolved SharePoint connection"
        );

        let definition = AgentDefinition {
            model: self.settings.model_deployment_name.clone(),
            name: name.to_string(),
            instructions: instructions.unwrap_or(DEFAULT_INSTRUCTIONS).to_string(),
            tools: vec![ToolDefinition::sharepoint(connection.id)],
        };

        info!(event_name = "agent.creating", agent_name = %name, "creating agent with SharePoint tool");
        let agent = match self.client.create_agent(&definition).await {
            Ok(agent) => agent,
            Err(ClientError::Authentication(message)) => {
                return Err(SetupError::Authentication(message))
            }
            Err(error) => return Err(SetupError::Agent(error)),
        };
        info!(
            event_name = "agent.created",
            agent_id = %agent.id,
            agent_name = %agent.name,
            model = %agent.model,
            "created agent"
        );

        Ok(ReadyAgent {
            client: self.client,
            agent,
            retry: self.settings.retry,
            sleeper: self.sleeper,
            cleaned_up: false,
        })
    }
}

/// A session with a live remote agent. Call [`ReadyAgent::cleanup`] when done.
pub struct ReadyAgent<C: AgentsClient> {
    client: C,
    agent: AgentHandle,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    cleaned_up: bool,
}

impl<C: AgentsClient> ReadyAgent<C> {
    pub fn agent(&self) -> &AgentHandle {
        &self.agent
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Asks one question, on `thread_id` when given or a new thread otherwise.
    /// Failures come back as an unsuccessful [`QueryResult`].
    pub async fn query(&self, question: &str, thread_id: Option<&ThreadId>) -> QueryResult {
        let started = Instant::now();
        let correlation_id = Uuid::new_v4();
        let mut thread = thread_id.cloned();

        let result = self.try_query(question, &mut thread, correlation_id).await;
        let elapsed = started.elapsed();

        match (result, thread) {
            (Ok(outcome), Some(thread_id)) => {
                match &outcome {
                    QueryOutcome::Answered { run_id, .. } => info!(
                        event_name = "query.completed",
                        correlation_id = %correlation_id,
                        thread_id = %thread_id,
                        run_id = %run_id,
                        execution_time = elapsed.as_secs_f64(),
                        "query completed"
                    ),
                    QueryOutcome::RunFailed { run_id, error_message } => error!(
                        event_name = "query.run_failed",
                        correlation_id = %correlation_id,
                        thread_id = %thread_id,
                        run_id = %run_id,
                        error = %error_message,
                        "agent run failed"
                    ),
                    QueryOutcome::UnexpectedStatus { run_id, status } => warn!(
                        event_name = "query.unexpected_status",
                        correlation_id = %correlation_id,
                        thread_id = %thread_id,
                        run_id = %run_id,
                        status = %status,
                        "run ended with unexpected status"
                    ),
                }
                QueryResult::from_outcome(outcome, thread_id, elapsed)
            }
            (Ok(outcome), None) => QueryResult::failure(
                format!("Query execution failed: run {} finished without a thread", outcome.run_id()),
                ErrorKind::Unclassified,
                None,
                elapsed,
            ),
            (Err(error), thread) => {
                let kind = error.kind();
                error!(
                    event_name = "query.failed",
                    correlation_id = %correlation_id,
                    thread_id = thread.as_ref().map(ThreadId::as_str).unwrap_or("unknown"),
                    error_kind = %kind,
                    error = %error,
                    "query execution failed"
                );
                QueryResult::failure(format!("Query execution failed: {error}"), kind, thread, elapsed)
            }
        }
    }

    async fn try_query(
        &self,
        question: &str,
        thread: &mut Option<ThreadId>,
        correlation_id: Uuid,
    ) -> Result<QueryOutcome, ClientError> {
        let thread_id = match thread.as_ref() {
            Some(existing) => existing.clone(),
            None => {
                let created = self.client.create_thread().await?;
                debug!(
                    event_name = "query.thread_created",
                    correlation_id = %correlation_id,
                    thread_id = %created,
                    "created thread"
                );
                *thread = Some(created.clone());
                created
            }
        };

        let message_id = self.client.send_message(&thread_id, question).await?;
        debug!(
            event_name = "query.message_sent",
            correlation_id = %correlation_id,
            thread_id = %thread_id,
            message_id = %message_id,
            "sent user message"
        );

        let run = execute_run_with_retry(
            &self.client,
            &thread_id,
            &self.agent.id,
            &self.retry,
            self.sleeper.as_ref(),
        )
        .await?;

        let messages = if run.status == spfoundry_core::RunStatus::Completed {
            self.client.list_messages(&thread_id).await?
        } else {
            Vec::new()
        };

        Ok(normalize(&run, &messages))
    }

    /// Deletes the remote agent. Failures are logged, never returned.
    pub async fn cleanup(mut self) {
        self.cleaned_up = true;
        match self.client.delete_agent(&self.agent.id).await {
            Ok(()) => info!(event_name = "agent.deleted", agent_id = %self.agent.id, "deleted agent"),
            Err(error) => warn!(
                event_name = "agent.delete_failed",
                agent_id = %self.agent.id,
                error = %error,
                "failed to delete agent"
            ),
        }
    }
}

impl<C: AgentsClient> Drop for ReadyAgent<C> {
    fn drop(&mut self) {
        if !self.cleaned_up {
            warn!(
                event_name = "agent.not_cleaned_up",
                agent_id = %self.agent.id,
                "session dropped without deleting its agent"
            );
        }
    }
}
