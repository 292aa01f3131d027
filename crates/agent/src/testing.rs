use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use spfoundry_core::{
    AgentId, ConnectionId, Message, MessageId, MessageRole, RunError, RunId, RunResult, RunStatus,
    ThreadId,
};
use tokio::sync::Mutex;

use crate::client::{AgentDefinition, AgentHandle, AgentsClient, ClientError, Connection};
use crate::retry::Sleeper;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    GetConnection(String),
    CreateAgent(String),
    DeleteAgent(AgentId),
    CreateThread,
    SendMessage(ThreadId, String),
    ExecuteRun(ThreadId, AgentId),
    ListMessages(ThreadId),
}

/// Client fake that replays scripted results and records every call.
/// Empty queues fall back to a successful default.
#[derive(Default)]
pub struct ScriptedClient {
    state: Mutex<ScriptedState>,
}

#[derive(Default)]
struct ScriptedState {
    connections: VecDeque<Result<Connection, ClientError>>,
    agents: VecDeque<Result<AgentHandle, ClientError>>,
    deletes: VecDeque<Result<(), ClientError>>,
    threads: VecDeque<Result<ThreadId, ClientError>>,
    sends: VecDeque<Result<MessageId, ClientError>>,
    runs: VecDeque<Result<RunResult, ClientError>>,
    messages: VecDeque<Result<Vec<Message>, ClientError>>,
    calls: Vec<Call>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_connection(&self, result: Result<Connection, ClientError>) {
        self.state.lock().await.connections.push_back(result);
    }

    pub async fn push_agent(&self, result: Result<AgentHandle, ClientError>) {
        self.state.lock().await.agents.push_back(result);
    }

    pub async fn push_delete(&self, result: Result<(), ClientError>) {
        self.state.lock().await.deletes.push_back(result);
    }

    pub async fn push_thread(&self, result: Result<ThreadId, ClientError>) {
        self.state.lock().await.threads.push_back(result);
    }

    pub async fn push_send(&self, result: Result<MessageId, ClientError>) {
        self.state.lock().await.sends.push_back(result);
    }

    pub async fn push_run(&self, result: Result<RunResult, ClientError>) {
        self.state.lock().await.runs.push_back(result);
    }

    pub async fn push_messages(&self, result: Result<Vec<Message>, ClientError>) {
        self.state.lock().await.messages.push_back(result);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.state.lock().await.calls.clone()
    }

    pub async fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().await.calls.iter().filter(|call| matches(call)).count()
    }
}

#[async_trait]
impl AgentsClient for ScriptedClient {
    async fn get_connection(&self, name: &str) -> Result<Connection, ClientError> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::GetConnection(name.to_string()));
        state.connections.pop_front().unwrap_or_else(|| {
            Ok(Connection {
                id: ConnectionId::new(format!("/connections/{name}")),
                name: name.to_string(),
                connection_type: Some("SharePoint".to_string()),
            })
        })
    }

    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentHandle, ClientError> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::CreateAgent(definition.name.clone()));
        state.agents.pop_front().unwrap_or_else(|| {
            Ok(AgentHandle {
                id: AgentId::new("asst_1"),
                name: definition.name.clone(),
                model: definition.model.clone(),
            })
        })
    }

    async fn delete_agent(&self, agent_id: &AgentId) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::DeleteAgent(agent_id.clone()));
        state.deletes.pop_front().unwrap_or(Ok(()))
    }

    async fn create_thread(&self) -> Result<ThreadId, ClientError> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::CreateThread);
        state.threads.pop_front().unwrap_or_else(|| Ok(ThreadId::new("thread_1")))
    }

    async fn send_message(&self, thread_id: &ThreadId, text: &str) -> Result<MessageId, ClientError> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::SendMessage(thread_id.clone(), text.to_string()));
        state.sends.pop_front().unwrap_or_else(|| Ok(MessageId::new("msg_user")))
    }

    async fn execute_run(&self, thread_id: &ThreadId, agent_id: &AgentId) -> Result<RunResult, ClientError> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::ExecuteRun(thread_id.clone(), agent_id.clone()));
        state.runs.pop_front().unwrap_or_else(|| Ok(completed_run("run_1")))
    }

    async fn list_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>, ClientError> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::ListMessages(thread_id.clone()));
        state
            .messages
            .pop_front()
            .unwrap_or_else(|| Ok(vec![assistant_message("msg_reply", &["Test response"])]))
    }
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub async fn delays(&self) -> Vec<Duration> {
        self.delays.lock().await.clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().await.push(delay);
    }
}

pub fn completed_run(id: &str) -> RunResult {
    RunResult { id: RunId::new(id), status: RunStatus::Completed, last_error: None }
}

pub fn failed_run(id: &str, last_error: Option<RunError>) -> RunResult {
    RunResult { id: RunId::new(id), status: RunStatus::Failed, last_error }
}

pub fn run_with_status(id: &str, status: &str) -> RunResult {
    RunResult { id: RunId::new(id), status: RunStatus::parse(status), last_error: None }
}

pub fn assistant_message(id: &str, segments: &[&str]) -> Message {
    message(id, MessageRole::Assistant, segments)
}

pub fn user_message(id: &str, text: &str) -> Message {
    message(id, MessageRole::User, &[text])
}

fn message(id: &str, role: MessageRole, segments: &[&str]) -> Message {
    Message {
        id: MessageId::new(id),
        role,
        text_segments: segments.iter().map(|segment| segment.to_string()).collect(),
        created_at: None,
    }
}
