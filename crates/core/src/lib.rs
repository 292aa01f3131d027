//! Shared building blocks for the SharePoint-grounded agent client: settings,
//! the error taxonomy and the domain values exchanged with the agent service.

pub mod config;
pub mod domain;
pub mod errors;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AppConfig, ConfigError, LoadOptions};
pub use domain::ids::{AgentId, ConnectionId, MessageId, RunId, ThreadId};
pub use domain::message::{Message, MessageRole};
pub use domain::query::{QueryOutcome, QueryResult, NO_RESPONSE_CONTENT};
pub use domain::run::{RunError, RunResult, RunStatus};
pub use errors::ErrorKind;
