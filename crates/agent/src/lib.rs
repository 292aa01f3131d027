//! Agent Session - SharePoint-grounded questions against Azure AI Foundry
//!
//! This crate turns a question into a grounded answer:
//! - Acquires bearer tokens from the configured credential chain (`auth`)
//! - Talks to the Foundry Agents REST surface (`client`, `foundry`)
//! - Retries transient run failures with exponential backoff (`retry`)
//! - Reduces a finished run and its thread into a `QueryResult` (`normalize`)
//!
//! # Architecture
//!
//! A session moves through two states:
//! 1. **Uninitialized** (`SharePointAgent`) - holds the client, no remote agent yet
//! 2. **Ready** (`ReadyAgent`) - owns the remote agent and answers `query` calls
//!
//! Remote failures inside a query never escape as errors; they are classified
//! into an `ErrorKind` and reported on the returned `QueryResult`.

pub mod auth;
pub mod client;
pub mod foundry;
pub mod normalize;
pub mod retry;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{
    AccessToken, AzureCliCredential, ClientSecretCredential, CredentialError, DefaultCredential,
    StaticTokenCredential, TokenCredential,
};
pub use client::{AgentDefinition, AgentHandle, AgentsClient, ClientError, Connection, ToolDefinition};
pub use foundry::{FoundryClient, FoundrySettings};
pub use retry::{execute_run_with_retry, RetryPolicy, Sleeper, TokioSleeper};
pub use session::{ReadyAgent, SessionSettings, SetupError, SharePointAgent};
