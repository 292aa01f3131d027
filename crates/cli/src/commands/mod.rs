pub mod ask;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod demo;
pub mod doctor;

use std::path::PathBuf;

use serde::Serialize;
use spfoundry_agent::session::DEFAULT_AGENT_NAME;
use spfoundry_agent::{FoundryClient, ReadyAgent, SessionSettings, SharePointAgent};
use spfoundry_core::config::{AppConfig, ConfigError, ConfigOverrides, DotenvSource, LoadOptions};
use spfoundry_core::ErrorKind;
use tokio::runtime::Runtime;

/// Global flags shared by every command.
#[derive(Clone, Debug, Default)]
pub struct CommandContext {
    pub config_path: Option<PathBuf>,
    pub dotenv: DotenvSource,
    pub debug: bool,
}

impl CommandContext {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config_path.clone(),
            require_file: self.config_path.is_some(),
            dotenv: self.dotenv.clone(),
            overrides: ConfigOverrides {
                debug_logging: self.debug.then_some(true),
                ..ConfigOverrides::default()
            },
        }
    }

    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        AppConfig::load(self.load_options())
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn text(exit_code: u8, output: impl Into<String>) -> Self {
        Self { exit_code, output: output.into() }
    }

    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn config_failure(command: &str, error: &ConfigError, json: bool) -> Self {
        let kind = ErrorKind::from(error);
        if json {
            Self::failure(command, "config_validation", error.to_string(), kind.exit_code())
        } else {
            Self::text(kind.exit_code(), format!("Configuration error: {error}"))
        }
    }

    pub fn kind_failure(command: &str, kind: ErrorKind, message: String, json: bool) -> Self {
        if json {
            Self::failure(command, kind.as_str(), message, kind.exit_code())
        } else {
            Self::text(kind.exit_code(), format!("{message}\n{}", kind.user_message()))
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn runtime(command: &str, json: bool) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::kind_failure(
            command,
            ErrorKind::Unclassified,
            format!("failed to initialize async runtime: {error}"),
            json,
        )
    })
}

/// Loads config and installs logging; both failures end the command.
pub(crate) fn prepare(
    context: &CommandContext,
    command: &str,
    json: bool,
) -> Result<AppConfig, CommandResult> {
    let config =
        context.load_config().map_err(|error| CommandResult::config_failure(command, &error, json))?;
    crate::logging::init(&config.logging).map_err(|error| {
        CommandResult::kind_failure(command, ErrorKind::Configuration, format!("{error:#}"), json)
    })?;
    Ok(config)
}

/// Creates the remote agent. A configured agent name wins over `fallback_name`.
pub(crate) async fn connect(
    config: &AppConfig,
    fallback_name: &str,
    fallback_instructions: &str,
) -> Result<ReadyAgent<FoundryClient>, (ErrorKind, String)> {
    let client = FoundryClient::from_config(config).map_err(|error| {
        (error.kind(), format!("Failed to initialize agent: {error}"))
    })?;

    let name = if config.agent.name == DEFAULT_AGENT_NAME {
        fallback_name
    } else {
        config.agent.name.as_str()
    };
    let instructions = config.agent.instructions.as_deref().unwrap_or(fallback_instructions);

    SharePointAgent::new(client, SessionSettings::from_config(config))
        .initialize(name, Some(instructions))
        .await
        .map_err(|error| (error.kind(), format!("Failed to initialize agent: {error}")))
}
