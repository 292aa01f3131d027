use std::env;
use std::fs;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use spfoundry_core::config::{
    resolve_config_path, DEBUG_LOGGING, MODEL_DEPLOYMENT_NAME, PROJECT_ENDPOINT,
    SHAREPOINT_RESOURCE_NAME,
};
use toml::Value;

use crate::commands::{CommandContext, CommandResult};

pub fn run(context: &CommandContext) -> CommandResult {
    let config = match context.load_config() {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("config", &error, false),
    };

    let config_file_path = resolve_config_path(context.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source_of = |key_path: &str, env_key: Option<&str>| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let rows: Vec<(&str, Option<&str>, String)> = vec![
        ("project.endpoint", Some(PROJECT_ENDPOINT), config.project.endpoint.clone()),
        (
            "project.sharepoint_resource_name",
            Some(SHAREPOINT_RESOURCE_NAME),
            config.project.sharepoint_resource_name.clone(),
        ),
        (
            "project.model_deployment_name",
            Some(MODEL_DEPLOYMENT_NAME),
            config.project.model_deployment_name.clone(),
        ),
        ("project.api_version", Some("SPFOUNDRY_API_VERSION"), config.project.api_version.clone()),
        ("auth.tenant_id", Some("AZURE_TENANT_ID"), optional(config.auth.tenant_id.as_deref())),
        ("auth.client_id", Some("AZURE_CLIENT_ID"), optional(config.auth.client_id.as_deref())),
        ("auth.client_secret", Some("AZURE_CLIENT_SECRET"), redact(config.auth.client_secret.as_ref())),
        ("auth.access_token", Some("SPFOUNDRY_ACCESS_TOKEN"), redact(config.auth.access_token.as_ref())),
        ("auth.token_scope", Some("SPFOUNDRY_TOKEN_SCOPE"), config.auth.token_scope.clone()),
        ("auth.authority_host", Some("AZURE_AUTHORITY_HOST"), config.auth.authority_host.clone()),
        ("agent.name", Some("SPFOUNDRY_AGENT_NAME"), config.agent.name.clone()),
        (
            "agent.instructions",
            Some("SPFOUNDRY_AGENT_INSTRUCTIONS"),
            optional(config.agent.instructions.as_deref()),
        ),
        ("agent.max_retries", Some("SPFOUNDRY_MAX_RETRIES"), config.agent.max_retries.to_string()),
        (
            "agent.retry_base_delay_ms",
            Some("SPFOUNDRY_RETRY_BASE_DELAY_MS"),
            config.agent.retry_base_delay_ms.to_string(),
        ),
        (
            "agent.run_poll_interval_ms",
            Some("SPFOUNDRY_RUN_POLL_INTERVAL_MS"),
            config.agent.run_poll_interval_ms.to_string(),
        ),
        (
            "agent.run_timeout_secs",
            Some("SPFOUNDRY_RUN_TIMEOUT_SECS"),
            config.agent.run_timeout_secs.to_string(),
        ),
        (
            "agent.request_timeout_secs",
            Some("SPFOUNDRY_REQUEST_TIMEOUT_SECS"),
            config.agent.request_timeout_secs.to_string(),
        ),
        ("logging.debug", Some(DEBUG_LOGGING), config.logging.debug.to_string()),
        ("logging.level", Some("SPFOUNDRY_LOG_LEVEL"), config.logging.level.clone()),
        ("logging.format", Some("SPFOUNDRY_LOG_FORMAT"), format!("{:?}", config.logging.format)),
        (
            "logging.file",
            Some("SPFOUNDRY_LOG_FILE"),
            config
                .logging
                .file
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<disabled>".to_string()),
        ),
    ];

    let mut lines = vec![
        "effective config (source precedence: flag > env > file > default):".to_string(),
    ];
    for (key_path, env_key, value) in rows {
        let source = if key_path == "logging.debug" && context.debug {
            "flag (--debug)".to_string()
        } else {
            source_of(key_path, env_key)
        };
        lines.push(render_line(key_path, &value, source));
    }

    CommandResult::text(0, lines.join("\n"))
}

fn optional(value: Option<&str>) -> String {
    value.map(str::to_string).unwrap_or_else(|| "<unset>".to_string())
}

fn redact(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) if secret.expose_secret().trim().is_empty() => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
        None => "<unset>".to_string(),
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
