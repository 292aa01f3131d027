use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PROJECT_ENDPOINT: &str = "PROJECT_ENDPOINT";
pub const SHAREPOINT_RESOURCE_NAME: &str = "SHAREPOINT_RESOURCE_NAME";
pub const MODEL_DEPLOYMENT_NAME: &str = "MODEL_DEPLOYMENT_NAME";
pub const DEBUG_LOGGING: &str = "DEBUG_LOGGING";

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["spfoundry.toml", "config/spfoundry.toml"];
pub const DEFAULT_LOG_FILE: &str = "sharepoint_agent.log";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub project: ProjectConfig,
    pub auth: AuthConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ProjectConfig {
    pub endpoint: String,
    pub sharepoint_resource_name: String,
    pub model_deployment_name: String,
    pub api_version: String,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub token_scope: String,
    pub authority_host: String,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub name: String,
    pub instructions: Option<String>,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub run_poll_interval_ms: u64,
    pub run_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub debug: bool,
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Where `.env` values come from before the process environment is read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DotenvSource {
    /// `./.env` when present, silently skipped otherwise.
    #[default]
    Discover,
    /// An explicit file that must exist.
    Path(PathBuf),
    Disabled,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub project_endpoint: Option<String>,
    pub sharepoint_resource_name: Option<String>,
    pub model_deployment_name: Option<String>,
    pub agent_name: Option<String>,
    pub max_retries: Option<u32>,
    pub debug_logging: Option<bool>,
    pub log_level: Option<String>,
    pub log_file: Option<Option<PathBuf>>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub dotenv: DotenvSource,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("could not load env file `{path}`: {source}")]
    EnvFile { path: PathBuf, source: dotenvy::Error },
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error(
        "Missing required environment variables: {}. Please set these variables or create a .env file based on .env.example",
        .0.join(", ")
    )]
    MissingRequired(Vec<&'static str>),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Names of every required setting that was absent, empty for other failures.
    pub fn missing_settings(&self) -> &[&'static str] {
        match self {
            Self::MissingRequired(names) => names,
            _ => &[],
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig {
                endpoint: String::new(),
                sharepoint_resource_name: String::new(),
                model_deployment_name: String::new(),
                api_version: "v1".to_string(),
            },
            auth: AuthConfig {
                tenant_id: None,
                client_id: None,
                client_secret: None,
                access_token: None,
                token_scope: "https://ai.azure.com/.default".to_string(),
                authority_host: "https://login.microsoftonline.com".to_string(),
            },
            agent: AgentConfig {
                name: "sharepoint-agent".to_string(),
                instructions: None,
                max_retries: 3,
                retry_base_delay_ms: 1_000,
                run_poll_interval_ms: 500,
                run_timeout_secs: 300,
                request_timeout_secs: 60,
            },
            logging: LoggingConfig {
                debug: false,
                level: "info".to_string(),
                format: LogFormat::Compact,
                file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LoggingConfig {
    /// Level the subscriber should run at; the debug flag wins over `level`.
    pub fn effective_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            self.level.trim()
        }
    }
}

impl AuthConfig {
    /// Tenant, client id and secret are all present.
    pub fn has_client_secret(&self) -> bool {
        let filled = |value: &Option<String>| {
            value.as_deref().map(|value| !value.trim().is_empty()).unwrap_or(false)
        };
        filled(&self.tenant_id)
            && filled(&self.client_id)
            && self
                .client_secret
                .as_ref()
                .map(|secret| !secret.expose_secret().trim().is_empty())
                .unwrap_or(false)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options
                .config_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        load_dotenv(&options.dotenv)?;
        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(project) = patch.project {
            if let Some(endpoint) = project.endpoint {
                self.project.endpoint = endpoint;
            }
            if let Some(name) = project.sharepoint_resource_name {
                self.project.sharepoint_resource_name = name;
            }
            if let Some(name) = project.model_deployment_name {
                self.project.model_deployment_name = name;
            }
            if let Some(api_version) = project.api_version {
                self.project.api_version = api_version;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(tenant_id) = auth.tenant_id {
                self.auth.tenant_id = Some(tenant_id);
            }
            if let Some(client_id) = auth.client_id {
                self.auth.client_id = Some(client_id);
            }
            if let Some(client_secret) = auth.client_secret {
                self.auth.client_secret = Some(client_secret.into());
            }
            if let Some(access_token) = auth.access_token {
                self.auth.access_token = Some(access_token.into());
            }
            if let Some(token_scope) = auth.token_scope {
                self.auth.token_scope = token_scope;
            }
            if let Some(authority_host) = auth.authority_host {
                self.auth.authority_host = authority_host;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(name) = agent.name {
                self.agent.name = name;
            }
            if let Some(instructions) = agent.instructions {
                self.agent.instructions = Some(instructions);
            }
            if let Some(max_retries) = agent.max_retries {
                self.agent.max_retries = max_retries;
            }
            if let Some(delay) = agent.retry_base_delay_ms {
                self.agent.retry_base_delay_ms = delay;
            }
            if let Some(interval) = agent.run_poll_interval_ms {
                self.agent.run_poll_interval_ms = interval;
            }
            if let Some(timeout) = agent.run_timeout_secs {
                self.agent.run_timeout_secs = timeout;
            }
            if let Some(timeout) = agent.request_timeout_secs {
                self.agent.request_timeout_secs = timeout;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(debug) = logging.debug {
                self.logging.debug = debug;
            }
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
            if let Some(file) = logging.file {
                self.logging.file = log_file_path(&file);
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env(PROJECT_ENDPOINT) {
            self.project.endpoint = value;
        }
        if let Some(value) = read_env(SHAREPOINT_RESOURCE_NAME) {
            self.project.sharepoint_resource_name = value;
        }
        if let Some(value) = read_env(MODEL_DEPLOYMENT_NAME) {
            self.project.model_deployment_name = value;
        }
        if let Some(value) = read_env("SPFOUNDRY_API_VERSION") {
            self.project.api_version = value;
        }

        if let Some(value) = read_env("AZURE_TENANT_ID") {
            self.auth.tenant_id = Some(value);
        }
        if let Some(value) = read_env("AZURE_CLIENT_ID") {
            self.auth.client_id = Some(value);
        }
        if let Some(value) = read_env("AZURE_CLIENT_SECRET") {
            self.auth.client_secret = Some(value.into());
        }
        if let Some(value) = read_env("AZURE_AUTHORITY_HOST") {
            self.auth.authority_host = value;
        }
        if let Some(value) = read_env("SPFOUNDRY_ACCESS_TOKEN") {
            self.auth.access_token = Some(value.into());
        }
        if let Some(value) = read_env("SPFOUNDRY_TOKEN_SCOPE") {
            self.auth.token_scope = value;
        }

        if let Some(value) = read_env("SPFOUNDRY_AGENT_NAME") {
            self.agent.name = value;
        }
        if let Some(value) = read_env("SPFOUNDRY_AGENT_INSTRUCTIONS") {
            self.agent.instructions = Some(value);
        }
        if let Some(value) = read_env("SPFOUNDRY_MAX_RETRIES") {
            self.agent.max_retries = parse_u32("SPFOUNDRY_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("SPFOUNDRY_RETRY_BASE_DELAY_MS") {
            self.agent.retry_base_delay_ms = parse_u64("SPFOUNDRY_RETRY_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("SPFOUNDRY_RUN_POLL_INTERVAL_MS") {
            self.agent.run_poll_interval_ms = parse_u64("SPFOUNDRY_RUN_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("SPFOUNDRY_RUN_TIMEOUT_SECS") {
            self.agent.run_timeout_secs = parse_u64("SPFOUNDRY_RUN_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SPFOUNDRY_REQUEST_TIMEOUT_SECS") {
            self.agent.request_timeout_secs = parse_u64("SPFOUNDRY_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env(DEBUG_LOGGING) {
            self.logging.debug = parse_debug_flag(&value);
        }
        if let Some(value) = read_env("SPFOUNDRY_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("SPFOUNDRY_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }
        // An empty value is meaningful here: it turns the file log off.
        if let Ok(value) = env::var("SPFOUNDRY_LOG_FILE") {
            self.logging.file = log_file_path(&value);
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(endpoint) = overrides.project_endpoint {
            self.project.endpoint = endpoint;
        }
        if let Some(name) = overrides.sharepoint_resource_name {
            self.project.sharepoint_resource_name = name;
        }
        if let Some(name) = overrides.model_deployment_name {
            self.project.model_deployment_name = name;
        }
        if let Some(agent_name) = overrides.agent_name {
            self.agent.name = agent_name;
        }
        if let Some(max_retries) = overrides.max_retries {
            self.agent.max_retries = max_retries;
        }
        if let Some(debug) = overrides.debug_logging {
            self.logging.debug = debug;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(file) = overrides.log_file {
            self.logging.file = file;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_required(&self.project)?;
        validate_project(&self.project)?;
        validate_auth(&self.auth)?;
        validate_agent(&self.agent)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn load_dotenv(source: &DotenvSource) -> Result<(), ConfigError> {
    match source {
        DotenvSource::Discover => discovered_dotenv(dotenvy::dotenv()),
        DotenvSource::Path(path) => dotenvy::from_path(path)
            .map_err(|source| ConfigError::EnvFile { path: path.clone(), source }),
        DotenvSource::Disabled => Ok(()),
    }
}

/// An absent `.env` is the common case; anything else about it is an error.
fn discovered_dotenv<T>(result: dotenvy::Result<T>) -> Result<(), ConfigError> {
    match result {
        Ok(_) => Ok(()),
        Err(error) if error.not_found() => Ok(()),
        Err(source) => Err(ConfigError::EnvFile { path: PathBuf::from(".env"), source }),
    }
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || !matches!(chars.peek(), Some('{')) {
            output.push(ch);
            continue;
        }

        chars.next();
        let mut key = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(next) => key.push(next),
                None => return Err(ConfigError::UnterminatedInterpolation),
            }
        }

        let value =
            env::var(&key).map_err(|_| ConfigError::MissingEnvInterpolation { var: key })?;
        output.push_str(&value);
    }

    Ok(output)
}

fn validate_required(project: &ProjectConfig) -> Result<(), ConfigError> {
    let missing: Vec<&'static str> = [
        (PROJECT_ENDPOINT, &project.endpoint),
        (SHAREPOINT_RESOURCE_NAME, &project.sharepoint_resource_name),
        (MODEL_DEPLOYMENT_NAME, &project.model_deployment_name),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::MissingRequired(missing))
    }
}

fn validate_project(project: &ProjectConfig) -> Result<(), ConfigError> {
    let endpoint = project.endpoint.trim();
    if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
        return Err(ConfigError::Validation(
            "project.endpoint must start with http:// or https:// (e.g. https://<resource>.services.ai.azure.com/api/projects/<project>)"
                .to_string(),
        ));
    }

    if project.api_version.trim().is_empty() {
        return Err(ConfigError::Validation("project.api_version must not be empty".to_string()));
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    if auth.token_scope.trim().is_empty() {
        return Err(ConfigError::Validation("auth.token_scope must not be empty".to_string()));
    }

    let host = auth.authority_host.trim();
    if !host.starts_with("https://") && !host.starts_with("http://") {
        return Err(ConfigError::Validation(
            "auth.authority_host must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.name.trim().is_empty() {
        return Err(ConfigError::Validation("agent.name must not be empty".to_string()));
    }

    if agent.max_retries == 0 {
        return Err(ConfigError::Validation(
            "agent.max_retries must be greater than zero".to_string(),
        ));
    }

    if agent.run_poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "agent.run_poll_interval_ms must be greater than zero".to_string(),
        ));
    }

    if agent.run_timeout_secs == 0 || agent.run_timeout_secs > 3_600 {
        return Err(ConfigError::Validation(
            "agent.run_timeout_secs must be in range 1..=3600".to_string(),
        ));
    }

    if agent.request_timeout_secs == 0 || agent.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "agent.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_debug_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn log_file_path(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    project: Option<ProjectPatch>,
    auth: Option<AuthPatch>,
    agent: Option<AgentPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectPatch {
    endpoint: Option<String>,
    sharepoint_resource_name: Option<String>,
    model_deployment_name: Option<String>,
    api_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    access_token: Option<String>,
    token_scope: Option<String>,
    authority_host: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    name: Option<String>,
    instructions: Option<String>,
    max_retries: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    run_poll_interval_ms: Option<u64>,
    run_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    debug: Option<bool>,
    level: Option<String>,
    format: Option<LogFormat>,
    file: Option<String>,
}
