//! Bearer-token acquisition for the agent service.
//!
//! [`DefaultCredential`] walks the same order an operator would try by hand:
//! a configured access token, a service principal from `AZURE_*` settings,
//! then the signed-in Azure CLI account.

use std::io;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use spfoundry_core::config::AuthConfig;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct AccessToken {
    pub token: SecretString,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self { token: SecretString::from(token.into()), expires_on }
    }

    /// True when the token is expired or will be within `margin`.
    pub fn expires_within(&self, margin: chrono::Duration) -> bool {
        self.expires_on - margin <= Utc::now()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{credential}: {message}")]
    Unavailable { credential: &'static str, message: String },
    #[error("{credential} authentication failed: {message}")]
    Failed { credential: &'static str, message: String },
    #[error("DefaultCredential failed to retrieve a token: {}", join_errors(.0))]
    Chain(Vec<CredentialError>),
}

fn join_errors(errors: &[CredentialError]) -> String {
    if errors.is_empty() {
        return "no credentials are configured".to_string();
    }
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

/// A pre-issued bearer token. Its real expiry is unknown, so it is treated as
/// valid for one hour from each request.
pub struct StaticTokenCredential {
    token: SecretString,
}

impl StaticTokenCredential {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    fn name(&self) -> &'static str {
        "StaticTokenCredential"
    }

    async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_on: Utc::now() + chrono::Duration::hours(1),
        })
    }
}

/// OAuth2 client-credentials grant against the Microsoft identity platform.
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: SecretString,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointError {
    error: Option<String>,
    error_description: Option<String>,
}

impl ClientSecretCredential {
    pub fn new(
        http: reqwest::Client,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        Self {
            http,
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "ClientSecretCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let failed = |message: String| CredentialError::Failed { credential: self.name(), message };

        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|error| failed(format!("token request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenEndpointError>(&body)
                .ok()
                .and_then(|error| error.error_description.or(error.error))
                .unwrap_or_else(|| format!("token endpoint returned {status}"));
            return Err(failed(detail));
        }

        let token: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|error| failed(format!("failed to decode token response: {error}")))?;
        if token.access_token.is_empty() {
            return Err(failed("token endpoint returned an empty access token".to_string()));
        }

        Ok(AccessToken::new(token.access_token, Utc::now() + chrono::Duration::seconds(token.expires_in)))
    }
}

/// Token from the account signed in with `az login`.
#[derive(Default)]
pub struct AzureCliCredential {
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenOutput {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
    #[serde(default, rename = "expires_on")]
    expires_on_unix: Option<i64>,
}

impl AzureCliCredential {
    pub fn new(tenant_id: Option<String>) -> Self {
        Self { tenant_id }
    }

    fn program() -> &'static str {
        if cfg!(windows) {
            "az.cmd"
        } else {
            "az"
        }
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "AzureCliCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut command = tokio::process::Command::new(Self::program());
        command.args(["account", "get-access-token", "--output", "json", "--scope", scope]);
        if let Some(tenant_id) = &self.tenant_id {
            command.args(["--tenant", tenant_id]);
        }

        let output = command.output().await.map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => CredentialError::Unavailable {
                credential: self.name(),
                message: "Azure CLI not found on PATH".to_string(),
            },
            _ => CredentialError::Failed {
                credential: self.name(),
                message: format!("failed to invoke Azure CLI: {error}"),
            },
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.contains("az login") {
                "Please run 'az login' to set up an account".to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(CredentialError::Unavailable { credential: self.name(), message });
        }

        parse_cli_token(&output.stdout)
            .map_err(|message| CredentialError::Failed { credential: self.name(), message })
    }
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken, String> {
    let parsed: CliTokenOutput = serde_json::from_slice(stdout)
        .map_err(|error| format!("unexpected Azure CLI output: {error}"))?;

    let expires_on = match (parsed.expires_on_unix, parsed.expires_on.as_deref()) {
        (Some(unix), _) => DateTime::from_timestamp(unix, 0)
            .ok_or_else(|| format!("invalid token expiry timestamp `{unix}`"))?,
        (None, Some(local)) => parse_cli_local_time(local)?,
        (None, None) => return Err("Azure CLI output has no token expiry".to_string()),
    };

    Ok(AccessToken::new(parsed.access_token, expires_on))
}

// Older CLI releases only report local wall-clock time.
fn parse_cli_local_time(raw: &str) -> Result<DateTime<Utc>, String> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|error| format!("invalid token expiry `{raw}`: {error}"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("token expiry `{raw}` does not exist in the local timezone"))
}

/// Tries each credential in order and returns the first token obtained.
pub struct DefaultCredential {
    sources: Vec<Box<dyn TokenCredential>>,
}

impl DefaultCredential {
    pub fn new(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    pub fn from_config(auth: &AuthConfig, http: reqwest::Client) -> Self {
        let mut sources: Vec<Box<dyn TokenCredential>> = Vec::new();

        if let Some(token) = &auth.access_token {
            sources.push(Box::new(StaticTokenCredential::new(token.clone())));
        }

        if let (true, Some(tenant_id), Some(client_id), Some(client_secret)) = (
            auth.has_client_secret(),
            auth.tenant_id.as_ref(),
            auth.client_id.as_ref(),
            auth.client_secret.as_ref(),
        ) {
            sources.push(Box::new(ClientSecretCredential::new(
                http,
                auth.authority_host.clone(),
                tenant_id.clone(),
                client_id.clone(),
                client_secret.clone(),
            )));
        }

        sources.push(Box::new(AzureCliCredential::new(auth.tenant_id.clone())));
        Self::new(sources)
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.name()).collect()
    }
}

#[async_trait]
impl TokenCredential for DefaultCredential {
    fn name(&self) -> &'static str {
        "DefaultCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut failures = Vec::new();

        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    debug!(credential = source.name(), "acquired access token");
                    return Ok(token);
                }
                Err(error) => {
                    debug!(credential = source.name(), error = %error, "credential unavailable");
                    failures.push(error);
                }
            }
        }

        warn!(attempted = failures.len(), "no credential produced an access token");
        Err(CredentialError::Chain(failures))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use secrecy::ExposeSecret;

    use super::{
        parse_cli_token, AccessToken, CredentialError, DefaultCredential, StaticTokenCredential,
        TokenCredential,
    };

    struct Unavailable(&'static str);

    #[async_trait]
    impl TokenCredential for Unavailable {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
            Err(CredentialError::Unavailable { credential: self.0, message: "not configured".into() })
        }
    }

    #[tokio::test]
    async fn chain_returns_first_available_token() {
        let chain = DefaultCredential::new(vec![
            Box::new(Unavailable("EnvironmentCredential")),
            Box::new(StaticTokenCredential::new("static-token".to_string().into())),
            Box::new(Unavailable("AzureCliCredential")),
        ]);

        let token = chain.get_token("https://ai.azure.com/.default").await.expect("token");
        assert_eq!(token.token.expose_secret(), "static-token");
        assert!(!token.expires_within(chrono::Duration::minutes(5)));
    }

    #[tokio::test]
    async fn chain_reports_every_failure() {
        let chain = DefaultCredential::new(vec![
            Box::new(Unavailable("EnvironmentCredential")),
            Box::new(Unavailable("AzureCliCredential")),
        ]);

        let error = chain.get_token("scope").await.expect_err("no source should succeed");
        let message = error.to_string();
        assert!(matches!(error, CredentialError::Chain(ref failures) if failures.len() == 2));
        assert!(message.contains("EnvironmentCredential: not configured"));
        assert!(message.contains("AzureCliCredential: not configured"));
    }

    #[test]
    fn parses_cli_output_with_unix_expiry() {
        let stdout = br#"{"accessToken":"abc","expiresOn":"2030-01-01 00:00:00.000000","expires_on":1893456000,"tokenType":"Bearer"}"#;
        let token = parse_cli_token(stdout).expect("parse");

        assert_eq!(token.token.expose_secret(), "abc");
        assert_eq!(token.expires_on, Utc.timestamp_opt(1_893_456_000, 0).unwrap());
    }

    #[test]
    fn parses_cli_output_with_local_expiry_only() {
        let stdout = br#"{"accessToken":"abc","expiresOn":"2030-06-01 12:30:00.123456"}"#;
        let token = parse_cli_token(stdout).expect("parse");

        assert!(token.expires_on > Utc::now());
    }

    #[test]
    fn rejects_cli_output_without_expiry() {
        let error = parse_cli_token(br#"{"accessToken":"abc"}"#).expect_err("no expiry");
        assert!(error.contains("no token expiry"));
    }

    #[test]
    fn token_near_expiry_is_detected() {
        let token = AccessToken::new("t", Utc::now() + chrono::Duration::minutes(2));
        assert!(token.expires_within(chrono::Duration::minutes(5)));
        assert!(!token.expires_within(chrono::Duration::seconds(30)));
    }
}
