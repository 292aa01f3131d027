use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use spfoundry_core::config::AppConfig;
use spfoundry_core::{
    AgentId, Message, MessageId, MessageRole, RunError, RunId, RunResult, RunStatus, ThreadId,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::auth::{AccessToken, DefaultCredential, TokenCredential};
use crate::client::{AgentDefinition, AgentHandle, AgentsClient, ClientError, Connection};

const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;
const PENDING_RUN_STATUSES: [&str; 3] = ["queued", "in_progress", "cancelling"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoundrySettings {
    pub endpoint: String,
    pub api_version: String,
    pub token_scope: String,
    pub poll_interval: Duration,
    pub run_timeout: Duration,
    pub request_timeout: Duration,
}

impl FoundrySettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.project.endpoint.trim_end_matches('/').to_string(),
            api_version: config.project.api_version.clone(),
            token_scope: config.auth.token_scope.clone(),
            poll_interval: Duration::from_millis(config.agent.run_poll_interval_ms),
            run_timeout: Duration::from_secs(config.agent.run_timeout_secs),
            request_timeout: Duration::from_secs(config.agent.request_timeout_secs),
        }
    }
}

/// [`AgentsClient`] over the Azure AI Foundry Agents REST surface.
pub struct FoundryClient {
    http: reqwest::Client,
    settings: FoundrySettings,
    credential: Arc<dyn TokenCredential>,
    token: Mutex<Option<AccessToken>>,
}

impl FoundryClient {
    pub fn new(
        settings: FoundrySettings,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self, ClientError> {
        let http = build_http(settings.request_timeout)?;
        Ok(Self::with_http(http, settings, credential))
    }

    /// Client authenticated through [`DefaultCredential`] built from `config.auth`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ClientError> {
        let settings = FoundrySettings::from_config(config);
        let http = build_http(settings.request_timeout)?;
        let credential = Arc::new(DefaultCredential::from_config(&config.auth, http.clone()));
        Ok(Self::with_http(http, settings, credential))
    }

    pub fn with_http(
        http: reqwest::Client,
        settings: FoundrySettings,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        Self { http, settings, credential, token: Mutex::new(None) }
    }

    pub fn settings(&self) -> &FoundrySettings {
        &self.settings
    }

    pub fn credential_name(&self) -> &'static str {
        self.credential.name()
    }

    /// Bearer token for the configured scope, refreshed shortly before expiry.
    pub async fn access_token(&self) -> Result<AccessToken, ClientError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.expires_within(chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)) {
                return Ok(token.clone());
            }
        }

        let token = self.credential.get_token(&self.settings.token_scope).await?;
        debug!(
            event_name = "auth.token_acquired",
            credential = self.credential.name(),
            expires_on = %token.expires_on,
            "acquired access token"
        );
        *cached = Some(token.clone());
        Ok(token)
    }

    pub async fn list_connections(&self) -> Result<Vec<Connection>, ClientError> {
        let page: ConnectionList =
            self.send_json(self.request(Method::GET, &["connections"]).await?, "connections").await?;
        Ok(page.value)
    }

    pub async fn cancel_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<(), ClientError> {
        let path = ["threads", thread_id.as_str(), "runs", run_id.as_str(), "cancel"];
        let _: RunBody = self
            .send_json(self.request(Method::POST, &path).await?, &format!("run `{run_id}`"))
            .await?;
        Ok(())
    }

    async fn get_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<RunBody, ClientError> {
        let path = ["threads", thread_id.as_str(), "runs", run_id.as_str()];
        self.send_json(self.request(Method::GET, &path).await?, &format!("run `{run_id}`")).await
    }

    async fn request(&self, method: Method, path: &[&str]) -> Result<RequestBuilder, ClientError> {
        let url = resource_url(&self.settings.endpoint, path)?;
        let token = self.access_token().await?;
        Ok(self
            .http
            .request(method, url)
            .query(&[("api-version", self.settings.api_version.as_str())])
            .bearer_auth(token.token.expose_secret()))
    }

    async fn send(&self, request: RequestBuilder, resource: &str) -> Result<Vec<u8>, ClientError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;

        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(classify_status(status, &String::from_utf8_lossy(&body), resource))
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> Result<T, ClientError> {
        let body = self.send(request, resource).await?;
        serde_json::from_slice(&body).map_err(|error| {
            ClientError::InvalidResponse(format!("failed to decode {resource} response: {error}"))
        })
    }
}

#[async_trait]
impl AgentsClient for FoundryClient {
    async fn get_connection(&self, name: &str) -> Result<Connection, ClientError> {
        let path = ["connections", name];
        self.send_json(self.request(Method::GET, &path).await?, &format!("connection `{name}`"))
            .await
    }

    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentHandle, ClientError> {
        let body: AgentBody = self
            .send_json(self.request(Method::POST, &["assistants"]).await?.json(definition), "agent")
            .await?;
        Ok(AgentHandle {
            id: body.id,
            name: body.name.unwrap_or_else(|| definition.name.clone()),
            model: body.model.unwrap_or_else(|| definition.model.clone()),
        })
    }

    async fn delete_agent(&self, agent_id: &AgentId) -> Result<(), ClientError> {
        let path = ["assistants", agent_id.as_str()];
        self.send(self.request(Method::DELETE, &path).await?, &format!("agent `{agent_id}`"))
            .await?;
        Ok(())
    }

    async fn create_thread(&self) -> Result<ThreadId, ClientError> {
        let body: IdBody<ThreadId> = self
            .send_json(
                self.request(Method::POST, &["threads"]).await?.json(&serde_json::json!({})),
                "thread",
            )
            .await?;
        Ok(body.id)
    }

    async fn send_message(&self, thread_id: &ThreadId, text: &str) -> Result<MessageId, ClientError> {
        let path = ["threads", thread_id.as_str(), "messages"];
        let request = NewMessage { role: "user", content: text };
        let body: IdBody<MessageId> = self
            .send_json(
                self.request(Method::POST, &path).await?.json(&request),
                &format!("thread `{thread_id}`"),
            )
            .await?;
        Ok(body.id)
    }

    async fn execute_run(&self, thread_id: &ThreadId, agent_id: &AgentId) -> Result<RunResult, ClientError> {
        let path = ["threads", thread_id.as_str(), "runs"];
        let mut run: RunBody = self
            .send_json(
                self.request(Method::POST, &path).await?.json(&NewRun { assistant_id: agent_id }),
                &format!("thread `{thread_id}`"),
            )
            .await?;
        debug!(
            event_name = "run.created",
            thread_id = %thread_id,
            run_id = %run.id,
            status = %run.status,
            "run created"
        );

        let started = Instant::now();
        while run.is_pending() {
            if started.elapsed() >= self.settings.run_timeout {
                if let Err(error) = self.cancel_run(thread_id, &run.id).await {
                    warn!(
                        event_name = "run.cancel_failed",
                        thread_id = %thread_id,
                        run_id = %run.id,
                        error = %error,
                        "failed to cancel timed out run"
                    );
                }
                return Err(ClientError::RunTimedOut {
                    run_id: run.id,
                    waited_secs: self.settings.run_timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.settings.poll_interval).await;
            run = self.get_run(thread_id, &run.id).await?;
        }

        debug!(
            event_name = "run.finished",
            thread_id = %thread_id,
            run_id = %run.id,
            status = %run.status,
            "run reached terminal status"
        );
        Ok(run.into_result())
    }

    async fn list_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>, ClientError> {
        let path = ["threads", thread_id.as_str(), "messages"];
        let page: MessageList = self
            .send_json(
                self.request(Method::GET, &path).await?.query(&[("order", "desc")]),
                &format!("thread `{thread_id}`"),
            )
            .await?;
        Ok(page.data.into_iter().map(MessageBody::into_message).collect())
    }
}

fn build_http(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|error| ClientError::InvalidResponse(format!("http client setup failed: {error}")))
}

/// `endpoint` with `segments` appended as percent-encoded path segments, so an
/// id or connection name can never address a different route.
pub fn resource_url(endpoint: &str, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = Url::parse(endpoint).map_err(|error| {
        ClientError::InvalidResponse(format!("invalid project endpoint `{endpoint}`: {error}"))
    })?;
    url.path_segments_mut()
        .map_err(|()| {
            ClientError::InvalidResponse(format!("project endpoint `{endpoint}` cannot carry a path"))
        })?
        .pop_if_empty()
        .extend(segments.iter().copied());
    Ok(url)
}

/// Maps a non-success HTTP status onto the adapter's error classes.
pub fn classify_status(status: StatusCode, body: &str, resource: &str) -> ClientError {
    let message = service_error_message(body).unwrap_or_else(|| {
        status.canonical_reason().unwrap_or("request failed").to_string()
    });

    match status.as_u16() {
        401 | 403 => ClientError::Authentication(message),
        404 => ClientError::NotFound { resource: resource.to_string() },
        408 | 429 | 500..=599 => ClientError::Transient(format!("{}: {message}", status.as_u16())),
        code => ClientError::Service { status: code, message },
    }
}

fn service_error_message(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let detail = envelope.error?;
    match (detail.code, detail.message) {
        (_, Some(message)) if !message.is_empty() => Some(message),
        (Some(code), _) => Some(code),
        _ => None,
    }
}

fn map_transport_error(error: reqwest::Error) -> ClientError {
    if error.is_decode() || error.is_body() {
        ClientError::InvalidResponse(error.to_string())
    } else {
        ClientError::Transient(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionList {
    #[serde(default)]
    value: Vec<Connection>,
}

#[derive(Debug, Deserialize)]
struct IdBody<T> {
    id: T,
}

#[derive(Debug, Deserialize)]
struct AgentBody {
    id: AgentId,
    name: Option<String>,
    model: Option<String>,
}

#[derive(Serialize)]
struct NewMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct NewRun<'a> {
    assistant_id: &'a AgentId,
}

#[derive(Debug, Deserialize)]
struct RunBody {
    id: RunId,
    status: String,
    #[serde(default)]
    last_error: Option<RunError>,
}

impl RunBody {
    fn is_pending(&self) -> bool {
        PENDING_RUN_STATUSES.contains(&self.status.as_str())
    }

    fn into_result(self) -> RunResult {
        RunResult { id: self.id, status: RunStatus::parse(&self.status), last_error: self.last_error }
    }
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<MessageBody>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    id: MessageId,
    role: String,
    #[serde(default)]
    content: Vec<ContentPart>,
    #[serde(default)]
    created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    part_type: String,
    #[serde(default)]
    text: Option<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    value: String,
}

impl MessageBody {
    fn into_message(self) -> Message {
        let text_segments = self
            .content
            .into_iter()
            .filter(|part| part.part_type == "text")
            .filter_map(|part| part.text.map(|text| text.value))
            .collect();

        Message {
            id: self.id,
            role: MessageRole::parse(&self.role),
            text_segments,
            created_at: self.created_at.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use spfoundry_core::MessageRole;

    use super::{classify_status, resource_url, MessageList, RunBody};
    use crate::client::ClientError;

    #[test]
    fn classifies_http_statuses() {
        let body = r#"{"error":{"code":"Unauthorized","message":"token expired"}}"#;
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, body, "agent"),
            ClientError::Authentication("token expired".to_string())
        );
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "", "agent"),
            ClientError::Authentication(_)
        ));
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, "", "connection `sp`"),
            ClientError::NotFound { resource: "connection `sp`".to_string() }
        );

        for status in [
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(classify_status(status, "", "run").is_transient(), "{status}");
        }

        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, r#"{"error":{"code":"invalid_model"}}"#, "agent"),
            ClientError::Service { status: 400, message: "invalid_model".to_string() }
        );
    }

    #[test]
    fn unparseable_error_body_falls_back_to_reason_phrase() {
        assert_eq!(
            classify_status(StatusCode::CONFLICT, "<html>nope</html>", "thread"),
            ClientError::Service { status: 409, message: "Conflict".to_string() }
        );
    }

    #[test]
    fn pending_statuses_keep_polling() {
        for (status, pending) in [
            ("queued", true),
            ("in_progress", true),
            ("cancelling", true),
            ("requires_action", false),
            ("completed", false),
            ("failed", false),
            ("expired", false),
        ] {
            let run = RunBody { id: "run_1".into(), status: status.to_string(), last_error: None };
            assert_eq!(run.is_pending(), pending, "{status}");
        }
    }

    #[test]
    fn message_list_keeps_only_text_parts() {
        let page: MessageList = serde_json::from_str(
            r#"{"data":[{
                "id":"msg_2","role":"assistant","created_at":1700000000,
                "content":[
                    {"type":"text","text":{"value":"first","annotations":[]}},
                    {"type":"image_file","image_file":{"file_id":"f"}},
                    {"type":"text","text":{"value":"second"}}
                ]
            }]}"#,
        )
        .expect("decode");

        let messages: Vec<_> = page.data.into_iter().map(|body| body.into_message()).collect();
        assert_eq!(messages[0].role, MessageRole::Assistant);
        assert_eq!(messages[0].text_segments, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(messages[0].last_text(), Some("second"));
        assert!(messages[0].created_at.is_some());
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        let endpoint = "https://contoso.services.ai.azure.com/api/projects/docs";

        let url = resource_url(endpoint, &["connections", "sites/hr?x=1#top"]).expect("url");
        assert_eq!(
            url.as_str(),
            "https://contoso.services.ai.azure.com/api/projects/docs/connections/sites%2Fhr%3Fx=1%23top"
        );

        let url = resource_url(&format!("{endpoint}/"), &["threads", "thread_1", "runs"]).expect("url");
        assert_eq!(url.path(), "/api/projects/docs/threads/thread_1/runs");
        assert!(url.query().is_none());
    }

    #[test]
    fn unparseable_endpoint_is_reported() {
        let error = resource_url("not a url", &["threads"]).expect_err("invalid endpoint");
        assert!(matches!(error, ClientError::InvalidResponse(ref message) if message.contains("not a url")));
    }
}
