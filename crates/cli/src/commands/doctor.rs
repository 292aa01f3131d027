use std::env;

use serde::Serialize;
use spfoundry_agent::{AgentsClient, ClientError, FoundryClient};
use spfoundry_core::config::AppConfig;
use spfoundry_core::ErrorKind;

use crate::commands::{runtime, CommandContext, CommandResult};

const CREDENTIAL_ENV_VARS: [&str; 3] = ["AZURE_TENANT_ID", "AZURE_CLIENT_ID", "AZURE_CLIENT_SECRET"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
    #[serde(skip)]
    failure_kind: Option<ErrorKind>,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into(), failure_kind: None }
    }

    fn fail(name: &'static str, kind: ErrorKind, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into(), failure_kind: Some(kind) }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into(), failure_kind: None }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
        let (overall_status, summary) = if failed {
            (CheckStatus::Fail, "doctor: one or more authentication checks failed")
        } else {
            (CheckStatus::Pass, "doctor: the SharePoint agent should work correctly")
        };
        Self { overall_status, summary: summary.to_string(), checks }
    }

    fn exit_code(&self) -> u8 {
        self.checks
            .iter()
            .find_map(|check| check.failure_kind)
            .map(ErrorKind::exit_code)
            .unwrap_or(0)
    }
}

pub fn run(context: &CommandContext, json_output: bool) -> CommandResult {
    let report = build_report(context);
    let exit_code = report.exit_code();

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::text(exit_code, output);
    }

    CommandResult::text(exit_code, render_human(&report))
}

fn build_report(context: &CommandContext) -> DoctorReport {
    let mut checks = Vec::new();

    let config = match context.load_config() {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                format!(
                    "endpoint `{}`, SharePoint connection `{}`, model deployment `{}`",
                    config.project.endpoint,
                    config.project.sharepoint_resource_name,
                    config.project.model_deployment_name
                ),
            ));
            Some(config)
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", ErrorKind::from(&error), error.to_string()));
            None
        }
    };

    checks.push(check_credential_environment());

    let Some(config) = config else {
        for name in ["azure_cli_login", "token_acquisition", "sharepoint_connection", "connection_listing"] {
            checks.push(DoctorCheck::skipped(name, "skipped because configuration did not load"));
        }
        return DoctorReport::from_checks(checks);
    };

    let runtime = match runtime("doctor", true) {
        Ok(runtime) => runtime,
        Err(result) => {
            checks.push(DoctorCheck::fail("token_acquisition", ErrorKind::Unclassified, result.output));
            return DoctorReport::from_checks(checks);
        }
    };

    runtime.block_on(remote_checks(&config, &mut checks));
    DoctorReport::from_checks(checks)
}

fn check_credential_environment() -> DoctorCheck {
    let mut missing = Vec::new();
    let rendered: Vec<String> = CREDENTIAL_ENV_VARS
        .iter()
        .map(|name| match env::var(name) {
            Ok(value) if !value.trim().is_empty() => format!("{name}={}", mask(&value)),
            _ => {
                missing.push(*name);
                format!("{name}=<unset>")
            }
        })
        .collect();

    if missing.is_empty() {
        DoctorCheck::pass("credential_environment", rendered.join(", "))
    } else {
        DoctorCheck::skipped(
            "credential_environment",
            format!("service principal not configured ({})", rendered.join(", ")),
        )
    }
}

async fn remote_checks(config: &AppConfig, checks: &mut Vec<DoctorCheck>) {
    let other_credentials = config.auth.access_token.is_some() || config.auth.has_client_secret();
    checks.push(check_azure_cli(other_credentials).await);

    let client = match FoundryClient::from_config(config) {
        Ok(client) => client,
        Err(error) => {
            checks.push(client_failure("token_acquisition", &error));
            skip_after_token(checks);
            return;
        }
    };

    match client.access_token().await {
        Ok(token) => checks.push(DoctorCheck::pass(
            "token_acquisition",
            format!("{} issued a token expiring at {}", client.credential_name(), token.expires_on),
        )),
        Err(error) => {
            checks.push(client_failure("token_acquisition", &error));
            skip_after_token(checks);
            return;
        }
    }

    let connection_name = &config.project.sharepoint_resource_name;
    match client.get_connection(connection_name).await {
        Ok(connection) => checks.push(DoctorCheck::pass(
            "sharepoint_connection",
            format!(
                "found `{}` ({}), type {}",
                connection.name,
                connection.id,
                connection.connection_type.as_deref().unwrap_or("unknown")
            ),
        )),
        Err(ClientError::NotFound { .. }) => checks.push(DoctorCheck::fail(
            "sharepoint_connection",
            ErrorKind::ResourceNotFound,
            format!("connection `{connection_name}` was not found in the project"),
        )),
        Err(error) => checks.push(client_failure("sharepoint_connection", &error)),
    }

    match client.list_connections().await {
        Ok(connections) => {
            let names: Vec<String> = connections
                .iter()
                .map(|connection| format!("{} ({})", connection.name, connection.id))
                .collect();
            checks.push(DoctorCheck::pass(
                "connection_listing",
                format!("{} connection(s): {}", connections.len(), names.join(", ")),
            ));
        }
        Err(error) => checks.push(client_failure("connection_listing", &error)),
    }
}

async fn check_azure_cli(other_credentials: bool) -> DoctorCheck {
    let program = if cfg!(windows) { "az.cmd" } else { "az" };
    let output = tokio::process::Command::new(program)
        .args(["account", "show", "--output", "json"])
        .output()
        .await;

    let problem = match output {
        Ok(output) if output.status.success() => {
            let account: serde_json::Value =
                serde_json::from_slice(&output.stdout).unwrap_or(serde_json::Value::Null);
            let user = account["user"]["name"].as_str().unwrap_or("unknown user");
            let subscription = account["name"].as_str().unwrap_or("unknown subscription");
            return DoctorCheck::pass(
                "azure_cli_login",
                format!("signed in as {user} ({subscription})"),
            );
        }
        Ok(_) => "Azure CLI is not signed in; run 'az login'",
        Err(_) => "Azure CLI is not available",
    };

    if other_credentials {
        DoctorCheck::skipped("azure_cli_login", format!("{problem}; another credential is configured"))
    } else {
        DoctorCheck::fail("azure_cli_login", ErrorKind::Authentication, problem)
    }
}

fn client_failure(name: &'static str, error: &ClientError) -> DoctorCheck {
    DoctorCheck::fail(name, error.kind(), error.to_string())
}

fn skip_after_token(checks: &mut Vec<DoctorCheck>) {
    for name in ["sharepoint_connection", "connection_listing"] {
        checks.push(DoctorCheck::skipped(name, "skipped because no access token was acquired"));
    }
}

fn mask(value: &str) -> String {
    "*".repeat(value.chars().count())
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    if report.overall_status == CheckStatus::Fail {
        lines.push(String::new());
        lines.push("Possible solutions:".to_string());
        lines.push("  1. Run 'az login' to authenticate with Azure CLI".to_string());
        lines.push("  2. Set AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET".to_string());
        lines.push("  3. Check your Azure permissions on the AI Foundry project".to_string());
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
