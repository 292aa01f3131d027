use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use spfoundry_cli::commands::{ask, config, demo, doctor, CommandContext};
use spfoundry_core::config::DotenvSource;

const VALID_ENV: [(&str, &str); 3] = [
    ("PROJECT_ENDPOINT", "https://contoso.services.ai.azure.com/api/projects/docs"),
    ("SHAREPOINT_RESOURCE_NAME", "contoso-sharepoint"),
    ("MODEL_DEPLOYMENT_NAME", "gpt-4o"),
];

fn context() -> CommandContext {
    CommandContext { config_path: None, dotenv: DotenvSource::Disabled, debug: false }
}

#[test]
fn ask_without_settings_exits_with_config_code_and_names_every_missing_variable() {
    with_env(&[], || {
        let result = ask::run(&context(), "What is in the handbook?", None, false);
        assert_eq!(result.exit_code, 2, "expected configuration failure code");
        assert!(result.output.starts_with("Configuration error:"));
        for name in ["PROJECT_ENDPOINT", "SHAREPOINT_RESOURCE_NAME", "MODEL_DEPLOYMENT_NAME"] {
            assert!(result.output.contains(name), "missing `{name}` in: {}", result.output);
        }
        assert!(result.output.contains(".env.example"));
    });
}

#[test]
fn ask_json_reports_config_failure_payload() {
    with_env(&[("PROJECT_ENDPOINT", "https://contoso.services.ai.azure.com/api/projects/docs")], || {
        let result = ask::run(&context(), "What is in the handbook?", None, true);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("SHAREPOINT_RESOURCE_NAME, MODEL_DEPLOYMENT_NAME"));
        assert!(!message.contains("PROJECT_ENDPOINT"));
    });
}

#[test]
fn ask_rejects_blank_question_before_loading_config() {
    with_env(&[], || {
        let result = ask::run(&context(), "   ", None, true);
        assert_eq!(result.exit_code, 1);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "unclassified");
    });
}

#[test]
fn ask_reports_unopenable_log_file_as_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let occupied = dir.path().join("sharepoint_agent.log");
    fs::create_dir(&occupied).expect("directory in place of the log file");
    let log_file = occupied.display().to_string();

    let mut vars = VALID_ENV.to_vec();
    vars.push(("SPFOUNDRY_LOG_FILE", log_file.as_str()));

    with_env(&vars, || {
        let result = ask::run(&context(), "What is in the handbook?", None, true);
        assert_eq!(result.exit_code, 2, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "configuration");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("could not open log file"), "{message}");
    });
}

#[test]
fn demo_with_unknown_use_case_lists_catalog_without_loading_config() {
    with_env(&[], || {
        let words = vec!["Poetry".to_string(), "Writing".to_string()];
        let result = demo::run(&context(), &words);

        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("Use case 'Poetry Writing' not found."));
        for name in [
            "Document Summarization",
            "Content Discovery",
            "Knowledge Extraction",
            "Comparative Analysis",
            "Research Assistance",
        ] {
            assert!(result.output.contains(&format!("  - {name}")), "missing {name}");
        }
    });
}

#[test]
fn demo_with_known_use_case_still_requires_config() {
    with_env(&[], || {
        let words = vec!["content".to_string(), "discovery".to_string()];
        let result = demo::run(&context(), &words);
        assert_eq!(result.exit_code, 2);
    });
}

#[test]
fn config_redacts_secrets_and_attributes_env_sources() {
    let mut vars = VALID_ENV.to_vec();
    vars.push(("AZURE_CLIENT_SECRET", "super-secret-value"));
    vars.push(("SPFOUNDRY_ACCESS_TOKEN", "eyJ0eXAiOiJKV1Qi"));

    with_env(&vars, || {
        let result = config::run(&context());
        assert_eq!(result.exit_code, 0, "{}", result.output);

        assert!(!result.output.contains("super-secret-value"));
        assert!(!result.output.contains("eyJ0eXAiOiJKV1Qi"));
        assert!(result
            .output
            .contains("- auth.client_secret = <redacted> (source: env (AZURE_CLIENT_SECRET))"));
        assert!(result.output.contains("- auth.access_token = <redacted> (source: env (SPFOUNDRY_ACCESS_TOKEN))"));
        assert!(result.output.contains("- project.endpoint = https://contoso.services.ai.azure.com/api/projects/docs (source: env (PROJECT_ENDPOINT))"));
        assert!(result.output.contains("- agent.max_retries = 3 (source: default)"));
        assert!(result.output.contains("- auth.tenant_id = <unset> (source: default)"));
    });
}

#[test]
fn config_attributes_file_values_and_debug_flag() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("spfoundry.toml");
    fs::write(&path, "[agent]\nmax_retries = 5\nrun_timeout_secs = 120\n").expect("write config");

    with_env(&VALID_ENV, || {
        let context = CommandContext {
            config_path: Some(path.clone()),
            dotenv: DotenvSource::Disabled,
            debug: true,
        };
        let result = config::run(&context);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let file_source = format!("(source: file ({}))", path.display());
        assert!(result.output.contains(&format!("- agent.max_retries = 5 {file_source}")));
        assert!(result.output.contains(&format!("- agent.run_timeout_secs = 120 {file_source}")));
        assert!(result.output.contains("- logging.debug = true (source: flag (--debug))"));
    });
}

#[test]
fn config_reports_missing_settings_with_config_exit_code() {
    with_env(&[], || {
        let result = config::run(&context());
        assert_eq!(result.exit_code, 2);
        assert!(result.output.contains("PROJECT_ENDPOINT"));
    });
}

#[test]
fn doctor_json_skips_remote_checks_when_config_fails() {
    with_env(&[], || {
        let result = doctor::run(&context(), true);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");

        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("config_validation"), "fail");
        assert_eq!(status_of("credential_environment"), "skipped");
        assert_eq!(status_of("azure_cli_login"), "skipped");
        assert_eq!(status_of("token_acquisition"), "skipped");
        assert_eq!(status_of("sharepoint_connection"), "skipped");
        assert_eq!(status_of("connection_listing"), "skipped");
    });
}

#[test]
fn doctor_masks_credential_environment() {
    with_env(
        &[
            ("AZURE_TENANT_ID", "tenant-1234"),
            ("AZURE_CLIENT_ID", "client-5678"),
            ("AZURE_CLIENT_SECRET", "hunter2"),
        ],
        || {
            let result = doctor::run(&context(), false);
            assert!(result.output.contains("- [ok] credential_environment:"));
            assert!(result.output.contains("AZURE_CLIENT_SECRET=*******"));
            assert!(!result.output.contains("hunter2"));
            assert!(!result.output.contains("tenant-1234"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).unwrap_or_else(|error| panic!("invalid JSON `{output}`: {error}"))
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PROJECT_ENDPOINT",
        "SHAREPOINT_RESOURCE_NAME",
        "MODEL_DEPLOYMENT_NAME",
        "DEBUG_LOGGING",
        "AZURE_TENANT_ID",
        "AZURE_CLIENT_ID",
        "AZURE_CLIENT_SECRET",
        "AZURE_AUTHORITY_HOST",
        "SPFOUNDRY_API_VERSION",
        "SPFOUNDRY_ACCESS_TOKEN",
        "SPFOUNDRY_TOKEN_SCOPE",
        "SPFOUNDRY_AGENT_NAME",
        "SPFOUNDRY_AGENT_INSTRUCTIONS",
        "SPFOUNDRY_MAX_RETRIES",
        "SPFOUNDRY_RETRY_BASE_DELAY_MS",
        "SPFOUNDRY_RUN_POLL_INTERVAL_MS",
        "SPFOUNDRY_RUN_TIMEOUT_SECS",
        "SPFOUNDRY_REQUEST_TIMEOUT_SECS",
        "SPFOUNDRY_LOG_LEVEL",
        "SPFOUNDRY_LOG_FORMAT",
        "SPFOUNDRY_LOG_FILE",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
