use std::sync::{Mutex, OnceLock};

pub(crate) const ENV_KEYS: &[&str] = &[
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

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub(crate) fn env_lock() -> &'static Mutex<()> {
    ENV_LOCK.get_or_init(|| Mutex::new(()))
}
