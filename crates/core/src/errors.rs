use serde::Serialize;

use crate::config::ConfigError;

/// Failure classes every error in the workspace maps onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Authentication,
    ResourceNotFound,
    TransientService,
    Unclassified,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Authentication => "authentication",
            Self::ResourceNotFound => "resource_not_found",
            Self::TransientService => "transient_service",
            Self::Unclassified => "unclassified",
        }
    }

    /// Errors of this kind end the session instead of failing a single query.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Configuration | Self::Authentication | Self::ResourceNotFound)
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, Self::TransientService)
    }

    pub fn user_message(self) -> &'static str {
        match self {
            Self::Configuration => {
                "Configuration is incomplete. Set the missing variables or create a .env file."
            }
            Self::Authentication => {
                "Failed to authenticate with Azure. Run `az login` or set AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET, and check that your identity can access the project."
            }
            Self::ResourceNotFound => {
                "A required resource was not found. Verify the SharePoint connection name in your Azure AI Foundry project."
            }
            Self::TransientService => {
                "The agent service is temporarily unavailable. Please retry shortly."
            }
            Self::Unclassified => "An unexpected error occurred while talking to the agent service.",
        }
    }

    /// Process exit code used by the CLI for failures of this kind.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Configuration => 2,
            Self::Authentication => 3,
            Self::ResourceNotFound => 4,
            Self::TransientService | Self::Unclassified => 1,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ConfigError> for ErrorKind {
    fn from(_: &ConfigError) -> Self {
        Self::Configuration
    }
}
