//! Error types for the provisioner core.
//!

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionerError {
    /// Malformed or disallowed input, rejected before any state is mutated
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// An update lost against a state that has already moved on
    #[error("Transition conflict: {0}")]
    TransitionConflict(String),
    /// The remote provisioning target failed (auth, network, not found)
    #[error("Remote operation failed: {0}")]
    RemoteOperationFailure(String),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Document already exists: {0}")]
    AlreadyExists(String),
    /// A self-update could not be handed to the update pipeline
    #[error("Dispatch error: {0}")]
    Dispatch(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ProvisionerError {
    /// HTTP-equivalent status code reported to callers
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) => 400,
            Self::NotFound(_) => 404,
            Self::TransitionConflict(_) | Self::AlreadyExists(_) => 409,
            Self::RemoteOperationFailure(_) => 502,
            Self::Dispatch(_) => 503,
            Self::Configuration(_) | Self::Serialization(_) => 500,
        }
    }

    /// Whether the failure is attributable to the caller's request
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<serde_json::Error> for ProvisionerError {
    fn from(error: serde_json::Error) -> Self {
        ProvisionerError::Serialization(error.to_string())
    }
}

impl From<config::ConfigError> for ProvisionerError {
    fn from(error: config::ConfigError) -> Self {
        ProvisionerError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProvisionerError>;
