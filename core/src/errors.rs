use thiserror::Error;

use crate::agents::providers::Provider;

/// Every failure the orchestration layer can surface.
///
/// The explain path folds all of these into a fallback explanation, the chat
/// path hands them to the caller, whose message layer renders `to_string()`
/// verbatim.
#[derive(Debug, Error)]
pub enum LearnFlowError {
    #[error("{provider} API key not set. Please configure it in the extension settings.")]
    Configuration { provider: Provider },
    /// Non-success HTTP status. `message` is the remote `error.message` when
    /// the body carried one.
    #[error("{message}")]
    ApiRequest { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Storage unavailable: {0}")]
    Storage(String),
}

impl LearnFlowError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CFG-1001",
            Self::ApiRequest { .. } => "API-1001",
            Self::Network(_) => "NET-1001",
            Self::MalformedResponse(_) => "RSP-1001",
            Self::Storage(_) => "DB-1001",
        }
    }

    /// Error class name as shown to the user in fallback text.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "ConfigurationError",
            Self::ApiRequest { .. } => "ApiRequestError",
            Self::Network(_) => "NetworkError",
            Self::MalformedResponse(_) => "MalformedResponseError",
            Self::Storage(_) => "StorageError",
        }
    }

    pub fn explain(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "No API key is stored for the selected provider.",
            Self::ApiRequest { .. } => "The provider rejected the completion request.",
            Self::Network(_) => "The provider could not be reached.",
            Self::MalformedResponse(_) => "The model reply was not the expected JSON document.",
            Self::Storage(_) => "The settings database could not be accessed.",
        }
    }
}
