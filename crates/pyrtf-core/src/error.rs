use thiserror::Error;

/// Message shown to the user for every failed generation attempt.
pub const GENERATION_FAILURE_MESSAGE: &str =
    "Failed to generate application code. Please check API Key or try again.";

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("a generation request is already in progress")]
    Busy,

    #[error(transparent)]
    Generation(#[from] GenerationFailure),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("prompt error: {0}")]
    Prompt(#[from] pyrtf_pm::PmError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The single failure kind surfaced to callers of a generation request.
///
/// Transport errors, non-success provider statuses and unparseable bodies
/// all collapse into this type. The detailed cause is logged where the
/// failure is mapped; only the human-readable message travels further.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GenerationFailure {
    message: String,
}

impl GenerationFailure {
    /// Create a failure carrying the given display message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message intended for direct display.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for GenerationFailure {
    fn default() -> Self {
        Self::new(GENERATION_FAILURE_MESSAGE)
    }
}

/// Detailed provider-side failure, kept internal to the client boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider misconfigured: {0}")]
    Misconfiguration(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Short label for the failure subkind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Misconfiguration(_) => "misconfiguration",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}
