//! Error types for the LLM oracle.

use lifeweave_core::OracleError;

/// Errors raised while configuring or calling the LLM oracle.
#[derive(Debug, thiserror::Error)]
pub enum LlmOracleError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// A prompt template failed to load or render.
    #[error("template error: {0}")]
    Template(String),

    /// The LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    Backend(String),

    /// The reply did not contain a usable plan.
    #[error("response parse error: {0}")]
    Parse(String),

    /// Serialization failure while building the prompt context.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<LlmOracleError> for OracleError {
    fn from(err: LlmOracleError) -> Self {
        match err {
            LlmOracleError::Parse(reason) => Self::InvalidPlan { reason },
            other => Self::Failed {
                message: other.to_string(),
            },
        }
    }
}
