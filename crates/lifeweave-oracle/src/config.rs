//! Configuration for the LLM oracle.
//!
//! Loaded from environment variables so API keys never live in the YAML
//! configuration file.

use crate::error::LlmOracleError;

/// Default cap on reply length.
const DEFAULT_MAX_TOKENS: u32 = 600;

/// Complete oracle configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmOracleConfig {
    /// The backend to call.
    pub backend: LlmBackendConfig,
    /// Directory whose `system.j2` / `trigger.j2` replace the embedded
    /// templates, when set.
    pub templates_dir: Option<String>,
    /// Maximum tokens requested per reply.
    pub max_tokens: u32,
}

/// Configuration for a single LLM backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmBackendConfig {
    /// The backend type.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible API (works with `OpenAI`, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

impl BackendType {
    /// Parse a backend name as written in `ORACLE_BACKEND`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }
}

impl LlmOracleConfig {
    /// Load configuration from the process environment.
    ///
    /// Required variables:
    /// - `ORACLE_BACKEND` -- `openai`, `deepseek`, `ollama` or `anthropic`
    /// - `ORACLE_API_URL` -- API base URL
    /// - `ORACLE_API_KEY` -- API key
    /// - `ORACLE_MODEL` -- model name
    ///
    /// Optional variables:
    /// - `ORACLE_TEMPLATES_DIR` -- directory of replacement templates
    /// - `ORACLE_MAX_TOKENS` -- reply length cap (default 600)
    pub fn from_env() -> Result<Self, LlmOracleError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LlmOracleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| LlmOracleError::Config(format!("missing required env var {name}")))
        };

        let backend_str = required("ORACLE_BACKEND")?;
        let backend_type = BackendType::parse(&backend_str).ok_or_else(|| {
            LlmOracleError::Config(format!("unknown backend type: {backend_str}"))
        })?;
        let backend = LlmBackendConfig {
            backend_type,
            api_url: required("ORACLE_API_URL")?.trim_end_matches('/').to_owned(),
            api_key: required("ORACLE_API_KEY")?,
            model: required("ORACLE_MODEL")?,
        };

        let templates_dir = lookup("ORACLE_TEMPLATES_DIR").filter(|d| !d.trim().is_empty());

        let max_tokens = match lookup("ORACLE_MAX_TOKENS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| LlmOracleError::Config(format!("invalid ORACLE_MAX_TOKENS: {e}")))?,
            None => DEFAULT_MAX_TOKENS,
        };

        Ok(Self {
            backend,
            templates_dir,
            max_tokens,
        })
    }
}
