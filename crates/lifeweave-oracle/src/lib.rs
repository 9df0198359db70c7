//! LLM-backed strategy synthesis for Lifeweave.
//!
//! [`LlmStrategyOracle`] implements the core `StrategyOracle` contract by
//! rendering a trigger into a prompt, sending it to an OpenAI-compatible or
//! Anthropic HTTP API, and parsing the JSON plan out of the reply.
//!
//! - [`config`] -- Backend configuration from environment variables
//! - [`llm`] -- HTTP transport with schema-constrained plan replies
//! - [`prompt`] -- `minijinja` prompt templates
//! - [`parse`] -- Tolerant JSON plan extraction
//! - [`oracle`] -- The `StrategyOracle` implementation
//! - [`error`] -- Error types

pub mod config;
pub mod error;
pub mod llm;
pub mod oracle;
pub mod parse;
pub mod prompt;

pub use config::{BackendType, LlmBackendConfig, LlmOracleConfig};
pub use error::LlmOracleError;
pub use llm::{LlmBackend, PLAN_TOOL, plan_schema};
pub use oracle::LlmStrategyOracle;
pub use parse::parse_plan;
pub use prompt::{PromptEngine, RenderedPrompt};
