//! [`LlmStrategyOracle`]: the `StrategyOracle` contract over an LLM API.

use std::path::Path;
use std::time::{Duration, Instant};

use lifeweave_core::{OracleContext, OracleError, StrategyOracle};
use lifeweave_types::{StrategyPlan, Trigger};
use tracing::{debug, info, warn};

use crate::config::LlmOracleConfig;
use crate::error::LlmOracleError;
use crate::llm::LlmBackend;
use crate::parse::parse_plan;
use crate::prompt::PromptEngine;

/// Synthesizes goal plans by prompting an LLM.
#[derive(Debug)]
pub struct LlmStrategyOracle {
    backend: LlmBackend,
    prompts: PromptEngine,
    max_tokens: u32,
}

impl LlmStrategyOracle {
    /// Assemble an oracle from its parts.
    pub const fn new(backend: LlmBackend, prompts: PromptEngine, max_tokens: u32) -> Self {
        Self {
            backend,
            prompts,
            max_tokens,
        }
    }

    /// Build the backend and templates described by `config`.
    pub fn from_config(config: &LlmOracleConfig) -> Result<Self, LlmOracleError> {
        let prompts = match &config.templates_dir {
            Some(dir) => PromptEngine::from_dir(Path::new(dir))?,
            None => PromptEngine::embedded()?,
        };
        Ok(Self::new(
            LlmBackend::new(&config.backend),
            prompts,
            config.max_tokens,
        ))
    }

    /// Name of the backend in use.
    pub const fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

impl StrategyOracle for LlmStrategyOracle {
    async fn synthesize(
        &self,
        trigger: &Trigger,
        context: &OracleContext,
        timeout: Duration,
    ) -> Result<StrategyPlan, OracleError> {
        let prompt = self.prompts.render(trigger, context)?;
        let started = Instant::now();

        let reply = match tokio::time::timeout(
            timeout,
            self.backend.complete(&prompt, self.max_tokens),
        )
        .await
        {
            Ok(reply) => reply?,
            Err(_elapsed) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    backend = self.backend.name(),
                    entity = %context.entity_id,
                    timeout_ms,
                    "LLM call timed out"
                );
                return Err(OracleError::Timeout { timeout_ms });
            }
        };
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(backend = self.backend.name(), latency_ms, reply_len = reply.len(), "LLM reply");

        let plan = parse_plan(&reply).inspect_err(|e| {
            warn!(
                backend = self.backend.name(),
                error = %e,
                raw_response = %reply,
                "unusable LLM reply"
            );
        })?;
        info!(
            backend = self.backend.name(),
            entity = %context.entity_id,
            trigger = trigger.kind(),
            target = trigger.target(),
            steps = plan.strategies.len(),
            latency_ms,
            "strategy synthesized"
        );
        Ok(plan)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lifeweave_types::{EntityId, GoalType, PersonalityTrigger, SessionId, TurnContext};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::{BackendType, LlmBackendConfig};

    fn trigger() -> Trigger {
        Trigger::Personality(PersonalityTrigger {
            trait_name: String::from("curiosity"),
            goal_type: GoalType::Explore,
            target: String::from("old lighthouse"),
            severity: None,
        })
    }

    fn context() -> OracleContext {
        OracleContext {
            turn: TurnContext::new(SessionId::new(), 12),
            entity_id: EntityId::new(),
            open_goals: Vec::new(),
            needs: None,
        }
    }

    fn oracle_for(api_url: String) -> LlmStrategyOracle {
        let config = LlmBackendConfig {
            backend_type: BackendType::OpenAi,
            api_url,
            api_key: String::from("test"),
            model: String::from("test-model"),
        };
        LlmStrategyOracle::new(LlmBackend::new(&config), PromptEngine::embedded().unwrap(), 128)
    }

    /// Serve one canned HTTP response with `body` as JSON.
    async fn serve_once(body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0_u8; 65_536];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn synthesizes_plan_from_openai_reply() {
        let content = r#"{"description": "Explore the old lighthouse", "motivation": ["curious"], "strategies": ["walk to the cliffs", "climb the stairs"], "success_condition": "lighthouse explored"}"#;
        let body = serde_json::json!({
            "choices": [{"message": {"content": content}}]
        })
        .to_string();
        let url = serve_once(body).await;

        let oracle = oracle_for(url);
        let plan = oracle
            .synthesize(&trigger(), &context(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(plan.strategies, vec!["walk to the cliffs", "climb the stairs"]);
        assert_eq!(plan.success_condition, "lighthouse explored");
    }

    #[tokio::test]
    async fn unparseable_reply_is_invalid_plan() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "I'd rather not."}}]
        })
        .to_string();
        let url = serve_once(body).await;

        let err = oracle_for(url)
            .synthesize(&trigger(), &context(), Duration::from_secs(5))
            .await;
        assert!(matches!(err, Err(OracleError::InvalidPlan { .. })));
    }

    #[tokio::test]
    async fn silent_backend_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let err = oracle_for(format!("http://{addr}"))
            .synthesize(&trigger(), &context(), Duration::from_millis(100))
            .await;
        assert!(matches!(err, Err(OracleError::Timeout { timeout_ms: 100 })));
    }

    #[test]
    fn from_config_uses_embedded_templates() {
        let config = LlmOracleConfig {
            backend: LlmBackendConfig {
                backend_type: BackendType::Anthropic,
                api_url: String::from("https://api.anthropic.com/v1"),
                api_key: String::from("k"),
                model: String::from("m"),
            },
            templates_dir: None,
            max_tokens: 300,
        };
        let oracle = LlmStrategyOracle::from_config(&config).unwrap();
        assert_eq!(oracle.backend_name(), "anthropic");
    }
}
