//! Prompt template loading and rendering via `minijinja`.
//!
//! Two templates make up a prompt: `system.j2` (role and reply format) and
//! `trigger.j2` (what happened, the entity's needs and held goals). Both are
//! compiled into the crate; a directory may replace either one so operators
//! can tune wording without recompiling.

use std::path::Path;

use lifeweave_core::OracleContext;
use lifeweave_types::Trigger;
use minijinja::Environment;

use crate::error::LlmOracleError;

const SYSTEM_TEMPLATE: &str = include_str!("../templates/system.j2");
const TRIGGER_TEMPLATE: &str = include_str!("../templates/trigger.j2");

/// The complete rendered prompt ready to send to an LLM backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// System message: role and reply format.
    pub system: String,
    /// User message: the trigger and the entity's situation.
    pub user: String,
}

/// Compiled prompt templates.
#[derive(Debug)]
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// An engine using the built-in templates.
    pub fn embedded() -> Result<Self, LlmOracleError> {
        Self::build(SYSTEM_TEMPLATE.to_owned(), TRIGGER_TEMPLATE.to_owned())
    }

    /// An engine using `system.j2` and `trigger.j2` from `dir` where present,
    /// and the built-in templates otherwise.
    pub fn from_dir(dir: &Path) -> Result<Self, LlmOracleError> {
        let system = load_or_default(dir, "system.j2", SYSTEM_TEMPLATE)?;
        let trigger = load_or_default(dir, "trigger.j2", TRIGGER_TEMPLATE)?;
        Self::build(system, trigger)
    }

    fn build(system: String, trigger: String) -> Result<Self, LlmOracleError> {
        let mut env = Environment::new();
        env.add_template_owned("system", system)
            .map_err(|e| LlmOracleError::Template(format!("failed to add system template: {e}")))?;
        env.add_template_owned("trigger", trigger)
            .map_err(|e| LlmOracleError::Template(format!("failed to add trigger template: {e}")))?;
        Ok(Self { env })
    }

    /// Render the prompt for `trigger` in `context`.
    pub fn render(
        &self,
        trigger: &Trigger,
        context: &OracleContext,
    ) -> Result<RenderedPrompt, LlmOracleError> {
        let needs = context
            .needs
            .as_ref()
            .map(|n| n.needs.clone())
            .unwrap_or_default();
        let vars = serde_json::json!({
            "turn": context.turn.current_turn,
            "goal_type": trigger.goal_type().as_str(),
            "target": trigger.target(),
            "trigger": trigger,
            "needs": needs,
            "open_goals": context.open_goals,
        });

        let system = self.render_one("system", &vars)?;
        let user = self.render_one("trigger", &vars)?;
        Ok(RenderedPrompt { system, user })
    }

    fn render_one(&self, name: &str, vars: &serde_json::Value) -> Result<String, LlmOracleError> {
        self.env
            .get_template(name)
            .map_err(|e| LlmOracleError::Template(format!("missing {name} template: {e}")))?
            .render(vars)
            .map_err(|e| LlmOracleError::Template(format!("{name} render failed: {e}")))
    }
}

/// Read `dir/filename`, or fall back to `default` when the file is absent.
fn load_or_default(dir: &Path, filename: &str, default: &str) -> Result<String, LlmOracleError> {
    let path = dir.join(filename);
    if !path.exists() {
        return Ok(default.to_owned());
    }
    std::fs::read_to_string(&path).map_err(|e| {
        LlmOracleError::Template(format!("failed to read {}: {e}", path.display()))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lifeweave_types::{
        EntityId, EntityNeeds, GoalId, GoalPriority, GoalStatus, GoalSummary, GoalType, Need,
        NeedCrisisTrigger, NeedPolarity, NeedTier, SessionId, Severity, TurnContext,
        WorldEventTrigger,
    };

    use super::*;

    fn hunger_trigger() -> Trigger {
        Trigger::NeedCrisis(NeedCrisisTrigger {
            need_key: String::from("hunger"),
            tier: NeedTier::Survival,
            severity: Severity::Severe,
            value: 9,
        })
    }

    fn context(with_needs: bool) -> OracleContext {
        let entity_id = EntityId::new();
        let needs = with_needs.then(|| {
            let mut needs = EntityNeeds::empty(entity_id);
            needs.needs.insert(
                String::from("hunger"),
                Need {
                    key: String::from("hunger"),
                    tier: NeedTier::Survival,
                    value: 9,
                    decay_rate: 4,
                    polarity: NeedPolarity::Depleting,
                    crisis_threshold: 20,
                    crisis_flagged: true,
                    decay_remainder: 0,
                    last_satisfied_turn: None,
                },
            );
            needs
        });
        OracleContext {
            turn: TurnContext::new(SessionId::new(), 3),
            entity_id,
            open_goals: vec![GoalSummary {
                id: GoalId(7),
                goal_key: String::from("acquire-7"),
                goal_type: GoalType::Acquire,
                target: String::from("lute"),
                priority: GoalPriority::Low,
                status: GoalStatus::Blocked,
                current_step: 0,
            }],
            needs,
        }
    }

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let unique = format!(
            "lifeweave_{tag}_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn embedded_templates_render_need_crisis() {
        let engine = PromptEngine::embedded().unwrap();
        let prompt = engine.render(&hunger_trigger(), &context(true)).unwrap();

        assert!(prompt.system.contains("JSON"));
        assert!(prompt.user.contains("Turn: 3"));
        assert!(prompt.user.contains("Target: hunger"));
        assert!(prompt.user.contains("hunger: 9/100"));
        assert!(prompt.user.contains("lute"));
    }

    #[test]
    fn world_event_without_needs_renders() {
        let engine = PromptEngine::embedded().unwrap();
        let trigger = Trigger::WorldEvent(WorldEventTrigger {
            event: String::from("the granary burned down"),
            goal_type: GoalType::Protect,
            target: String::from("village"),
            severity: None,
            deadline_turns: None,
        });
        let prompt = engine.render(&trigger, &context(false)).unwrap();
        assert!(prompt.user.contains("the granary burned down"));
        assert!(prompt.user.contains("unknown"));
    }

    #[test]
    fn directory_overrides_only_present_templates() {
        let dir = temp_dir("prompt_override");
        std::fs::write(dir.join("system.j2"), "Plan for {{ target }}.").ok();

        let engine = PromptEngine::from_dir(&dir).unwrap();
        let prompt = engine.render(&hunger_trigger(), &context(true)).unwrap();
        assert_eq!(prompt.system, "Plan for hunger.");
        assert!(prompt.user.contains("Turn: 3"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn broken_template_is_an_error() {
        let dir = temp_dir("prompt_broken");
        std::fs::write(dir.join("trigger.j2"), "{% for x in %}").ok();
        assert!(PromptEngine::from_dir(&dir).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
