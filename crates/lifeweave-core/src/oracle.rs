//! The `StrategyOracle` contract and a deterministic scripted oracle.
//!
//! An oracle turns a structured [`Trigger`] into the human-readable parts of
//! a goal: description, motivation, ordered strategy steps, and success and
//! failure conditions. Real oracles are nondeterministic (an LLM behind
//! `lifeweave-oracle`); the scheduler never calls one, only the factory does.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lifeweave_types::{
    EntityId, EntityNeeds, GoalSummary, GoalType, StrategyPlan, Trigger, TurnContext,
};
use serde::Serialize;

use crate::error::OracleError;

/// What an oracle knows about the entity a trigger concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleContext {
    /// Session and turn.
    pub turn: TurnContext,
    /// The entity the goal is for.
    pub entity_id: EntityId,
    /// The entity's open goals.
    pub open_goals: Vec<GoalSummary>,
    /// The entity's needs, when known.
    pub needs: Option<EntityNeeds>,
}

/// Source of goal text for triggers.
pub trait StrategyOracle: Send + Sync {
    /// Produce a plan for `trigger`, answering within `timeout`.
    ///
    /// Callers enforce `timeout` themselves as well; implementations may use
    /// it to bound their own upstream calls.
    fn synthesize(
        &self,
        trigger: &Trigger,
        context: &OracleContext,
        timeout: Duration,
    ) -> impl Future<Output = Result<StrategyPlan, OracleError>> + Send;
}

/// A deterministic oracle driven by a rule table.
///
/// Plans are looked up by `(goal_type, target)`. Unmatched triggers get a
/// generic two-step plan derived from the target. Targets can be scripted
/// to fail, and every answer can be delayed to exercise timeouts.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    plans: BTreeMap<(GoalType, String), StrategyPlan>,
    failing_targets: BTreeSet<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    /// An oracle that answers every trigger with the generic plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer triggers for `(goal_type, target)` with `plan`.
    #[must_use]
    pub fn with_plan(mut self, goal_type: GoalType, target: &str, plan: StrategyPlan) -> Self {
        self.plans.insert((goal_type, target.to_owned()), plan);
        self
    }

    /// Fail every trigger about `target`.
    #[must_use]
    pub fn failing_for(mut self, target: &str) -> Self {
        self.failing_targets.insert(target.to_owned());
        self
    }

    /// Sleep for `delay` before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `synthesize` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }

    fn generic_plan(trigger: &Trigger) -> StrategyPlan {
        let target = trigger.target();
        StrategyPlan {
            description: format!("{} goal about {target}", trigger.goal_type()),
            motivation: vec![format!("prompted by {}", trigger.kind())],
            strategies: vec![format!("seek {target}"), format!("secure {target}")],
            success_condition: format!("{target} secured"),
            failure_condition: None,
        }
    }
}

impl StrategyOracle for ScriptedOracle {
    async fn synthesize(
        &self,
        trigger: &Trigger,
        _context: &OracleContext,
        _timeout: Duration,
    ) -> Result<StrategyPlan, OracleError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let target = trigger.target();
        if self.failing_targets.contains(target) {
            return Err(OracleError::Failed {
                message: format!("scripted failure for `{target}`"),
            });
        }

        Ok(self
            .plans
            .get(&(trigger.goal_type(), target.to_owned()))
            .cloned()
            .unwrap_or_else(|| Self::generic_plan(trigger)))
    }
}
