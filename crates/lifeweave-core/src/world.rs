//! The `WorldStateQuery` contract and a deterministic scripted world.
//!
//! The scheduler takes one [`WorldSnapshot`] per tick and asks every
//! question of that tick against it, so all goals see the same world.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lifeweave_types::{Goal, GoalId, TurnContext};
use tokio::sync::RwLock;

use crate::error::WorldQueryError;

/// Whether a strategy step can be attempted now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCheck {
    /// The step's precondition holds.
    pub satisfied: bool,
    /// Why not, when unsatisfied.
    pub reason: Option<String>,
}

impl StepCheck {
    /// A satisfied step.
    pub const fn satisfied() -> Self {
        Self {
            satisfied: true,
            reason: None,
        }
    }

    /// An unsatisfied step with a reason.
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            satisfied: false,
            reason: Some(reason.into()),
        }
    }
}

/// Whether a goal's success or failure condition currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditionCheck {
    /// The success condition holds.
    pub success_met: bool,
    /// The failure condition holds.
    pub failure_met: bool,
}

/// A view of the world fixed for one tick.
pub trait WorldSnapshot: Send + Sync {
    /// Whether step `step` of `goal` can be attempted.
    fn is_step_satisfiable(
        &self,
        goal: &Goal,
        step: u32,
    ) -> impl Future<Output = Result<StepCheck, WorldQueryError>> + Send;

    /// Whether the goal's success or failure condition holds.
    fn check_conditions(
        &self,
        goal: &Goal,
    ) -> impl Future<Output = Result<ConditionCheck, WorldQueryError>> + Send;

    /// Which of `claimants` (goals about to act on `target` this tick)
    /// contest it exclusively. An empty answer means the target is shared.
    fn resolve_contention_candidates(
        &self,
        target: &str,
        claimants: &[Goal],
    ) -> impl Future<Output = Result<Vec<GoalId>, WorldQueryError>> + Send;
}

/// Source of per-tick world snapshots.
pub trait WorldStateQuery: Send + Sync {
    /// The snapshot type handed out per tick.
    type Snapshot: WorldSnapshot;

    /// Take a consistent snapshot for the tick described by `ctx`.
    fn snapshot(
        &self,
        ctx: TurnContext,
    ) -> impl Future<Output = Result<Self::Snapshot, WorldQueryError>> + Send;
}

#[derive(Debug, Clone, Default)]
struct WorldScript {
    blocked_steps: BTreeMap<String, String>,
    holding_conditions: BTreeSet<String>,
    exclusive_targets: BTreeSet<String>,
    failing_goals: BTreeSet<String>,
    slow_goals: BTreeMap<String, Duration>,
    snapshot_unavailable: bool,
}

/// A deterministic [`WorldStateQuery`] for tests and tooling.
///
/// Steps are satisfiable unless their text was blocked. Conditions hold when
/// their text was set. Exclusive targets are contested by every claimant.
/// Queries for individual goal keys can be made to fail or stall.
#[derive(Debug, Default)]
pub struct ScriptedWorld {
    script: RwLock<WorldScript>,
}

impl ScriptedWorld {
    /// A world where everything is reachable and nothing holds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make any step with text `step` unsatisfiable for `reason`.
    pub async fn block_step(&self, step: &str, reason: &str) {
        self.script
            .write()
            .await
            .blocked_steps
            .insert(step.to_owned(), reason.to_owned());
    }

    /// Make any step with text `step` satisfiable again.
    pub async fn unblock_step(&self, step: &str) {
        self.script.write().await.blocked_steps.remove(step);
    }

    /// Set whether the condition text `condition` holds.
    pub async fn set_condition(&self, condition: &str, holds: bool) {
        let mut script = self.script.write().await;
        if holds {
            script.holding_conditions.insert(condition.to_owned());
        } else {
            script.holding_conditions.remove(condition);
        }
    }

    /// Mark `target` as an exclusive resource.
    pub async fn set_exclusive(&self, target: &str) {
        self.script
            .write()
            .await
            .exclusive_targets
            .insert(target.to_owned());
    }

    /// Make every query about `goal_key` fail.
    pub async fn fail_queries_for(&self, goal_key: &str) {
        self.script
            .write()
            .await
            .failing_goals
            .insert(goal_key.to_owned());
    }

    /// Delay every query about `goal_key` by `delay`.
    pub async fn stall_queries_for(&self, goal_key: &str, delay: Duration) {
        self.script
            .write()
            .await
            .slow_goals
            .insert(goal_key.to_owned(), delay);
    }

    /// Make `snapshot` itself fail (`true`) or succeed (`false`).
    pub async fn set_snapshot_unavailable(&self, unavailable: bool) {
        self.script.write().await.snapshot_unavailable = unavailable;
    }
}

impl WorldStateQuery for ScriptedWorld {
    type Snapshot = ScriptedSnapshot;

    async fn snapshot(&self, ctx: TurnContext) -> Result<ScriptedSnapshot, WorldQueryError> {
        let script = self.script.read().await;
        if script.snapshot_unavailable {
            return Err(WorldQueryError::Failed {
                message: format!("no world snapshot for turn {}", ctx.current_turn),
            });
        }
        Ok(ScriptedSnapshot {
            script: Arc::new(script.clone()),
        })
    }
}

/// The frozen script a [`ScriptedWorld`] hands to one tick.
#[derive(Debug, Clone)]
pub struct ScriptedSnapshot {
    script: Arc<WorldScript>,
}

impl ScriptedSnapshot {
    async fn gate(&self, goal: &Goal) -> Result<(), WorldQueryError> {
        if let Some(delay) = self.script.slow_goals.get(&goal.goal_key) {
            tokio::time::sleep(*delay).await;
        }
        if self.script.failing_goals.contains(&goal.goal_key) {
            return Err(WorldQueryError::Failed {
                message: format!("scripted failure for goal `{}`", goal.goal_key),
            });
        }
        Ok(())
    }
}

impl WorldSnapshot for ScriptedSnapshot {
    async fn is_step_satisfiable(
        &self,
        goal: &Goal,
        step: u32,
    ) -> Result<StepCheck, WorldQueryError> {
        self.gate(goal).await?;
        let text = usize::try_from(step)
            .ok()
            .and_then(|i| goal.strategies.get(i));
        Ok(match text.and_then(|t| self.script.blocked_steps.get(t)) {
            Some(reason) => StepCheck::blocked(reason.clone()),
            None => StepCheck::satisfied(),
        })
    }

    async fn check_conditions(&self, goal: &Goal) -> Result<ConditionCheck, WorldQueryError> {
        self.gate(goal).await?;
        let holds = |c: &str| self.script.holding_conditions.contains(c);
        Ok(ConditionCheck {
            success_met: holds(&goal.success_condition),
            failure_met: goal.failure_condition.as_deref().is_some_and(holds),
        })
    }

    async fn resolve_contention_candidates(
        &self,
        target: &str,
        claimants: &[Goal],
    ) -> Result<Vec<GoalId>, WorldQueryError> {
        if !self.script.exclusive_targets.contains(target) {
            return Ok(Vec::new());
        }
        Ok(claimants
            .iter()
            .filter(|g| g.target == target)
            .map(|g| g.id)
            .collect())
    }
}
