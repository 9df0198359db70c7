//! Goal creation from triggers.
//!
//! The factory maps a [`Trigger`] to a goal type, target and priority, asks
//! the [`StrategyOracle`] for the goal text under a bounded timeout, and
//! saves the new goal in `ACTIVE` status at step 0.
//!
//! Creation is best-effort: if the oracle times out or fails the trigger is
//! dropped, not queued. A need crisis re-fires on its next episode.

use std::sync::Arc;

use lifeweave_types::{
    EntityId, EntityNeeds, Goal, GoalPriority, GoalStatus, NeedTier, StrategyPlan, Trigger,
    TurnContext,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::FactoryConfig;
use crate::error::{GoalError, OracleError};
use crate::oracle::{OracleContext, StrategyOracle};
use crate::store::GoalStore;

/// The priority a trigger's goal starts with.
///
/// Tier-1 crises are `URGENT` and tier-2 crises `HIGH`. Everything else is
/// `MEDIUM` unless the trigger carries a severity, which then decides.
pub const fn priority_for(trigger: &Trigger) -> GoalPriority {
    match trigger {
        Trigger::NeedCrisis(t) => match t.tier {
            NeedTier::Survival => GoalPriority::Urgent,
            NeedTier::Security => GoalPriority::High,
            NeedTier::Psychological => t.severity.priority(),
        },
        Trigger::WorldEvent(_) | Trigger::Personality(_) => match trigger.severity() {
            Some(severity) => severity.priority(),
            None => GoalPriority::Medium,
        },
    }
}

/// Builds goals from triggers.
#[derive(Debug)]
pub struct GoalFactory<S, O> {
    store: Arc<S>,
    oracle: Arc<O>,
    config: FactoryConfig,
}

impl<S: GoalStore, O: StrategyOracle> GoalFactory<S, O> {
    /// Create a factory over a goal store and an oracle.
    pub const fn new(store: Arc<S>, oracle: Arc<O>, config: FactoryConfig) -> Self {
        Self {
            store,
            oracle,
            config,
        }
    }

    /// The active configuration.
    pub const fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Create and save a goal for `entity_id` from `trigger`.
    ///
    /// Returns `Ok(None)` when the entity already holds an open goal of the
    /// same `(goal_type, target)`.
    ///
    /// # Errors
    ///
    /// Returns [`GoalError::OracleTimeout`] or [`GoalError::Oracle`] if no
    /// plan could be obtained, and [`GoalError::Store`] if the store failed.
    /// In every error case no goal was saved.
    pub async fn create_from_trigger(
        &self,
        ctx: TurnContext,
        entity_id: EntityId,
        trigger: &Trigger,
        needs: Option<&EntityNeeds>,
    ) -> Result<Option<Goal>, GoalError> {
        let goal_type = trigger.goal_type();
        let target = trigger.target();

        let related = self.store.query_by_target(ctx.session_id, target).await?;
        if related.iter().any(|g| {
            g.owner_entity_id == entity_id && g.goal_type == goal_type && g.status.is_open()
        }) {
            debug!(
                session = %ctx.session_id,
                entity = %entity_id,
                goal_type = %goal_type,
                target,
                "duplicate goal suppressed"
            );
            return Ok(None);
        }

        let open_goals = self
            .store
            .get_active(ctx.session_id)
            .await?
            .iter()
            .filter(|g| g.owner_entity_id == entity_id)
            .map(Goal::summary)
            .collect();
        let context = OracleContext {
            turn: ctx,
            entity_id,
            open_goals,
            needs: needs.cloned(),
        };

        let timeout = self.config.oracle_timeout();
        let plan = match tokio::time::timeout(
            timeout,
            self.oracle.synthesize(trigger, &context, timeout),
        )
        .await
        {
            Ok(Ok(plan)) => normalize_plan(plan)?,
            Ok(Err(e)) => {
                warn!(
                    entity = %entity_id,
                    target,
                    error = %e,
                    "strategy synthesis failed, trigger dropped"
                );
                return Err(e.into());
            }
            Err(_elapsed) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    entity = %entity_id,
                    target,
                    timeout_ms,
                    "strategy synthesis timed out, trigger dropped"
                );
                return Err(GoalError::OracleTimeout { timeout_ms });
            }
        };

        let id = self.store.allocate_id(ctx.session_id).await?;
        let goal_key = format!(
            "{}-{}",
            goal_type.as_str().to_ascii_lowercase(),
            Uuid::now_v7().simple()
        );
        let goal = Goal {
            id,
            session_id: ctx.session_id,
            goal_key,
            owner_entity_id: entity_id,
            goal_type,
            target: target.to_owned(),
            description: plan.description,
            motivation: plan.motivation,
            triggered_by: trigger.clone(),
            priority: priority_for(trigger),
            deadline: self.deadline_for(trigger, ctx.current_turn),
            strategies: plan.strategies,
            current_step: 0,
            status: GoalStatus::Active,
            blocked_reason: None,
            success_condition: plan.success_condition,
            failure_condition: plan.failure_condition,
            outcome: None,
            created_turn: ctx.current_turn,
            completed_turn: None,
            last_processed_turn: None,
        };

        self.store.save(&goal).await?;
        info!(
            session = %ctx.session_id,
            turn = ctx.current_turn,
            goal_id = %goal.id,
            goal_key = %goal.goal_key,
            entity = %entity_id,
            goal_type = %goal_type,
            priority = goal.priority.as_str(),
            trigger = trigger.kind(),
            "goal created"
        );
        Ok(Some(goal))
    }

    fn deadline_for(&self, trigger: &Trigger, turn: u64) -> Option<u64> {
        let turns = match trigger {
            Trigger::NeedCrisis(t) if t.tier == NeedTier::Survival => {
                self.config.survival_deadline_turns
            }
            Trigger::WorldEvent(t) => t
                .deadline_turns
                .or(self.config.world_event_default_deadline_turns),
            Trigger::NeedCrisis(_) | Trigger::Personality(_) => None,
        };
        turns.map(|t| turn.saturating_add(t))
    }
}

/// Drop blank steps and reject plans that cannot form a goal.
fn normalize_plan(mut plan: StrategyPlan) -> Result<StrategyPlan, GoalError> {
    plan.strategies.retain(|s| !s.trim().is_empty());
    if plan.description.trim().is_empty() {
        return Err(OracleError::InvalidPlan {
            reason: String::from("empty description"),
        }
        .into());
    }
    if plan.success_condition.trim().is_empty() {
        return Err(OracleError::InvalidPlan {
            reason: String::from("empty success condition"),
        }
        .into());
    }
    if plan
        .failure_condition
        .as_deref()
        .is_some_and(|c| c.trim().is_empty())
    {
        plan.failure_condition = None;
    }
    Ok(plan)
}
