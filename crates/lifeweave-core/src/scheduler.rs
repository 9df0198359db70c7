//! The per-turn goal scheduler.
//!
//! [`GoalScheduler::run_tick`] runs one authoritative pass over a session's
//! open goals:
//!
//! 1. **Overrides** -- queued external requests go through the transition
//!    validator; goals they abandon or fail sit out evaluation this tick.
//!    Annotations leave the goal in play.
//! 2. **Select** -- open goals never processed, or processed at least
//!    `processing_interval` turns ago.
//! 3. **Order** -- priority desc, `created_turn` asc, id asc.
//! 4. **Evaluate** -- against one world snapshot, concurrently across
//!    entities, each goal under its own timeout. Failure condition fails the
//!    goal, success condition completes it, otherwise the current step is
//!    checked: satisfied advances (or completes on the last step, or
//!    resumes a blocked goal), unsatisfied blocks.
//! 5. **Arbitrate** -- goals acting on the same exclusive target are ranked
//!    and all but the winner are blocked as contested.
//! 6. **Budget** -- each entity gets `advance_budget_per_entity` strategy
//!    advances, charged only to goals still acting after arbitration;
//!    `URGENT` goals bypass it. Deferred goals stay untouched.
//! 7. **Deadlines** -- every goal that entered the tick open and is past
//!    its deadline fails with [`DEADLINE_MISSED`]. Its evaluation is
//!    discarded before arbitration and budget, so it neither wins a target
//!    nor spends budget.
//! 8. **Commit** -- all changes in one `save_batch`.
//!
//! Errors for one goal are recorded in the report and leave that goal
//! unchanged. Only a goal store failure aborts the tick; queued overrides are
//! then restored so the retried tick sees them again.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use lifeweave_types::{
    EntityId, Goal, GoalCreatedEvent, GoalErrorRecord, GoalId, GoalPriority, GoalStatus,
    GoalStepResult, SessionId, SimulationResult, TurnContext,
};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::contention::{Contender, arbitrate};
use crate::error::{GoalError, SchedulerError};
use crate::overrides::{OverrideQueue, OverrideRequest};
use crate::store::GoalStore;
use crate::transition::{GoalTransition, apply_transition};
use crate::world::{WorldSnapshot, WorldStateQuery};

/// Outcome text for goals failed by the deadline phase.
pub const DEADLINE_MISSED: &str = "deadline missed";

/// Outcome text for goals forced out of an undecidable contention.
pub const UNRESOLVABLE_CONTENTION: &str = "unresolvable contention";

/// What evaluation decided for one goal.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Evaluation {
    Advance,
    FinishSteps,
    Resume,
    Block(String),
    Complete(String),
    Fail(String),
}

impl Evaluation {
    const fn is_step_work(&self) -> bool {
        matches!(self, Self::Advance | Self::FinishSteps)
    }

    const fn claims_target(&self) -> bool {
        matches!(self, Self::Advance | Self::FinishSteps | Self::Resume)
    }

    fn into_transition(self) -> GoalTransition {
        match self {
            Self::Advance => GoalTransition::Advance,
            Self::FinishSteps => GoalTransition::Complete {
                outcome: String::from("all strategy steps completed"),
            },
            Self::Resume => GoalTransition::Resume,
            Self::Block(reason) => GoalTransition::Block { reason },
            Self::Complete(outcome) => GoalTransition::Complete { outcome },
            Self::Fail(outcome) => GoalTransition::Fail { outcome },
        }
    }
}

/// Working state of one tick.
struct TickPass {
    ctx: TurnContext,
    originals: BTreeMap<GoalId, Goal>,
    touched: BTreeMap<GoalId, Goal>,
    errors: Vec<GoalErrorRecord>,
}

impl TickPass {
    fn new(ctx: TurnContext, open: &[Goal]) -> Self {
        Self {
            ctx,
            originals: open.iter().map(|g| (g.id, g.clone())).collect(),
            touched: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    fn current(&self, id: GoalId) -> Option<&Goal> {
        self.touched.get(&id).or_else(|| self.originals.get(&id))
    }

    fn find_by_key(&self, goal_key: &str) -> Option<&Goal> {
        self.touched
            .values()
            .chain(self.originals.values())
            .find(|g| g.goal_key == goal_key)
    }

    fn record(&mut self, goal_id: Option<GoalId>, error: GoalError) {
        debug!(
            session = %self.ctx.session_id,
            turn = self.ctx.current_turn,
            goal_id = ?goal_id.map(GoalId::get),
            error = %error,
            "goal error recorded"
        );
        self.errors.push(error.into_record(goal_id));
    }

    /// Apply `transition` to the current view of goal `id`, keeping the
    /// result only if the validator accepts it.
    fn transition(&mut self, id: GoalId, transition: GoalTransition, mark_processed: bool) {
        let Some(mut goal) = self.current(id).cloned() else {
            return;
        };
        match apply_transition(&mut goal, transition, self.ctx.current_turn) {
            Ok(_) => {
                if mark_processed {
                    goal.last_processed_turn = Some(self.ctx.current_turn);
                }
                self.touched.insert(id, goal);
            }
            Err(e) => self.record(Some(id), e),
        }
    }

    fn step_results(&self) -> Vec<GoalStepResult> {
        self.touched
            .values()
            .filter_map(|goal| {
                let before = self.originals.get(&goal.id)?;
                Some(GoalStepResult {
                    goal_id: goal.id,
                    goal_key: goal.goal_key.clone(),
                    prev_step: before.current_step,
                    new_step: goal.current_step,
                    prev_status: before.status,
                    new_status: goal.status,
                    blocked_reason: goal.blocked_reason.clone(),
                    outcome: goal.outcome.clone(),
                })
            })
            .collect()
    }
}

/// Advances goals once per turn.
#[derive(Debug)]
pub struct GoalScheduler<S, W> {
    store: Arc<S>,
    world: Arc<W>,
    config: SchedulerConfig,
    overrides: OverrideQueue,
}

impl<S: GoalStore, W: WorldStateQuery> GoalScheduler<S, W> {
    /// Create a scheduler over a goal store and a world query.
    pub fn new(store: Arc<S>, world: Arc<W>, config: SchedulerConfig) -> Self {
        Self {
            store,
            world,
            config,
            overrides: OverrideQueue::default(),
        }
    }

    /// The active configuration.
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The goal store this scheduler commits to.
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Queue an external transition for the next tick of `session_id`.
    pub async fn submit_override(&self, session_id: SessionId, request: OverrideRequest) {
        debug!(session = %session_id, request = ?request, "override queued");
        self.overrides.push(session_id, request).await;
    }

    /// Number of overrides waiting for the next tick of `session_id`.
    pub async fn pending_overrides(&self, session_id: SessionId) -> usize {
        self.overrides.len(session_id).await
    }

    /// Run one scheduling pass for `session_id` at `current_turn`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Store`] if the goal store fails. Nothing
    /// from the tick is persisted in that case and pending overrides are
    /// kept for the retry.
    pub async fn run_tick(
        &self,
        session_id: SessionId,
        current_turn: u64,
    ) -> Result<SimulationResult, SchedulerError> {
        let ctx = TurnContext::new(session_id, current_turn);
        let requests = self.overrides.drain(session_id).await;
        match self.tick(ctx, &requests).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(
                    session = %session_id,
                    turn = current_turn,
                    error = %e,
                    "tick aborted, nothing committed"
                );
                self.overrides.restore(session_id, requests).await;
                Err(e)
            }
        }
    }

    async fn tick(
        &self,
        ctx: TurnContext,
        requests: &[OverrideRequest],
    ) -> Result<SimulationResult, SchedulerError> {
        let open = self.store.get_active(ctx.session_id).await?;
        let mut result = SimulationResult::empty(ctx);
        result.goal_created = open
            .iter()
            .filter(|g| g.created_turn == ctx.current_turn)
            .map(GoalCreatedEvent::from)
            .collect();

        let mut pass = TickPass::new(ctx, &open);

        for request in requests {
            self.apply_override(&mut pass, &open, request).await?;
        }
        let overridden: BTreeSet<GoalId> = pass
            .touched
            .values()
            .filter(|g| g.status.is_terminal())
            .map(|g| g.id)
            .collect();
        let expired: BTreeSet<GoalId> = open
            .iter()
            .filter(|g| !overridden.contains(&g.id))
            .filter(|g| g.status.is_open() && g.deadline_passed(ctx.current_turn))
            .map(|g| g.id)
            .collect();

        let mut due: Vec<&Goal> = open
            .iter()
            .filter(|g| !overridden.contains(&g.id))
            .filter(|g| g.is_due(ctx.current_turn, self.config.processing_interval))
            .collect();
        due.sort_by_key(|g| Contender::from(*g).rank());

        let plans = self.plan(&mut pass, &due, &expired).await;
        for (id, evaluation) in plans {
            pass.transition(id, evaluation.into_transition(), true);
        }

        for id in &expired {
            info!(
                session = %ctx.session_id,
                turn = ctx.current_turn,
                goal_id = %id,
                deadline = ?pass.originals.get(id).and_then(|g| g.deadline),
                "deadline passed"
            );
            pass.transition(
                *id,
                GoalTransition::Fail {
                    outcome: String::from(DEADLINE_MISSED),
                },
                true,
            );
        }

        let batch: Vec<Goal> = pass.touched.values().cloned().collect();
        if !batch.is_empty() {
            self.store.save_batch(ctx.session_id, &batch).await?;
        }

        result.goal_steps = pass.step_results();
        result.errors = pass.errors;
        info!(
            session = %ctx.session_id,
            turn = ctx.current_turn,
            open = open.len(),
            due = due.len(),
            transitions = result.goal_steps.len(),
            created = result.goal_created.len(),
            errors = result.errors.len(),
            "tick committed"
        );
        Ok(result)
    }

    async fn apply_override(
        &self,
        pass: &mut TickPass,
        open: &[Goal],
        request: &OverrideRequest,
    ) -> Result<(), SchedulerError> {
        let targets: Vec<GoalId> = match request {
            OverrideRequest::AbandonOwnedBy { entity_id, .. } => {
                let owned: Vec<GoalId> = open
                    .iter()
                    .filter(|g| g.owner_entity_id == *entity_id)
                    .filter(|g| pass.current(g.id).is_some_and(|c| c.status.is_open()))
                    .map(|g| g.id)
                    .collect();
                if owned.is_empty() {
                    pass.record(
                        None,
                        GoalError::NotFound {
                            what: format!("open goals owned by {entity_id}"),
                        },
                    );
                }
                owned
            }
            OverrideRequest::Abandon { goal_key, .. }
            | OverrideRequest::Fail { goal_key, .. }
            | OverrideRequest::AnnotateOutcome { goal_key, .. } => {
                if let Some(goal) = pass.find_by_key(goal_key) {
                    vec![goal.id]
                } else if let Some(goal) =
                    self.store.get_by_key(pass.ctx.session_id, goal_key).await?
                {
                    let id = goal.id;
                    pass.originals.insert(id, goal);
                    vec![id]
                } else {
                    pass.record(
                        None,
                        GoalError::NotFound {
                            what: format!("goal `{goal_key}`"),
                        },
                    );
                    Vec::new()
                }
            }
        };

        for id in targets {
            info!(
                session = %pass.ctx.session_id,
                turn = pass.ctx.current_turn,
                goal_id = %id,
                transition = request.transition().name(),
                "applying override"
            );
            pass.transition(id, request.transition(), false);
        }
        Ok(())
    }

    /// Evaluate, arbitrate and budget the due goals. Plans for `expired`
    /// goals are dropped right after evaluation.
    async fn plan(
        &self,
        pass: &mut TickPass,
        due: &[&Goal],
        expired: &BTreeSet<GoalId>,
    ) -> BTreeMap<GoalId, Evaluation> {
        let mut plans = BTreeMap::new();
        if due.is_empty() {
            return plans;
        }

        let timeout = self.config.world_query_timeout();
        let snapshot = match tokio::time::timeout(timeout, self.world.snapshot(pass.ctx)).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                let message = e.to_string();
                warn!(
                    session = %pass.ctx.session_id,
                    turn = pass.ctx.current_turn,
                    error = %message,
                    "world snapshot unavailable"
                );
                for goal in due {
                    pass.record(
                        Some(goal.id),
                        GoalError::WorldQuery {
                            message: message.clone(),
                        },
                    );
                }
                return plans;
            }
            Err(_elapsed) => {
                for goal in due {
                    pass.record(Some(goal.id), timeout_error(timeout));
                }
                return plans;
            }
        };

        let mut evaluations = self.evaluate_all(&snapshot, due, timeout).await;
        for goal in due {
            match evaluations.remove(&goal.id) {
                Some(Ok(_)) if expired.contains(&goal.id) => {}
                Some(Ok(evaluation)) => {
                    plans.insert(goal.id, evaluation);
                }
                Some(Err(e)) => pass.record(Some(goal.id), e),
                None => {}
            }
        }

        arbitrate_targets(pass, &snapshot, due, &mut plans, timeout).await;
        self.apply_budget(pass.ctx, due, &mut plans);
        plans
    }

    /// Evaluate every due goal. Entities run concurrently up to the
    /// configured limit; one entity's goals run concurrently with each
    /// other, each under its own timeout.
    async fn evaluate_all(
        &self,
        snapshot: &W::Snapshot,
        due: &[&Goal],
        timeout: Duration,
    ) -> BTreeMap<GoalId, Result<Evaluation, GoalError>> {
        let mut by_entity: BTreeMap<EntityId, Vec<&Goal>> = BTreeMap::new();
        for goal in due {
            by_entity.entry(goal.owner_entity_id).or_default().push(*goal);
        }

        let batches: Vec<Vec<(GoalId, Result<Evaluation, GoalError>)>> =
            stream::iter(by_entity.into_values())
                .map(|goals| async move {
                    join_all(goals.into_iter().map(|goal| async move {
                        let outcome = tokio::time::timeout(timeout, evaluate(snapshot, goal))
                            .await
                            .unwrap_or_else(|_elapsed| Err(timeout_error(timeout)));
                        (goal.id, outcome)
                    }))
                    .await
                })
                .buffer_unordered(self.config.max_concurrent_entities.max(1))
                .collect()
                .await;

        batches.into_iter().flatten().collect()
    }

    fn apply_budget(
        &self,
        ctx: TurnContext,
        due: &[&Goal],
        plans: &mut BTreeMap<GoalId, Evaluation>,
    ) {
        let budget = self.config.advance_budget_per_entity;
        let mut spent: BTreeMap<EntityId, u32> = BTreeMap::new();
        for goal in due {
            if !plans.get(&goal.id).is_some_and(Evaluation::is_step_work) {
                continue;
            }
            if goal.priority == GoalPriority::Urgent && self.config.urgent_bypasses_budget {
                continue;
            }
            let used = spent.entry(goal.owner_entity_id).or_insert(0);
            if *used >= budget {
                plans.remove(&goal.id);
                debug!(
                    session = %ctx.session_id,
                    turn = ctx.current_turn,
                    goal_id = %goal.id,
                    entity = %goal.owner_entity_id,
                    "advance deferred by entity budget"
                );
            } else {
                *used = used.saturating_add(1);
            }
        }
    }
}

/// Decide what one goal should do this tick.
async fn evaluate<T: WorldSnapshot>(snapshot: &T, goal: &Goal) -> Result<Evaluation, GoalError> {
    let conditions = snapshot.check_conditions(goal).await?;
    if conditions.failure_met {
        let condition = goal.failure_condition.as_deref().unwrap_or("failure condition");
        return Ok(Evaluation::Fail(format!("failure condition met: {condition}")));
    }
    if goal.status == GoalStatus::Active && conditions.success_met {
        return Ok(Evaluation::Complete(format!(
            "success condition met: {}",
            goal.success_condition
        )));
    }

    let check = snapshot.is_step_satisfiable(goal, goal.current_step).await?;
    if !check.satisfied {
        return Ok(Evaluation::Block(
            check
                .reason
                .unwrap_or_else(|| String::from("step precondition unmet")),
        ));
    }
    Ok(match goal.status {
        GoalStatus::Blocked => Evaluation::Resume,
        _ if goal.on_last_step() => Evaluation::FinishSteps,
        _ => Evaluation::Advance,
    })
}

/// Resolve every exclusive target claimed by more than one planned action.
async fn arbitrate_targets<T: WorldSnapshot>(
    pass: &mut TickPass,
    snapshot: &T,
    due: &[&Goal],
    plans: &mut BTreeMap<GoalId, Evaluation>,
    timeout: Duration,
) {
    let mut claims: BTreeMap<&str, Vec<&Goal>> = BTreeMap::new();
    for goal in due {
        if plans.get(&goal.id).is_some_and(Evaluation::claims_target) {
            claims.entry(goal.target.as_str()).or_default().push(*goal);
        }
    }

    for (target, claimants) in claims {
        if claimants.len() < 2 {
            continue;
        }
        let owned: Vec<Goal> = claimants.iter().map(|g| (*g).clone()).collect();
        let contested = match tokio::time::timeout(
            timeout,
            snapshot.resolve_contention_candidates(target, &owned),
        )
        .await
        {
            Ok(Ok(ids)) => ids,
            Ok(Err(e)) => {
                let message = e.to_string();
                for goal in &claimants {
                    plans.remove(&goal.id);
                    pass.record(
                        Some(goal.id),
                        GoalError::WorldQuery {
                            message: message.clone(),
                        },
                    );
                }
                continue;
            }
            Err(_elapsed) => {
                for goal in &claimants {
                    plans.remove(&goal.id);
                    pass.record(Some(goal.id), timeout_error(timeout));
                }
                continue;
            }
        };

        let contenders: Vec<Contender> = claimants
            .iter()
            .filter(|g| contested.contains(&g.id))
            .map(|g| Contender::from(*g))
            .collect();
        if contenders.len() < 2 {
            continue;
        }
        let Some(outcome) = arbitrate(&contenders) else {
            continue;
        };

        info!(
            session = %pass.ctx.session_id,
            turn = pass.ctx.current_turn,
            target,
            winner = %outcome.winner,
            losers = outcome.losers.len(),
            "contention resolved"
        );
        for loser in outcome.losers {
            plans.insert(
                loser,
                Evaluation::Block(format!(
                    "target contested: `{target}` taken by goal {}",
                    outcome.winner
                )),
            );
        }
        for tied in outcome.deadlocked {
            if tied == outcome.winner {
                continue;
            }
            pass.record(
                Some(tied),
                GoalError::ContentionDeadlock {
                    target: target.to_owned(),
                },
            );
            plans.insert(tied, Evaluation::Fail(String::from(UNRESOLVABLE_CONTENTION)));
        }
    }
}

fn timeout_error(timeout: Duration) -> GoalError {
    GoalError::WorldQuery {
        message: format!(
            "timed out after {}ms",
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
        ),
    }
}
