//! One full turn for one session.
//!
//! [`TurnDriver::run_turn`] advances every entity's needs, turns the
//! resulting crises (plus any queued world or personality triggers) into
//! goals, then runs the scheduler tick. Entities are processed concurrently;
//! one entity's triggers are handled in order so deduplication sees the
//! goals created moments before.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use lifeweave_needs::{NeedsStore, NeedsTracker};
use lifeweave_types::{
    EntityId, GoalErrorKind, GoalId, NeedCrisis, SessionId, SimulationResult, Trigger, TurnContext,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::DriverError;
use crate::factory::GoalFactory;
use crate::oracle::StrategyOracle;
use crate::scheduler::GoalScheduler;
use crate::store::GoalStore;
use crate::world::WorldStateQuery;

/// A trigger that produced no goal because creation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedTrigger {
    /// The entity the trigger concerned.
    pub entity_id: EntityId,
    /// The dropped trigger.
    pub trigger: Trigger,
    /// Error class.
    pub kind: GoalErrorKind,
    /// Error message.
    pub reason: String,
}

/// Everything that happened in one turn of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReport {
    /// Crises emitted by need decay, by entity then need key.
    pub crises: Vec<NeedCrisis>,
    /// Goals created this turn, in creation order per entity.
    pub goals_created: Vec<GoalId>,
    /// Triggers dropped because the oracle or store failed.
    pub dropped_triggers: Vec<DroppedTrigger>,
    /// Entities whose needs could not be loaded, advanced or saved.
    pub entity_errors: Vec<(EntityId, String)>,
    /// The scheduler tick report.
    pub result: SimulationResult,
}

#[derive(Debug, Default)]
struct EntityTurn {
    crises: Vec<NeedCrisis>,
    goals_created: Vec<GoalId>,
    dropped: Vec<DroppedTrigger>,
    error: Option<String>,
}

/// Drives turns for one session.
#[derive(Debug)]
pub struct TurnDriver<S, W, O, N> {
    session_id: SessionId,
    scheduler: Arc<GoalScheduler<S, W>>,
    factory: GoalFactory<S, O>,
    tracker: NeedsTracker,
    needs_store: Arc<N>,
    max_concurrent_entities: usize,
    pending: Mutex<BTreeMap<EntityId, Vec<Trigger>>>,
}

impl<S, W, O, N> TurnDriver<S, W, O, N>
where
    S: GoalStore,
    W: WorldStateQuery,
    O: StrategyOracle,
    N: NeedsStore,
{
    /// Create a driver for `session_id`.
    pub fn new(
        session_id: SessionId,
        scheduler: Arc<GoalScheduler<S, W>>,
        factory: GoalFactory<S, O>,
        tracker: NeedsTracker,
        needs_store: Arc<N>,
    ) -> Self {
        let max_concurrent_entities = scheduler.config().max_concurrent_entities.max(1);
        Self {
            session_id,
            scheduler,
            factory,
            tracker,
            needs_store,
            max_concurrent_entities,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    /// The session this driver advances.
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The scheduler, for submitting overrides.
    pub const fn scheduler(&self) -> &Arc<GoalScheduler<S, W>> {
        &self.scheduler
    }

    /// Queue a world or personality trigger for `entity_id` on the next turn.
    pub async fn queue_trigger(&self, entity_id: EntityId, trigger: Trigger) {
        self.pending
            .lock()
            .await
            .entry(entity_id)
            .or_default()
            .push(trigger);
    }

    /// Run one turn at `current_turn` after `elapsed_minutes` of simulated time.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Needs`] if the session's entities cannot be
    /// listed, or [`DriverError::Scheduler`] if the tick fails. Per-entity
    /// and per-trigger failures are reported in the [`TurnReport`].
    pub async fn run_turn(
        &self,
        current_turn: u64,
        elapsed_minutes: u64,
    ) -> Result<TurnReport, DriverError> {
        let ctx = TurnContext::new(self.session_id, current_turn);
        let mut queued = std::mem::take(&mut *self.pending.lock().await);

        let mut entities: Vec<EntityId> = self.needs_store.list_entities(self.session_id).await?;
        entities.extend(queued.keys().copied());
        entities.sort();
        entities.dedup();

        let work: Vec<(EntityId, Vec<Trigger>)> = entities
            .into_iter()
            .map(|e| (e, queued.remove(&e).unwrap_or_default()))
            .collect();

        let turns: BTreeMap<EntityId, EntityTurn> = stream::iter(work)
            .map(|(entity_id, triggers)| async move {
                (entity_id, self.entity_turn(ctx, entity_id, triggers, elapsed_minutes).await)
            })
            .buffer_unordered(self.max_concurrent_entities)
            .collect()
            .await;

        let mut crises = Vec::new();
        let mut goals_created = Vec::new();
        let mut dropped_triggers = Vec::new();
        let mut entity_errors = Vec::new();
        for (entity_id, turn) in turns {
            crises.extend(turn.crises);
            goals_created.extend(turn.goals_created);
            dropped_triggers.extend(turn.dropped);
            if let Some(error) = turn.error {
                entity_errors.push((entity_id, error));
            }
        }

        let result = self.scheduler.run_tick(self.session_id, current_turn).await?;
        info!(
            session = %self.session_id,
            turn = current_turn,
            crises = crises.len(),
            goals_created = goals_created.len(),
            dropped = dropped_triggers.len(),
            "turn complete"
        );
        Ok(TurnReport {
            crises,
            goals_created,
            dropped_triggers,
            entity_errors,
            result,
        })
    }

    async fn entity_turn(
        &self,
        ctx: TurnContext,
        entity_id: EntityId,
        queued: Vec<Trigger>,
        elapsed_minutes: u64,
    ) -> EntityTurn {
        let mut turn = EntityTurn::default();

        let needs = match self.needs_store.load(self.session_id, entity_id).await {
            Ok(Some(mut needs)) => match self.tracker.advance(&mut needs, elapsed_minutes) {
                Ok(crises) => match self.needs_store.save(self.session_id, &needs).await {
                    Ok(()) => {
                        turn.crises = crises;
                        Some(needs)
                    }
                    Err(e) => {
                        turn.error = Some(e.to_string());
                        None
                    }
                },
                Err(e) => {
                    turn.error = Some(e.to_string());
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                turn.error = Some(e.to_string());
                None
            }
        };
        if let Some(error) = &turn.error {
            warn!(
                session = %self.session_id,
                entity = %entity_id,
                error = %error,
                "needs not advanced"
            );
        }

        let triggers: Vec<Trigger> = turn
            .crises
            .iter()
            .map(Trigger::from)
            .chain(queued)
            .collect();

        for trigger in triggers {
            match self
                .factory
                .create_from_trigger(ctx, entity_id, &trigger, needs.as_ref())
                .await
            {
                Ok(Some(goal)) => turn.goals_created.push(goal.id),
                Ok(None) => {}
                Err(e) => turn.dropped.push(DroppedTrigger {
                    entity_id,
                    kind: e.kind(),
                    reason: e.to_string(),
                    trigger,
                }),
            }
        }
        turn
    }
}
