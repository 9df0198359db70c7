//! Per-tick audit output of the goal scheduler.
//!
//! A [`SimulationResult`] is built once per `run_tick` and never mutated
//! afterwards. It is identical across repeated runs over identical inputs.

use serde::{Deserialize, Serialize};

use crate::enums::{GoalPriority, GoalStatus, GoalType};
use crate::ids::{EntityId, GoalId, SessionId};
use crate::structs::{Goal, TurnContext};

/// A goal first observed on the reported turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalCreatedEvent {
    /// Goal id.
    pub goal_id: GoalId,
    /// Session-unique key.
    pub goal_key: String,
    /// Owner.
    pub owner_entity_id: EntityId,
    /// Category.
    pub goal_type: GoalType,
    /// Target.
    pub target: String,
    /// Priority at creation.
    pub priority: GoalPriority,
    /// Turn of creation.
    pub created_turn: u64,
}

impl From<&Goal> for GoalCreatedEvent {
    fn from(goal: &Goal) -> Self {
        Self {
            goal_id: goal.id,
            goal_key: goal.goal_key.clone(),
            owner_entity_id: goal.owner_entity_id,
            goal_type: goal.goal_type,
            target: goal.target.clone(),
            priority: goal.priority,
            created_turn: goal.created_turn,
        }
    }
}

/// One committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalStepResult {
    /// Goal id.
    pub goal_id: GoalId,
    /// Session-unique key.
    pub goal_key: String,
    /// Step before the transition.
    pub prev_step: u32,
    /// Step after the transition.
    pub new_step: u32,
    /// Status before the transition.
    pub prev_status: GoalStatus,
    /// Status after the transition.
    pub new_status: GoalStatus,
    /// Blocked reason after the transition.
    pub blocked_reason: Option<String>,
    /// Outcome after the transition.
    pub outcome: Option<String>,
}

/// Error classes recorded per goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalErrorKind {
    /// Illegal status transition attempted.
    Validation,
    /// Referenced goal or entity missing.
    NotFound,
    /// Strategy synthesis timed out.
    OracleTimeout,
    /// Strategy synthesis failed.
    Oracle,
    /// Contention could not be decided by the tie-break.
    ContentionDeadlock,
    /// The world state query failed or timed out.
    WorldQuery,
    /// A store read for this goal failed.
    Store,
}

/// A per-goal error captured instead of aborting the tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalErrorRecord {
    /// Affected goal, when one could be resolved.
    pub goal_id: Option<GoalId>,
    /// Error class.
    pub kind: GoalErrorKind,
    /// Human-readable message.
    pub message: String,
}

/// The audit record of one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Session the tick ran for.
    pub session_id: SessionId,
    /// Turn the tick ran for.
    pub turn: u64,
    /// Goals first seen on this turn, ordered by id.
    pub goal_created: Vec<GoalCreatedEvent>,
    /// Committed transitions, ordered by goal id.
    pub goal_steps: Vec<GoalStepResult>,
    /// Per-goal errors, in the order they were observed.
    pub errors: Vec<GoalErrorRecord>,
}

impl SimulationResult {
    /// An empty result for the given context.
    pub const fn empty(ctx: TurnContext) -> Self {
        Self {
            session_id: ctx.session_id,
            turn: ctx.current_turn,
            goal_created: Vec::new(),
            goal_steps: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Whether the tick recorded no errors.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// The transition recorded for `goal_id`, if any.
    pub fn step_for(&self, goal_id: GoalId) -> Option<&GoalStepResult> {
        self.goal_steps.iter().find(|s| s.goal_id == goal_id)
    }
}
