//! The closed goal state machine.
//!
//! Every status or step change to a goal, whether decided by the scheduler
//! or requested from outside through an override, goes through
//! [`apply_transition`]. Edges:
//!
//! | From            | Transition | To                                   |
//! |-----------------|------------|--------------------------------------|
//! | ACTIVE          | `Advance`  | ACTIVE, `current_step + 1`           |
//! | ACTIVE          | `Complete` | COMPLETED                            |
//! | ACTIVE, BLOCKED | `Block`    | BLOCKED (`blocked_reason` set)       |
//! | BLOCKED         | `Resume`   | ACTIVE (`blocked_reason` cleared)    |
//! | ACTIVE, BLOCKED | `Fail`     | FAILED                               |
//! | ACTIVE, BLOCKED | `Abandon`  | ABANDONED                            |
//! | any             | `Annotate` | unchanged, `outcome` replaced        |
//!
//! `Block` on an already blocked goal only refreshes the reason.

use lifeweave_types::{Goal, GoalStatus, GoalStepResult};

use crate::error::GoalError;

/// A requested change to a goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalTransition {
    /// The current step succeeded and another step remains.
    Advance,
    /// The goal is achieved.
    Complete {
        /// Recorded as the goal outcome.
        outcome: String,
    },
    /// The current step cannot be attempted.
    Block {
        /// Why.
        reason: String,
    },
    /// The blocking precondition holds again.
    Resume,
    /// The goal failed.
    Fail {
        /// Recorded as the goal outcome.
        outcome: String,
    },
    /// The goal was dropped by an external decision.
    Abandon {
        /// Recorded as the goal outcome.
        outcome: String,
    },
    /// Replace the outcome text without touching status or step.
    Annotate {
        /// The new outcome.
        outcome: String,
    },
}

impl GoalTransition {
    /// Short name for logs and error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Complete { .. } => "complete",
            Self::Block { .. } => "block",
            Self::Resume => "resume",
            Self::Fail { .. } => "fail",
            Self::Abandon { .. } => "abandon",
            Self::Annotate { .. } => "annotate",
        }
    }

    fn allowed_from(&self, status: GoalStatus) -> bool {
        match self {
            Self::Advance | Self::Complete { .. } => status == GoalStatus::Active,
            Self::Resume => status == GoalStatus::Blocked,
            Self::Block { .. } | Self::Fail { .. } | Self::Abandon { .. } => status.is_open(),
            Self::Annotate { .. } => true,
        }
    }
}

/// Apply `transition` to `goal` as of `turn`.
///
/// On success the goal is mutated and the before/after view is returned. On
/// failure the goal is left untouched.
///
/// # Errors
///
/// Returns [`GoalError::Validation`] if the edge does not exist from the
/// goal's current status, or if `Advance` would move past the last step.
pub fn apply_transition(
    goal: &mut Goal,
    transition: GoalTransition,
    turn: u64,
) -> Result<GoalStepResult, GoalError> {
    let (goal_id, status, name) = (goal.id, goal.status, transition.name());
    let rejected = move || GoalError::Validation {
        goal_id,
        status,
        transition: name,
    };

    if !transition.allowed_from(goal.status) {
        return Err(rejected());
    }

    let prev_step = goal.current_step;
    let prev_status = goal.status;

    match transition {
        GoalTransition::Advance => {
            if goal.on_last_step() {
                return Err(rejected());
            }
            let next = goal.current_step.checked_add(1).ok_or_else(rejected)?;
            goal.current_step = next;
        }
        GoalTransition::Complete { outcome } => {
            goal.status = GoalStatus::Completed;
            goal.blocked_reason = None;
            goal.outcome = Some(outcome);
            goal.completed_turn = Some(turn);
        }
        GoalTransition::Block { reason } => {
            goal.status = GoalStatus::Blocked;
            goal.blocked_reason = Some(reason);
        }
        GoalTransition::Resume => {
            goal.status = GoalStatus::Active;
            goal.blocked_reason = None;
        }
        GoalTransition::Fail { outcome } => {
            goal.status = GoalStatus::Failed;
            goal.blocked_reason = None;
            goal.outcome = Some(outcome);
            goal.completed_turn = Some(turn);
        }
        GoalTransition::Abandon { outcome } => {
            goal.status = GoalStatus::Abandoned;
            goal.blocked_reason = None;
            goal.outcome = Some(outcome);
            goal.completed_turn = Some(turn);
        }
        GoalTransition::Annotate { outcome } => {
            goal.outcome = Some(outcome);
        }
    }

    Ok(GoalStepResult {
        goal_id: goal.id,
        goal_key: goal.goal_key.clone(),
        prev_step,
        new_step: goal.current_step,
        prev_status,
        new_status: goal.status,
        blocked_reason: goal.blocked_reason.clone(),
        outcome: goal.outcome.clone(),
    })
}
