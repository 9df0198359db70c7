//! Error types for the lifeweave-core crate.
//!
//! Per-goal failures are [`GoalError`] values. The scheduler folds them into
//! [`GoalErrorRecord`] entries of the tick report instead of aborting;
//! only a [`StoreError`] on the tick's own reads or commit escapes as a
//! [`SchedulerError`].

use lifeweave_types::{GoalErrorKind, GoalErrorRecord, GoalId, GoalStatus};

/// Failures of a [`GoalStore`](crate::GoalStore) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the operation.
    #[error("goal store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// A record could not be encoded or decoded.
    #[error("goal record corrupt: {message}")]
    Corrupt {
        /// Description of the failure.
        message: String,
    },

    /// A batch contained a goal belonging to another session.
    #[error("goal {goal_id} does not belong to the batch session")]
    SessionMismatch {
        /// The offending goal.
        goal_id: GoalId,
    },
}

/// Failures of a [`StrategyOracle`](crate::StrategyOracle).
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The oracle did not answer within the allotted time.
    #[error("strategy synthesis timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The oracle failed to produce a plan.
    #[error("strategy synthesis failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },

    /// The oracle produced a plan that cannot become a goal.
    #[error("strategy plan rejected: {reason}")]
    InvalidPlan {
        /// Why the plan was rejected.
        reason: String,
    },
}

/// Failures of a [`WorldStateQuery`](crate::WorldStateQuery) or its snapshot.
#[derive(Debug, thiserror::Error)]
pub enum WorldQueryError {
    /// The query did not answer within the allotted time.
    #[error("world query timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The query failed.
    #[error("world query failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

/// A failure scoped to one goal or one trigger.
#[derive(Debug, thiserror::Error)]
pub enum GoalError {
    /// An illegal status transition was attempted.
    #[error("invalid transition `{transition}` for goal {goal_id} in status {status}")]
    Validation {
        /// The goal the transition targeted.
        goal_id: GoalId,
        /// Its status at the time.
        status: GoalStatus,
        /// The rejected transition.
        transition: &'static str,
    },

    /// A referenced goal or entity does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// Strategy synthesis timed out; the trigger is dropped.
    #[error("strategy oracle timed out after {timeout_ms}ms")]
    OracleTimeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// Strategy synthesis failed; the trigger is dropped.
    #[error("strategy oracle failed: {message}")]
    Oracle {
        /// Description of the failure.
        message: String,
    },

    /// Contention could not be decided by the tie-break.
    #[error("unresolvable contention on target `{target}`")]
    ContentionDeadlock {
        /// The contested target.
        target: String,
    },

    /// The world state query for this goal failed or timed out.
    #[error("world query failed: {message}")]
    WorldQuery {
        /// Description of the failure.
        message: String,
    },

    /// A store call made on behalf of this goal failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },
}

impl GoalError {
    /// The report classification of this error.
    pub const fn kind(&self) -> GoalErrorKind {
        match self {
            Self::Validation { .. } => GoalErrorKind::Validation,
            Self::NotFound { .. } => GoalErrorKind::NotFound,
            Self::OracleTimeout { .. } => GoalErrorKind::OracleTimeout,
            Self::Oracle { .. } => GoalErrorKind::Oracle,
            Self::ContentionDeadlock { .. } => GoalErrorKind::ContentionDeadlock,
            Self::WorldQuery { .. } => GoalErrorKind::WorldQuery,
            Self::Store { .. } => GoalErrorKind::Store,
        }
    }

    /// Convert into a report entry.
    pub fn into_record(self, goal_id: Option<GoalId>) -> GoalErrorRecord {
        GoalErrorRecord {
            goal_id,
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<OracleError> for GoalError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Timeout { timeout_ms } => Self::OracleTimeout { timeout_ms },
            other @ (OracleError::Failed { .. } | OracleError::InvalidPlan { .. }) => {
                Self::Oracle {
                    message: other.to_string(),
                }
            }
        }
    }
}

impl From<WorldQueryError> for GoalError {
    fn from(err: WorldQueryError) -> Self {
        Self::WorldQuery {
            message: err.to_string(),
        }
    }
}

/// Errors that abort a whole scheduler tick.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The goal store failed on a read or on the commit. Nothing from the
    /// tick was persisted; the tick should be retried on the next turn.
    #[error("goal store outage: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },
}

/// Errors that abort a whole turn of the [`TurnDriver`](crate::TurnDriver).
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The needs store could not list the session's entities.
    #[error("needs store error: {source}")]
    Needs {
        /// The underlying needs error.
        #[from]
        source: lifeweave_needs::NeedsError,
    },

    /// The scheduler tick failed.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: SchedulerError,
    },
}
