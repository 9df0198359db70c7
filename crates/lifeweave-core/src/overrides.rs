//! Externally requested goal transitions.
//!
//! Players, game masters and the host (owner death) cannot write goal status
//! directly. They submit an [`OverrideRequest`]; the scheduler drains the
//! queue at the start of the next tick and applies each request through the
//! same transition validator it uses for its own decisions.

use std::collections::BTreeMap;

use lifeweave_types::{EntityId, SessionId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::transition::GoalTransition;

/// A transition requested from outside the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OverrideRequest {
    /// Abandon one goal.
    Abandon {
        /// The goal to abandon.
        goal_key: String,
        /// Recorded as the outcome.
        reason: String,
    },
    /// Abandon every open goal of an entity (the owner died or left).
    AbandonOwnedBy {
        /// The owner.
        entity_id: EntityId,
        /// Recorded as the outcome.
        reason: String,
    },
    /// Fail one goal.
    Fail {
        /// The goal to fail.
        goal_key: String,
        /// Recorded as the outcome.
        reason: String,
    },
    /// Replace the outcome text of a goal in any status.
    AnnotateOutcome {
        /// The goal to annotate.
        goal_key: String,
        /// The new outcome.
        outcome: String,
    },
}

impl OverrideRequest {
    /// The transition this request applies to each goal it names.
    pub fn transition(&self) -> GoalTransition {
        match self {
            Self::Abandon { reason, .. } | Self::AbandonOwnedBy { reason, .. } => {
                GoalTransition::Abandon {
                    outcome: reason.clone(),
                }
            }
            Self::Fail { reason, .. } => GoalTransition::Fail {
                outcome: reason.clone(),
            },
            Self::AnnotateOutcome { outcome, .. } => GoalTransition::Annotate {
                outcome: outcome.clone(),
            },
        }
    }
}

/// Pending overrides per session, in submission order.
#[derive(Debug, Default)]
pub(crate) struct OverrideQueue {
    pending: Mutex<BTreeMap<SessionId, Vec<OverrideRequest>>>,
}

impl OverrideQueue {
    pub(crate) async fn push(&self, session_id: SessionId, request: OverrideRequest) {
        self.pending
            .lock()
            .await
            .entry(session_id)
            .or_default()
            .push(request);
    }

    pub(crate) async fn drain(&self, session_id: SessionId) -> Vec<OverrideRequest> {
        self.pending
            .lock()
            .await
            .remove(&session_id)
            .unwrap_or_default()
    }

    /// Put drained requests back ahead of anything submitted since.
    pub(crate) async fn restore(&self, session_id: SessionId, mut requests: Vec<OverrideRequest>) {
        if requests.is_empty() {
            return;
        }
        let mut pending = self.pending.lock().await;
        let slot = pending.entry(session_id).or_default();
        requests.append(slot);
        *slot = requests;
    }

    pub(crate) async fn len(&self, session_id: SessionId) -> usize {
        self.pending
            .lock()
            .await
            .get(&session_id)
            .map_or(0, Vec::len)
    }
}
