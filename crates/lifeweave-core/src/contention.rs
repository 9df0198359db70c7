//! Deterministic arbitration over contested targets.
//!
//! When several goals want to act on the same exclusive target in one tick,
//! exactly one is granted the action. Contenders are ranked by priority
//! (highest first), then `created_turn` (earliest first), then goal id
//! (lowest first). Two contenders with identical keys can only come from a
//! corrupt store; they are reported as deadlocked so the caller can force
//! them out and keep the tick moving.

use std::cmp::Reverse;

use lifeweave_types::{Goal, GoalId, GoalPriority};

/// One goal competing for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contender {
    /// The competing goal.
    pub goal_id: GoalId,
    /// Its priority.
    pub priority: GoalPriority,
    /// Its creation turn.
    pub created_turn: u64,
}

impl Contender {
    /// Ranking key: smaller wins.
    pub const fn rank(&self) -> (Reverse<GoalPriority>, u64, GoalId) {
        (Reverse(self.priority), self.created_turn, self.goal_id)
    }
}

impl From<&Goal> for Contender {
    fn from(goal: &Goal) -> Self {
        Self {
            goal_id: goal.id,
            priority: goal.priority,
            created_turn: goal.created_turn,
        }
    }
}

/// The outcome of arbitrating one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arbitration {
    /// The contender granted the action.
    pub winner: GoalId,
    /// Contenders that lost on the ranking.
    pub losers: Vec<GoalId>,
    /// Contenders whose rank equals the winner's.
    pub deadlocked: Vec<GoalId>,
}

/// Pick the winner among `contenders`.
///
/// Returns `None` for an empty slice. Losers and deadlocked contenders are
/// listed in rank order.
pub fn arbitrate(contenders: &[Contender]) -> Option<Arbitration> {
    let mut ranked: Vec<&Contender> = contenders.iter().collect();
    ranked.sort_by_key(|c| c.rank());

    let (first, rest) = ranked.split_first()?;
    let mut losers = Vec::new();
    let mut deadlocked = Vec::new();
    for c in rest {
        if c.rank() == first.rank() {
            deadlocked.push(c.goal_id);
        } else {
            losers.push(c.goal_id);
        }
    }

    Some(Arbitration {
        winner: first.goal_id,
        losers,
        deadlocked,
    })
}
