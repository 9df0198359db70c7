//! Core record structs: needs, goals, strategy plans and the turn context.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::{GoalPriority, GoalStatus, GoalType, NeedPolarity, NeedTier, Severity};
use crate::ids::{EntityId, GoalId, SessionId};
use crate::triggers::Trigger;

/// Upper bound of every need value.
pub const NEED_MAX: u8 = 100;

// ---------------------------------------------------------------------------
// Turn context
// ---------------------------------------------------------------------------

/// Explicit session/turn context threaded through every scheduling call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnContext {
    /// The session being advanced.
    pub session_id: SessionId,
    /// The turn number being processed.
    pub current_turn: u64,
}

impl TurnContext {
    /// Build a context for the given session and turn.
    pub const fn new(session_id: SessionId, current_turn: u64) -> Self {
        Self {
            session_id,
            current_turn,
        }
    }

    /// The context for the following turn, or `None` on overflow.
    pub fn next(self) -> Option<Self> {
        self.current_turn
            .checked_add(1)
            .map(|turn| Self::new(self.session_id, turn))
    }
}

// ---------------------------------------------------------------------------
// Needs
// ---------------------------------------------------------------------------

/// A single decaying need held by an entity.
///
/// `value` is always within `0..=100`. `crisis_flagged` marks that a crisis
/// has already been emitted for the current episode; it is cleared by
/// satisfying the need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Need {
    /// Catalog key (e.g. `"hunger"`).
    pub key: String,
    /// Tier, which selects the decay time scale.
    pub tier: NeedTier,
    /// Current value in `0..=100`.
    pub value: u8,
    /// Points drifted per tier period at a neutral modifier.
    pub decay_rate: u32,
    /// Which way the value drifts.
    pub polarity: NeedPolarity,
    /// Crisis band boundary. Depleting needs are in crisis strictly below it,
    /// accumulating needs strictly above it.
    pub crisis_threshold: u8,
    /// Whether a crisis was already emitted for the current episode.
    pub crisis_flagged: bool,
    /// Sub-point decay carried between calls, in `decay_rate * modifier`
    /// units scaled by minutes.
    pub decay_remainder: u64,
    /// Turn the need was last satisfied, if ever.
    pub last_satisfied_turn: Option<u64>,
}

impl Need {
    /// Whether the current value lies inside the crisis band.
    pub fn in_crisis(&self) -> bool {
        match self.polarity {
            NeedPolarity::Depleting => self.value < self.crisis_threshold,
            NeedPolarity::Accumulating => self.value > self.crisis_threshold,
        }
    }

    /// How deep into the crisis band the value sits, as a severity.
    ///
    /// Returns `None` when the need is not in crisis.
    pub fn crisis_severity(&self) -> Option<Severity> {
        if !self.in_crisis() {
            return None;
        }
        let (depth, width) = match self.polarity {
            NeedPolarity::Depleting => (
                self.crisis_threshold.saturating_sub(self.value),
                self.crisis_threshold,
            ),
            NeedPolarity::Accumulating => (
                self.value.saturating_sub(self.crisis_threshold),
                NEED_MAX.saturating_sub(self.crisis_threshold),
            ),
        };
        if width == 0 {
            return Some(Severity::Critical);
        }
        let pct = u32::from(depth)
            .saturating_mul(100)
            .checked_div(u32::from(width))
            .unwrap_or(100);
        Some(match pct {
            0..=24 => Severity::Minor,
            25..=49 => Severity::Moderate,
            50..=74 => Severity::Severe,
            _ => Severity::Critical,
        })
    }
}

/// All needs of one entity plus its decay modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityNeeds {
    /// Owning entity.
    pub entity_id: EntityId,
    /// Needs keyed by catalog key.
    pub needs: BTreeMap<String, Need>,
    /// Per-need decay scaling in percent (100 = neutral). Missing keys are
    /// treated as neutral.
    #[serde(default)]
    pub decay_modifiers: BTreeMap<String, u32>,
}

impl EntityNeeds {
    /// An entity with no needs and no modifiers.
    pub const fn empty(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            needs: BTreeMap::new(),
            decay_modifiers: BTreeMap::new(),
        }
    }

    /// Look up a need by key.
    pub fn get(&self, key: &str) -> Option<&Need> {
        self.needs.get(key)
    }

    /// The decay modifier for `key` in percent.
    pub fn modifier_pct(&self, key: &str) -> u32 {
        self.decay_modifiers.get(key).copied().unwrap_or(100)
    }
}

/// Ephemeral signal that a need entered its crisis band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedCrisis {
    /// Entity in crisis.
    pub entity_id: EntityId,
    /// Need that crossed into its crisis band.
    pub need_key: String,
    /// Tier of that need.
    pub tier: NeedTier,
    /// Depth into the crisis band.
    pub severity: Severity,
    /// Need value at the moment of crossing.
    pub value: u8,
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

/// Text produced by a strategy oracle for a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPlan {
    /// One-line description of the goal.
    pub description: String,
    /// Reasons the owner has for pursuing it.
    #[serde(default)]
    pub motivation: Vec<String>,
    /// Ordered strategy steps.
    pub strategies: Vec<String>,
    /// Condition under which the goal is achieved.
    pub success_condition: String,
    /// Condition under which the goal fails.
    #[serde(default)]
    pub failure_condition: Option<String>,
}

/// A persistent multi-step objective owned by one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    /// Store-allocated identifier.
    pub id: GoalId,
    /// Owning session.
    pub session_id: SessionId,
    /// Key unique within the session.
    pub goal_key: String,
    /// Entity pursuing the goal.
    pub owner_entity_id: EntityId,
    /// Category.
    pub goal_type: GoalType,
    /// What the goal is about (a need key, item, place or person).
    pub target: String,
    /// One-line description.
    pub description: String,
    /// Reasons for pursuing the goal.
    pub motivation: Vec<String>,
    /// What caused the goal to be created.
    pub triggered_by: Trigger,
    /// Scheduling priority.
    pub priority: GoalPriority,
    /// Last turn on which the goal may still be pursued.
    pub deadline: Option<u64>,
    /// Ordered strategy steps.
    pub strategies: Vec<String>,
    /// Index of the step currently being attempted.
    pub current_step: u32,
    /// Lifecycle status.
    pub status: GoalStatus,
    /// Why the goal is blocked, when `status` is `Blocked`.
    pub blocked_reason: Option<String>,
    /// Condition under which the goal is achieved.
    pub success_condition: String,
    /// Condition under which the goal fails.
    pub failure_condition: Option<String>,
    /// Free-text result, may be annotated after a terminal transition.
    pub outcome: Option<String>,
    /// Turn the goal was created.
    pub created_turn: u64,
    /// Turn the goal reached a terminal status.
    pub completed_turn: Option<u64>,
    /// Last turn the scheduler evaluated the goal.
    pub last_processed_turn: Option<u64>,
}

impl Goal {
    /// Number of addressable steps: `max(1, strategies.len())`.
    pub fn step_count(&self) -> u32 {
        u32::try_from(self.strategies.len()).unwrap_or(u32::MAX).max(1)
    }

    /// Whether `current_step` lies within `0..step_count()`.
    pub fn step_in_bounds(&self) -> bool {
        self.current_step < self.step_count()
    }

    /// Whether the current step is the final one.
    pub fn on_last_step(&self) -> bool {
        self.current_step.saturating_add(1) >= self.step_count()
    }

    /// Text of the current step, if the goal has any strategies.
    pub fn current_strategy(&self) -> Option<&str> {
        usize::try_from(self.current_step)
            .ok()
            .and_then(|i| self.strategies.get(i))
            .map(String::as_str)
    }

    /// Whether the scheduler should evaluate this goal on `current_turn`.
    pub fn is_due(&self, current_turn: u64, processing_interval: u64) -> bool {
        self.status.is_open()
            && self.last_processed_turn.is_none_or(|last| {
                current_turn.saturating_sub(last) >= processing_interval
            })
    }

    /// Whether the deadline lies strictly before `current_turn`.
    pub fn deadline_passed(&self, current_turn: u64) -> bool {
        self.deadline.is_some_and(|d| d < current_turn)
    }

    /// Compact view used in oracle context and logs.
    pub fn summary(&self) -> GoalSummary {
        GoalSummary {
            id: self.id,
            goal_key: self.goal_key.clone(),
            goal_type: self.goal_type,
            target: self.target.clone(),
            priority: self.priority,
            status: self.status,
            current_step: self.current_step,
        }
    }
}

/// Compact view of a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalSummary {
    /// Goal id.
    pub id: GoalId,
    /// Session-unique key.
    pub goal_key: String,
    /// Category.
    pub goal_type: GoalType,
    /// Target.
    pub target: String,
    /// Priority.
    pub priority: GoalPriority,
    /// Status.
    pub status: GoalStatus,
    /// Current step index.
    pub current_step: u32,
}
