//! Enumeration types for the Lifeweave simulation.
//!
//! Every enum here is closed. String forms (`as_str` / `parse`) are the
//! canonical storage representation used by the persistence layer.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Needs
// ---------------------------------------------------------------------------

/// Tier of a need, from most to least urgent.
///
/// Tier 1 needs decay on an hourly scale, tier 3 on a daily scale. The
/// exact periods are configuration, not part of the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedTier {
    /// Physiological survival needs (hunger, thirst, rest).
    Survival,
    /// Safety and belonging needs (shelter, companionship).
    Security,
    /// Psychological needs (purpose, recognition, intimacy).
    Psychological,
}

impl NeedTier {
    /// The tier number (1, 2 or 3).
    pub const fn number(self) -> u8 {
        match self {
            Self::Survival => 1,
            Self::Security => 2,
            Self::Psychological => 3,
        }
    }

    /// Parse a tier from its number.
    pub const fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Survival),
            2 => Some(Self::Security),
            3 => Some(Self::Psychological),
            _ => None,
        }
    }
}

/// Direction in which a need drifts over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NeedPolarity {
    /// Value falls toward 0 as time passes; crisis when below the threshold.
    #[default]
    Depleting,
    /// Value rises toward 100 as time passes; crisis when above the threshold.
    Accumulating,
}

impl NeedPolarity {
    /// Canonical storage string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Depleting => "depleting",
            Self::Accumulating => "accumulating",
        }
    }

    /// Parse from the canonical storage string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "depleting" => Some(Self::Depleting),
            "accumulating" => Some(Self::Accumulating),
            _ => None,
        }
    }
}

/// How serious a crisis or world event is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Barely noticeable.
    Minor,
    /// Worth acting on.
    Moderate,
    /// Pressing.
    Severe,
    /// Life-changing or life-threatening.
    Critical,
}

impl Severity {
    /// The goal priority a trigger of this severity maps to when its
    /// priority is severity-driven.
    pub const fn priority(self) -> GoalPriority {
        match self {
            Self::Minor => GoalPriority::Low,
            Self::Moderate => GoalPriority::Medium,
            Self::Severe => GoalPriority::High,
            Self::Critical => GoalPriority::Urgent,
        }
    }
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

/// Lifecycle status of a goal.
///
/// `Completed`, `Failed` and `Abandoned` are terminal: once a goal reaches
/// one of them, only its `outcome` may still be annotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalStatus {
    /// Being pursued; the current step is attempted on eligible ticks.
    Active,
    /// Waiting on an unmet precondition or a contested target.
    Blocked,
    /// All steps done or the success condition held.
    Completed,
    /// Failure condition held or the deadline passed.
    Failed,
    /// Dropped by an external decision (owner death, override).
    Abandoned,
}

impl GoalStatus {
    /// Whether no further status or step change is allowed.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }

    /// Whether the goal is still in flight (`Active` or `Blocked`).
    pub const fn is_open(self) -> bool {
        !self.is_terminal()
    }

    /// Canonical storage string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Blocked => "BLOCKED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Abandoned => "ABANDONED",
        }
    }

    /// Parse from the canonical storage string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "BLOCKED" => Some(Self::Blocked),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "ABANDONED" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

impl core::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling priority of a goal. Variant order is ascending urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalPriority {
    /// Background ambition.
    Low,
    /// Default for psychological needs and world events.
    Medium,
    /// Security needs and pressing events.
    High,
    /// Survival; bypasses the per-entity work budget.
    Urgent,
}

impl GoalPriority {
    /// Canonical storage string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }

    /// Parse from the canonical storage string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "URGENT" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Category of a goal. Together with the target it identifies duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalType {
    /// Resolve a tier-1 need (find food, water, rest).
    Survival,
    /// Resolve a tier-2 need (shelter, safety, belonging).
    Security,
    /// Resolve a tier-3 need (purpose, recognition, intimacy).
    Fulfillment,
    /// Obtain a specific item or resource.
    Acquire,
    /// Face an adversary.
    Confront,
    /// Build or repair a relationship.
    Relationship,
    /// Visit or discover a place.
    Explore,
    /// Defend a person, place or thing.
    Protect,
}

impl GoalType {
    /// The goal type that resolves a need of the given tier.
    pub const fn for_need_tier(tier: NeedTier) -> Self {
        match tier {
            NeedTier::Survival => Self::Survival,
            NeedTier::Security => Self::Security,
            NeedTier::Psychological => Self::Fulfillment,
        }
    }

    /// Canonical storage string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Survival => "SURVIVAL",
            Self::Security => "SECURITY",
            Self::Fulfillment => "FULFILLMENT",
            Self::Acquire => "ACQUIRE",
            Self::Confront => "CONFRONT",
            Self::Relationship => "RELATIONSHIP",
            Self::Explore => "EXPLORE",
            Self::Protect => "PROTECT",
        }
    }

    /// Parse from the canonical storage string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SURVIVAL" => Some(Self::Survival),
            "SECURITY" => Some(Self::Security),
            "FULFILLMENT" => Some(Self::Fulfillment),
            "ACQUIRE" => Some(Self::Acquire),
            "CONFRONT" => Some(Self::Confront),
            "RELATIONSHIP" => Some(Self::Relationship),
            "EXPLORE" => Some(Self::Explore),
            "PROTECT" => Some(Self::Protect),
            _ => None,
        }
    }
}

impl core::fmt::Display for GoalType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
