//! The closed trigger union that feeds goal creation.
//!
//! A trigger names what happened; the goal factory decides what goal (if
//! any) results from it. Serialized with an explicit `kind` discriminant.

use serde::{Deserialize, Serialize};

use crate::enums::{GoalType, NeedTier, Severity};
use crate::structs::NeedCrisis;

/// A need crossed into its crisis band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedCrisisTrigger {
    /// The need in crisis. Also the goal target.
    pub need_key: String,
    /// Tier of the need.
    pub tier: NeedTier,
    /// Depth into the crisis band.
    pub severity: Severity,
    /// Value at the moment of crossing.
    pub value: u8,
}

impl From<&NeedCrisis> for NeedCrisisTrigger {
    fn from(crisis: &NeedCrisis) -> Self {
        Self {
            need_key: crisis.need_key.clone(),
            tier: crisis.tier,
            severity: crisis.severity,
            value: crisis.value,
        }
    }
}

/// Something happened in the world that an entity reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldEventTrigger {
    /// Short description of the event.
    pub event: String,
    /// Kind of goal the event calls for.
    pub goal_type: GoalType,
    /// What the resulting goal is about.
    pub target: String,
    /// Optional severity, which overrides the default priority.
    #[serde(default)]
    pub severity: Option<Severity>,
    /// Turns until the goal expires, overriding the configured default.
    #[serde(default)]
    pub deadline_turns: Option<u64>,
}

/// A personality trait pushes an entity toward an ambition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityTrigger {
    /// The driving trait (e.g. `"ambition"`).
    pub trait_name: String,
    /// Kind of goal the trait calls for.
    pub goal_type: GoalType,
    /// What the resulting goal is about.
    pub target: String,
    /// Optional strength, which overrides the default priority.
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// What caused a goal to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// A need crisis.
    NeedCrisis(NeedCrisisTrigger),
    /// A world event.
    WorldEvent(WorldEventTrigger),
    /// A personality-driven ambition.
    Personality(PersonalityTrigger),
}

impl Trigger {
    /// The goal category this trigger produces.
    pub const fn goal_type(&self) -> GoalType {
        match self {
            Self::NeedCrisis(t) => GoalType::for_need_tier(t.tier),
            Self::WorldEvent(t) => t.goal_type,
            Self::Personality(t) => t.goal_type,
        }
    }

    /// The target the resulting goal is about.
    pub fn target(&self) -> &str {
        match self {
            Self::NeedCrisis(t) => &t.need_key,
            Self::WorldEvent(t) => &t.target,
            Self::Personality(t) => &t.target,
        }
    }

    /// Severity, when the trigger carries one.
    pub const fn severity(&self) -> Option<Severity> {
        match self {
            Self::NeedCrisis(t) => Some(t.severity),
            Self::WorldEvent(t) => t.severity,
            Self::Personality(t) => t.severity,
        }
    }

    /// The discriminant as a static string, for logs and storage.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NeedCrisis(_) => "need_crisis",
            Self::WorldEvent(_) => "world_event",
            Self::Personality(_) => "personality",
        }
    }
}

impl From<&NeedCrisis> for Trigger {
    fn from(crisis: &NeedCrisis) -> Self {
        Self::NeedCrisis(NeedCrisisTrigger::from(crisis))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn need_crisis_maps_tier_to_goal_type() {
        let trigger = Trigger::NeedCrisis(NeedCrisisTrigger {
            need_key: String::from("purpose"),
            tier: NeedTier::Psychological,
            severity: Severity::Moderate,
            value: 15,
        });
        assert_eq!(trigger.goal_type(), GoalType::Fulfillment);
        assert_eq!(trigger.target(), "purpose");
        assert_eq!(trigger.severity(), Some(Severity::Moderate));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let trigger = Trigger::WorldEvent(WorldEventTrigger {
            event: String::from("bandits raid the mill"),
            goal_type: GoalType::Protect,
            target: String::from("mill"),
            severity: Some(Severity::Severe),
            deadline_turns: None,
        });
        let json: serde_json::Value = serde_json::to_value(&trigger).unwrap();
        assert_eq!(json["kind"], "world_event");
        assert_eq!(json["goal_type"], "PROTECT");

        let back: Trigger = serde_json::from_value(json).unwrap();
        assert_eq!(back, trigger);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let raw = r#"{"kind":"rumour","target":"x"}"#;
        assert!(serde_json::from_str::<Trigger>(raw).is_err());
    }
}
