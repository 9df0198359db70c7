//! Shared type definitions for the Lifeweave simulation.
//!
//! This crate is the single source of truth for the data model shared by the
//! needs tracker, the goal factory, the goal scheduler, and the persistence
//! layer. It holds plain data only: no I/O, no async, no scheduling logic.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifiers for sessions, entities, and goals
//! - [`enums`] -- Closed enumerations (need tiers, goal status, priority, ...)
//! - [`structs`] -- Core records (`Need`, `Goal`, `NeedCrisis`, `StrategyPlan`)
//! - [`triggers`] -- The tagged trigger union that feeds goal creation
//! - [`report`] -- Per-tick audit output of the goal scheduler

pub mod enums;
pub mod ids;
pub mod report;
pub mod structs;
pub mod triggers;

// Re-export all public types at crate root for convenience.
pub use enums::{GoalPriority, GoalStatus, GoalType, NeedPolarity, NeedTier, Severity};
pub use ids::{EntityId, GoalId, SessionId};
pub use report::{
    GoalCreatedEvent, GoalErrorKind, GoalErrorRecord, GoalStepResult, SimulationResult,
};
pub use structs::{
    EntityNeeds, Goal, GoalSummary, NEED_MAX, Need, NeedCrisis, StrategyPlan, TurnContext,
};
pub use triggers::{NeedCrisisTrigger, PersonalityTrigger, Trigger, WorldEventTrigger};
