//! Goal lifecycle and turn orchestration for the Lifeweave simulation.
//!
//! This crate turns need crises and world events into goals and advances
//! those goals once per simulated turn. The pieces, leaves first:
//!
//! - [`transition`] -- The closed goal state machine and its validator
//! - [`store`] -- The `GoalStore` contract and an in-memory arena
//! - [`oracle`] -- The `StrategyOracle` contract and a scripted oracle
//! - [`world`] -- The `WorldStateQuery` contract and a scripted world
//! - [`factory`] -- Goal creation from triggers, with deduplication
//! - [`contention`] -- Deterministic arbitration over contested targets
//! - [`overrides`] -- Externally requested transitions (abandon, fail, annotate)
//! - [`scheduler`] -- `GoalScheduler::run_tick`, the per-turn pass
//! - [`driver`] -- One full turn for a session: needs, goal creation, tick
//! - [`runner`] -- Drives several independent sessions turn by turn
//! - [`config`] -- YAML configuration
//! - [`telemetry`] -- Tracing subscriber setup
//! - [`error`] -- Error types
//!
//! The scheduler is deterministic: identical store contents, identical
//! world answers and an identical turn produce an identical
//! [`SimulationResult`](lifeweave_types::SimulationResult).

pub mod config;
pub mod contention;
pub mod driver;
pub mod error;
pub mod factory;
pub mod oracle;
pub mod overrides;
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod transition;
pub mod world;

pub use config::{
    ConfigError, FactoryConfig, InfrastructureConfig, LifeweaveConfig, LogFormat, LoggingConfig,
    SchedulerConfig, SimulationConfig,
};
pub use driver::{DroppedTrigger, TurnDriver, TurnReport};
pub use error::{
    DriverError, GoalError, OracleError, SchedulerError, StoreError, WorldQueryError,
};
pub use factory::GoalFactory;
pub use oracle::{OracleContext, ScriptedOracle, StrategyOracle};
pub use overrides::OverrideRequest;
pub use runner::{NoOpCallback, RunSummary, TurnCallback, run_sessions};
pub use scheduler::GoalScheduler;
pub use store::{GoalStore, InMemoryGoalStore};
pub use telemetry::{TelemetryError, init_tracing};
pub use transition::{GoalTransition, apply_transition};
pub use world::{ConditionCheck, ScriptedWorld, StepCheck, WorldSnapshot, WorldStateQuery};
