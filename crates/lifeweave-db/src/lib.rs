//! `PostgreSQL` persistence for the Lifeweave goal engine.
//!
//! The in-memory stores in `lifeweave-core` and `lifeweave-needs` are enough
//! for tests and single-process hosts. This crate backs the same contracts
//! with `PostgreSQL` so sessions survive restarts, and keeps an audit trail
//! of every tick.
//!
//! ```text
//! GoalScheduler / GoalFactory --> PgGoalStore   (goals, goal_id_seq)
//! TurnDriver / NeedsTracker  --> PgNeedsStore  (entity_needs)
//! host, after run_tick       --> ReportStore   (simulation_reports)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- the shared connection pool and migrations
//! - [`goal_store`] -- [`PgGoalStore`], the `GoalStore` implementation
//! - [`needs_store`] -- [`PgNeedsStore`], the `NeedsStore` implementation
//! - [`report_store`] -- per-turn `SimulationResult` rows
//! - [`error`] -- shared error types

pub mod error;
pub mod goal_store;
pub mod needs_store;
pub mod postgres;
pub mod report_store;

pub use error::DbError;
pub use goal_store::{GoalRow, PgGoalStore};
pub use needs_store::PgNeedsStore;
pub use postgres::{PostgresPool, pool_size};
pub use report_store::{ReportRow, ReportStore};
