//! Need tracking for the Lifeweave simulation.
//!
//! Each entity carries a small set of needs (hunger, rest, purpose, ...)
//! that drift over simulated time. The [`NeedsTracker`] applies tier-scaled
//! decay, clamps values to `0..=100`, and emits one [`NeedCrisis`] per
//! crisis episode when a need enters its configured crisis band.
//!
//! # Modules
//!
//! - [`config`] -- Tier decay periods and the need catalog
//! - [`tracker`] -- Decay, crisis detection, and satisfaction
//! - [`store`] -- The `NeedsStore` persistence contract and an in-memory store
//! - [`error`] -- Error types
//!
//! [`NeedCrisis`]: lifeweave_types::NeedCrisis

pub mod config;
pub mod error;
pub mod store;
pub mod tracker;

pub use config::{CrisisBand, NeedSpec, NeedsConfig, TierPeriods};
pub use error::NeedsError;
pub use store::{InMemoryNeedsStore, NeedsStore};
pub use tracker::NeedsTracker;
