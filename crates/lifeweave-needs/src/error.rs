//! Error types for the lifeweave-needs crate.

use lifeweave_types::EntityId;

/// Errors that can occur while tracking or persisting needs.
#[derive(Debug, thiserror::Error)]
pub enum NeedsError {
    /// The entity holds no need with the given key.
    #[error("need not found: {key} on entity {entity_id}")]
    NeedNotFound {
        /// The entity that was queried.
        entity_id: EntityId,
        /// The missing need key.
        key: String,
    },

    /// No needs record exists for the entity.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// An arithmetic overflow occurred during a decay computation.
    #[error("arithmetic overflow in need computation: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },

    /// The need catalog or tier periods are inconsistent.
    #[error("invalid needs configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The backing store failed.
    #[error("needs store failure: {message}")]
    Store {
        /// Description of the failure.
        message: String,
    },
}
