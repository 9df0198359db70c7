//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] and `serde_json` errors. Conversions into the store errors of
//! `lifeweave-core` and `lifeweave-needs` let the Postgres stores satisfy
//! those contracts.

use lifeweave_core::StoreError;
use lifeweave_needs::NeedsError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row holds a value the domain types cannot represent.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Serialization(_) | DbError::Corrupt(_) => Self::Corrupt {
                message: err.to_string(),
            },
            DbError::Postgres(_) | DbError::Migration(_) | DbError::Config(_) => {
                Self::Unavailable {
                    message: err.to_string(),
                }
            }
        }
    }
}

impl From<DbError> for NeedsError {
    fn from(err: DbError) -> Self {
        Self::Store {
            message: err.to_string(),
        }
    }
}
