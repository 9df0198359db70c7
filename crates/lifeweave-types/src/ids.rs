//! Type-safe identifier wrappers.
//!
//! Sessions and entities are identified by UUID v7 newtypes so the compiler
//! rejects accidental mixing. Goals are keyed by a store-allocated integer
//! ([`GoalId`]): the goal store is an arena indexed by that id, which keeps
//! entity/goal back-references as plain lookups instead of object graphs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a simulation session (one independent world).
    SessionId
}

define_id! {
    /// Unique identifier for a character (non-player or otherwise) in a session.
    EntityId
}

/// Store-allocated identifier for a goal record.
///
/// Ids are allocated monotonically by the goal store, so they double as the
/// final deterministic tie-break when two goals share priority and creation
/// turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GoalId(pub u64);

impl GoalId {
    /// Return the raw integer value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for GoalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GoalId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
