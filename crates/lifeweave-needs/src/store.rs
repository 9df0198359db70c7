//! The `NeedsStore` persistence contract.
//!
//! Hosts persist entity needs however they like; the turn driver only needs
//! to list the entities of a session, load their needs, and save them back.
//! [`InMemoryNeedsStore`] backs tests and single-process simulations.

use std::collections::BTreeMap;
use std::future::Future;

use lifeweave_types::{EntityId, EntityNeeds, SessionId};
use tokio::sync::RwLock;

use crate::error::NeedsError;

/// Per-entity need persistence.
pub trait NeedsStore: Send + Sync {
    /// All entities with a needs record in the session, in ascending id order.
    fn list_entities(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<Vec<EntityId>, NeedsError>> + Send;

    /// Load the needs of one entity, or `None` if it has no record.
    fn load(
        &self,
        session_id: SessionId,
        entity_id: EntityId,
    ) -> impl Future<Output = Result<Option<EntityNeeds>, NeedsError>> + Send;

    /// Insert or replace the needs record of `needs.entity_id`.
    fn save(
        &self,
        session_id: SessionId,
        needs: &EntityNeeds,
    ) -> impl Future<Output = Result<(), NeedsError>> + Send;
}

/// A [`NeedsStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryNeedsStore {
    records: RwLock<BTreeMap<(SessionId, EntityId), EntityNeeds>>,
}

impl InMemoryNeedsStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl NeedsStore for InMemoryNeedsStore {
    async fn list_entities(&self, session_id: SessionId) -> Result<Vec<EntityId>, NeedsError> {
        let records = self.records.read().await;
        Ok(records
            .keys()
            .filter(|(s, _)| *s == session_id)
            .map(|(_, e)| *e)
            .collect())
    }

    async fn load(
        &self,
        session_id: SessionId,
        entity_id: EntityId,
    ) -> Result<Option<EntityNeeds>, NeedsError> {
        let records = self.records.read().await;
        Ok(records.get(&(session_id, entity_id)).cloned())
    }

    async fn save(&self, session_id: SessionId, needs: &EntityNeeds) -> Result<(), NeedsError> {
        let mut records = self.records.write().await;
        records.insert((session_id, needs.entity_id), needs.clone());
        Ok(())
    }
}
