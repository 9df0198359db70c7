//! [`PgNeedsStore`]: the `NeedsStore` contract over the `entity_needs` table.
//!
//! Each entity's [`EntityNeeds`] is one JSONB document, replaced whole on
//! every save. Needs change every turn for every entity, so a document per
//! entity keeps the write to one row.

use lifeweave_needs::{NeedsError, NeedsStore};
use lifeweave_types::{EntityId, EntityNeeds, SessionId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;
use crate::postgres::PostgresPool;

/// Postgres-backed needs store.
#[derive(Debug, Clone)]
pub struct PgNeedsStore {
    pool: PgPool,
}

impl PgNeedsStore {
    /// Create a store sharing the given pool.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    async fn fetch_entities(&self, session_id: SessionId) -> Result<Vec<EntityId>, DbError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r"SELECT entity_id FROM entity_needs
              WHERE session_id = $1
              ORDER BY entity_id",
        )
        .bind(session_id.into_inner())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(EntityId::from).collect())
    }

    async fn fetch_needs(
        &self,
        session_id: SessionId,
        entity_id: EntityId,
    ) -> Result<Option<EntityNeeds>, DbError> {
        let doc: Option<serde_json::Value> = sqlx::query_scalar(
            r"SELECT needs FROM entity_needs
              WHERE session_id = $1 AND entity_id = $2",
        )
        .bind(session_id.into_inner())
        .bind(entity_id.into_inner())
        .fetch_optional(&self.pool)
        .await?;

        let Some(doc) = doc else {
            return Ok(None);
        };
        let needs: EntityNeeds = serde_json::from_value(doc)?;
        if needs.entity_id != entity_id {
            return Err(DbError::Corrupt(format!(
                "needs document for {entity_id} belongs to {}",
                needs.entity_id
            )));
        }
        Ok(Some(needs))
    }

    async fn write_needs(&self, session_id: SessionId, needs: &EntityNeeds) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO entity_needs (session_id, entity_id, needs)
              VALUES ($1, $2, $3)
              ON CONFLICT (session_id, entity_id) DO UPDATE SET
                needs = EXCLUDED.needs,
                updated_at = now()",
        )
        .bind(session_id.into_inner())
        .bind(needs.entity_id.into_inner())
        .bind(serde_json::to_value(needs)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl NeedsStore for PgNeedsStore {
    async fn list_entities(&self, session_id: SessionId) -> Result<Vec<EntityId>, NeedsError> {
        Ok(self.fetch_entities(session_id).await?)
    }

    async fn load(
        &self,
        session_id: SessionId,
        entity_id: EntityId,
    ) -> Result<Option<EntityNeeds>, NeedsError> {
        Ok(self.fetch_needs(session_id, entity_id).await?)
    }

    async fn save(&self, session_id: SessionId, needs: &EntityNeeds) -> Result<(), NeedsError> {
        Ok(self.write_needs(session_id, needs).await?)
    }
}
