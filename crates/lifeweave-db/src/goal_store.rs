//! [`PgGoalStore`]: the `GoalStore` contract over the `goals` table.
//!
//! Ids come from the `goal_id_seq` sequence, so they are unique across
//! sessions and monotonic within one. A goal is upserted on
//! `(session_id, goal_key)`; terminal goals are kept as history.

use lifeweave_core::{GoalStore, StoreError};
use lifeweave_types::{
    EntityId, Goal, GoalId, GoalPriority, GoalStatus, GoalType, SessionId, Trigger,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::DbError;
use crate::postgres::PostgresPool;

const SELECT_GOALS: &str = r"SELECT session_id, id, goal_key, owner_entity_id, goal_type, target,
         description, motivation, triggered_by, priority, deadline, strategies,
         current_step, status, blocked_reason, success_condition, failure_condition,
         outcome, created_turn, completed_turn, last_processed_turn
  FROM goals";

/// Postgres-backed goal store.
#[derive(Debug, Clone)]
pub struct PgGoalStore {
    pool: PgPool,
}

impl PgGoalStore {
    /// Create a store sharing the given pool.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    async fn fetch_goals(
        &self,
        sql: &str,
        session_id: SessionId,
        arg: Option<&str>,
    ) -> Result<Vec<Goal>, DbError> {
        let mut query = sqlx::query_as::<_, GoalRow>(sql).bind(session_id.into_inner());
        if let Some(arg) = arg {
            query = query.bind(arg);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Goal::try_from)
            .collect()
    }

    async fn write_batch(&self, goals: &[Goal]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        for goal in goals {
            upsert_goal(&mut *tx, goal).await?;
        }
        tx.commit().await?;
        tracing::debug!(count = goals.len(), "Saved goal batch");
        Ok(())
    }
}

impl GoalStore for PgGoalStore {
    async fn allocate_id(&self, _session_id: SessionId) -> Result<GoalId, StoreError> {
        let raw: i64 = sqlx::query_scalar("SELECT nextval('goal_id_seq')")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(GoalId(to_u64(raw, "goal_id_seq")?))
    }

    async fn get_active(&self, session_id: SessionId) -> Result<Vec<Goal>, StoreError> {
        let sql = format!(
            "{SELECT_GOALS} WHERE session_id = $1 AND status IN ('ACTIVE', 'BLOCKED') ORDER BY id"
        );
        Ok(self.fetch_goals(&sql, session_id, None).await?)
    }

    async fn get_by_key(
        &self,
        session_id: SessionId,
        goal_key: &str,
    ) -> Result<Option<Goal>, StoreError> {
        let sql = format!("{SELECT_GOALS} WHERE session_id = $1 AND goal_key = $2");
        let mut goals = self.fetch_goals(&sql, session_id, Some(goal_key)).await?;
        Ok(goals.pop())
    }

    async fn query_by_target(
        &self,
        session_id: SessionId,
        target: &str,
    ) -> Result<Vec<Goal>, StoreError> {
        let sql = format!("{SELECT_GOALS} WHERE session_id = $1 AND target = $2 ORDER BY id");
        Ok(self.fetch_goals(&sql, session_id, Some(target)).await?)
    }

    async fn save(&self, goal: &Goal) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        upsert_goal(&mut *conn, goal).await?;
        Ok(())
    }

    async fn save_batch(&self, session_id: SessionId, goals: &[Goal]) -> Result<(), StoreError> {
        if let Some(stray) = goals.iter().find(|g| g.session_id != session_id) {
            return Err(StoreError::SessionMismatch { goal_id: stray.id });
        }
        if goals.is_empty() {
            return Ok(());
        }
        Ok(self.write_batch(goals).await?)
    }
}

/// Insert `goal`, or replace the row holding its `(session_id, goal_key)`.
async fn upsert_goal(conn: &mut PgConnection, goal: &Goal) -> Result<(), DbError> {
    sqlx::query(
        r"INSERT INTO goals
          (session_id, id, goal_key, owner_entity_id, goal_type, target, description,
           motivation, triggered_by, priority, deadline, strategies, current_step, status,
           blocked_reason, success_condition, failure_condition, outcome, created_turn,
           completed_turn, last_processed_turn)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                  $17, $18, $19, $20, $21)
          ON CONFLICT (session_id, goal_key) DO UPDATE SET
            id = EXCLUDED.id,
            owner_entity_id = EXCLUDED.owner_entity_id,
            goal_type = EXCLUDED.goal_type,
            target = EXCLUDED.target,
            description = EXCLUDED.description,
            motivation = EXCLUDED.motivation,
            triggered_by = EXCLUDED.triggered_by,
            priority = EXCLUDED.priority,
            deadline = EXCLUDED.deadline,
            strategies = EXCLUDED.strategies,
            current_step = EXCLUDED.current_step,
            status = EXCLUDED.status,
            blocked_reason = EXCLUDED.blocked_reason,
            success_condition = EXCLUDED.success_condition,
            failure_condition = EXCLUDED.failure_condition,
            outcome = EXCLUDED.outcome,
            created_turn = EXCLUDED.created_turn,
            completed_turn = EXCLUDED.completed_turn,
            last_processed_turn = EXCLUDED.last_processed_turn,
            updated_at = now()",
    )
    .bind(goal.session_id.into_inner())
    .bind(to_i64(goal.id.get()))
    .bind(&goal.goal_key)
    .bind(goal.owner_entity_id.into_inner())
    .bind(goal.goal_type.as_str())
    .bind(&goal.target)
    .bind(&goal.description)
    .bind(serde_json::to_value(&goal.motivation)?)
    .bind(serde_json::to_value(&goal.triggered_by)?)
    .bind(goal.priority.as_str())
    .bind(goal.deadline.map(to_i64))
    .bind(serde_json::to_value(&goal.strategies)?)
    .bind(i64::from(goal.current_step))
    .bind(goal.status.as_str())
    .bind(goal.blocked_reason.as_deref())
    .bind(&goal.success_condition)
    .bind(goal.failure_condition.as_deref())
    .bind(goal.outcome.as_deref())
    .bind(to_i64(goal.created_turn))
    .bind(goal.completed_turn.map(to_i64))
    .bind(goal.last_processed_turn.map(to_i64))
    .execute(conn)
    .await?;
    Ok(())
}

/// A row from the `goals` table.
///
/// Enums are stored as their canonical strings and lists as JSONB arrays.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GoalRow {
    /// Owning session.
    pub session_id: Uuid,
    /// Sequence-allocated goal id.
    pub id: i64,
    /// Session-unique key.
    pub goal_key: String,
    /// Owner entity.
    pub owner_entity_id: Uuid,
    /// Goal type string (e.g. `SURVIVAL`).
    pub goal_type: String,
    /// Target.
    pub target: String,
    /// Description.
    pub description: String,
    /// JSON array of motivation strings.
    pub motivation: serde_json::Value,
    /// JSON encoding of the trigger.
    pub triggered_by: serde_json::Value,
    /// Priority string (e.g. `URGENT`).
    pub priority: String,
    /// Deadline turn, if any.
    pub deadline: Option<i64>,
    /// JSON array of step descriptions.
    pub strategies: serde_json::Value,
    /// Index of the current step.
    pub current_step: i64,
    /// Status string (e.g. `ACTIVE`).
    pub status: String,
    /// Why the goal is blocked, if it is.
    pub blocked_reason: Option<String>,
    /// Success condition.
    pub success_condition: String,
    /// Failure condition, if any.
    pub failure_condition: Option<String>,
    /// Outcome annotation, if any.
    pub outcome: Option<String>,
    /// Turn of creation.
    pub created_turn: i64,
    /// Turn the goal closed on, if it has.
    pub completed_turn: Option<i64>,
    /// Last turn the scheduler wrote this goal.
    pub last_processed_turn: Option<i64>,
}

impl TryFrom<GoalRow> for Goal {
    type Error = DbError;

    fn try_from(row: GoalRow) -> Result<Self, Self::Error> {
        let goal_type = GoalType::parse(&row.goal_type)
            .ok_or_else(|| DbError::Corrupt(format!("unknown goal_type {}", row.goal_type)))?;
        let priority = GoalPriority::parse(&row.priority)
            .ok_or_else(|| DbError::Corrupt(format!("unknown priority {}", row.priority)))?;
        let status = GoalStatus::parse(&row.status)
            .ok_or_else(|| DbError::Corrupt(format!("unknown status {}", row.status)))?;
        let motivation: Vec<String> = serde_json::from_value(row.motivation)?;
        let triggered_by: Trigger = serde_json::from_value(row.triggered_by)?;
        let strategies: Vec<String> = serde_json::from_value(row.strategies)?;
        let current_step = u32::try_from(row.current_step)
            .map_err(|e| DbError::Corrupt(format!("current_step {}: {e}", row.current_step)))?;

        Ok(Self {
            id: GoalId(to_u64(row.id, "id")?),
            session_id: SessionId::from(row.session_id),
            goal_key: row.goal_key,
            owner_entity_id: EntityId::from(row.owner_entity_id),
            goal_type,
            target: row.target,
            description: row.description,
            motivation,
            triggered_by,
            priority,
            deadline: row.deadline.map(|t| to_u64(t, "deadline")).transpose()?,
            strategies,
            current_step,
            status,
            blocked_reason: row.blocked_reason,
            success_condition: row.success_condition,
            failure_condition: row.failure_condition,
            outcome: row.outcome,
            created_turn: to_u64(row.created_turn, "created_turn")?,
            completed_turn: row
                .completed_turn
                .map(|t| to_u64(t, "completed_turn"))
                .transpose()?,
            last_processed_turn: row
                .last_processed_turn
                .map(|t| to_u64(t, "last_processed_turn"))
                .transpose()?,
        })
    }
}

/// Turns and ids beyond `i64::MAX` saturate rather than wrap.
pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// A negative stored turn or id is a corrupt row.
pub(crate) fn to_u64(value: i64, column: &str) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|e| DbError::Corrupt(format!("{column} {value}: {e}")))
}
