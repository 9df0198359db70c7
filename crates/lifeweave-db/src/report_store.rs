//! Per-turn audit persistence for [`SimulationResult`].
//!
//! One row per `(session, turn)`. Inserts are `ON CONFLICT DO NOTHING`, so a
//! retried turn never duplicates or rewrites its audit row.

use lifeweave_types::{SessionId, SimulationResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;
use crate::goal_store::{to_i64, to_u64};

/// Operations on the `simulation_reports` table.
pub struct ReportStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ReportStore<'a> {
    /// Create a report store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert the report of one tick.
    ///
    /// Returns `false` when a report for the same session and turn already
    /// exists; the stored row is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert_report(&self, result: &SimulationResult) -> Result<bool, DbError> {
        let done = sqlx::query(
            r"INSERT INTO simulation_reports
              (session_id, turn, goals_created, goal_steps, error_count, report)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (session_id, turn) DO NOTHING",
        )
        .bind(result.session_id.into_inner())
        .bind(to_i64(result.turn))
        .bind(count(result.goal_created.len()))
        .bind(count(result.goal_steps.len()))
        .bind(count(result.errors.len()))
        .bind(serde_json::to_value(result)?)
        .execute(self.pool)
        .await?;

        let inserted = done.rows_affected() > 0;
        tracing::debug!(
            session = %result.session_id,
            turn = result.turn,
            inserted,
            "Stored turn report"
        );
        Ok(inserted)
    }

    /// The report of one turn, if stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or the row does not decode.
    pub async fn get_report(
        &self,
        session_id: SessionId,
        turn: u64,
    ) -> Result<Option<SimulationResult>, DbError> {
        let doc: Option<serde_json::Value> = sqlx::query_scalar(
            r"SELECT report FROM simulation_reports
              WHERE session_id = $1 AND turn = $2",
        )
        .bind(session_id.into_inner())
        .bind(to_i64(turn))
        .fetch_optional(self.pool)
        .await?;

        Ok(doc.map(serde_json::from_value).transpose()?)
    }

    /// Summary rows for turns in `[from_turn, to_turn)`, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list_reports(
        &self,
        session_id: SessionId,
        from_turn: u64,
        to_turn: u64,
    ) -> Result<Vec<ReportRow>, DbError> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r"SELECT session_id, turn, goals_created, goal_steps, error_count, created_at
              FROM simulation_reports
              WHERE session_id = $1 AND turn >= $2 AND turn < $3
              ORDER BY turn",
        )
        .bind(session_id.into_inner())
        .bind(to_i64(from_turn))
        .bind(to_i64(to_turn))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}

/// Summary of one stored report, without the JSONB body.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRow {
    /// Session the turn ran for.
    pub session_id: Uuid,
    /// Turn number.
    pub turn: i64,
    /// Number of goals first seen on the turn.
    pub goals_created: i32,
    /// Number of committed transitions.
    pub goal_steps: i32,
    /// Number of per-goal errors.
    pub error_count: i32,
    /// When the row was written.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ReportRow {
    /// The turn as an unsigned number.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Corrupt`] if the stored turn is negative.
    pub fn turn(&self) -> Result<u64, DbError> {
        to_u64(self.turn, "turn")
    }
}

fn count(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}
