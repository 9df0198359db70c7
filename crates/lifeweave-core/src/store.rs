//! The `GoalStore` contract and an in-memory arena.
//!
//! Goals are keyed by a store-allocated [`GoalId`] and are unique per
//! `(session, goal_key)`. Records are never deleted; terminal goals stay as
//! history. `save` is last-write-wins per `(session, goal_key)`.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use lifeweave_types::{Goal, GoalId, SessionId};
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Goal persistence used by the factory and the scheduler.
pub trait GoalStore: Send + Sync {
    /// Reserve a fresh goal id.
    fn allocate_id(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<GoalId, StoreError>> + Send;

    /// All open goals (`ACTIVE` and `BLOCKED`) of the session, ordered by id.
    fn get_active(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<Vec<Goal>, StoreError>> + Send;

    /// The goal with `goal_key` in any status, if present.
    fn get_by_key(
        &self,
        session_id: SessionId,
        goal_key: &str,
    ) -> impl Future<Output = Result<Option<Goal>, StoreError>> + Send;

    /// Every goal of the session about `target`, in any status, ordered by id.
    fn query_by_target(
        &self,
        session_id: SessionId,
        target: &str,
    ) -> impl Future<Output = Result<Vec<Goal>, StoreError>> + Send;

    /// Insert or replace one goal.
    fn save(&self, goal: &Goal) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert or replace several goals of one session atomically: either
    /// every goal is written or none is.
    fn save_batch(
        &self,
        session_id: SessionId,
        goals: &[Goal],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, Default)]
struct SessionGoals {
    by_id: BTreeMap<GoalId, Goal>,
    by_key: BTreeMap<String, GoalId>,
}

impl SessionGoals {
    fn upsert(&mut self, goal: Goal) {
        if let Some(previous) = self.by_key.insert(goal.goal_key.clone(), goal.id)
            && previous != goal.id
        {
            self.by_id.remove(&previous);
        }
        self.by_id.insert(goal.id, goal);
    }
}

/// A [`GoalStore`] held in memory.
///
/// Can be switched into an unavailable mode to exercise outage handling.
#[derive(Debug)]
pub struct InMemoryGoalStore {
    sessions: RwLock<BTreeMap<SessionId, SessionGoals>>,
    next_id: AtomicU64,
    unavailable: AtomicBool,
}

impl Default for InMemoryGoalStore {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            unavailable: AtomicBool::new(false),
        }
    }
}

impl InMemoryGoalStore {
    /// An empty store. Ids start at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (`true`) or succeed again (`false`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    /// Every goal of the session in any status, ordered by id.
    pub async fn all_goals(&self, session_id: SessionId) -> Vec<Goal> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&session_id)
            .map(|s| s.by_id.values().cloned().collect())
            .unwrap_or_default()
    }

    /// The goal with the given id in any status.
    pub async fn get(&self, session_id: SessionId, goal_id: GoalId) -> Option<Goal> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&session_id)
            .and_then(|s| s.by_id.get(&goal_id))
            .cloned()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable {
                message: String::from("in-memory store marked unavailable"),
            });
        }
        Ok(())
    }
}

impl GoalStore for InMemoryGoalStore {
    async fn allocate_id(&self, _session_id: SessionId) -> Result<GoalId, StoreError> {
        self.check_available()?;
        Ok(GoalId(self.next_id.fetch_add(1, Ordering::AcqRel)))
    }

    async fn get_active(&self, session_id: SessionId) -> Result<Vec<Goal>, StoreError> {
        self.check_available()?;
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&session_id)
            .map(|s| {
                s.by_id
                    .values()
                    .filter(|g| g.status.is_open())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_by_key(
        &self,
        session_id: SessionId,
        goal_key: &str,
    ) -> Result<Option<Goal>, StoreError> {
        self.check_available()?;
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&session_id).and_then(|s| {
            s.by_key
                .get(goal_key)
                .and_then(|id| s.by_id.get(id))
                .cloned()
        }))
    }

    async fn query_by_target(
        &self,
        session_id: SessionId,
        target: &str,
    ) -> Result<Vec<Goal>, StoreError> {
        self.check_available()?;
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&session_id)
            .map(|s| {
                s.by_id
                    .values()
                    .filter(|g| g.target == target)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn save(&self, goal: &Goal) -> Result<(), StoreError> {
        self.check_available()?;
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(goal.session_id)
            .or_default()
            .upsert(goal.clone());
        Ok(())
    }

    async fn save_batch(&self, session_id: SessionId, goals: &[Goal]) -> Result<(), StoreError> {
        self.check_available()?;
        if let Some(stray) = goals.iter().find(|g| g.session_id != session_id) {
            return Err(StoreError::SessionMismatch { goal_id: stray.id });
        }
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(session_id).or_default();
        for goal in goals {
            session.upsert(goal.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lifeweave_types::GoalStatus;

    use super::*;
    use crate::transition::tests::sample_goal;

    fn in_session(mut goal: Goal, session: SessionId) -> Goal {
        goal.session_id = session;
        goal
    }

    #[tokio::test]
    async fn ids_are_sequential() {
        let store = InMemoryGoalStore::new();
        let s = SessionId::new();
        assert_eq!(store.allocate_id(s).await.unwrap(), GoalId(1));
        assert_eq!(store.allocate_id(s).await.unwrap(), GoalId(2));
    }

    #[tokio::test]
    async fn get_active_returns_open_goals_in_id_order() {
        let store = InMemoryGoalStore::new();
        let s = SessionId::new();
        let mut done = in_session(sample_goal(1, &["a"]), s);
        done.status = GoalStatus::Completed;
        let mut blocked = in_session(sample_goal(3, &["a"]), s);
        blocked.status = GoalStatus::Blocked;
        let active = in_session(sample_goal(2, &["a"]), s);

        store.save(&blocked).await.unwrap();
        store.save(&done).await.unwrap();
        store.save(&active).await.unwrap();

        let ids: Vec<GoalId> = store.get_active(s).await.unwrap().iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![GoalId(2), GoalId(3)]);
        assert_eq!(store.query_by_target(s, "sword").await.unwrap().len(), 3);
        assert!(store.get_active(SessionId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_is_last_write_wins_per_key() {
        let store = InMemoryGoalStore::new();
        let s = SessionId::new();
        let mut goal = in_session(sample_goal(1, &["a", "b"]), s);
        store.save(&goal).await.unwrap();
        goal.current_step = 1;
        store.save(&goal).await.unwrap();

        let loaded = store.get_by_key(s, &goal.goal_key).await.unwrap().unwrap();
        assert_eq!(loaded.current_step, 1);
        assert_eq!(store.all_goals(s).await.len(), 1);
    }

    #[tokio::test]
    async fn batch_rejects_foreign_session_without_writing() {
        let store = InMemoryGoalStore::new();
        let s = SessionId::new();
        let ok = in_session(sample_goal(1, &["a"]), s);
        let stray = in_session(sample_goal(2, &["a"]), SessionId::new());

        let err = store.save_batch(s, &[ok, stray]).await;
        assert!(matches!(err, Err(StoreError::SessionMismatch { .. })));
        assert!(store.all_goals(s).await.is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryGoalStore::new();
        store.set_unavailable(true);
        let s = SessionId::new();
        assert!(store.get_active(s).await.is_err());
        assert!(store.allocate_id(s).await.is_err());
        store.set_unavailable(false);
        assert!(store.get_active(s).await.is_ok());
    }
}
