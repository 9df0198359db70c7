//! Scenario tests for `GoalScheduler::run_tick` over the in-memory store and
//! the scripted world.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::too_many_lines
)]

use std::sync::Arc;
use std::time::Duration;

use lifeweave_core::scheduler::DEADLINE_MISSED;
use lifeweave_core::{
    GoalScheduler, GoalStore, InMemoryGoalStore, OverrideRequest, SchedulerConfig, SchedulerError,
    ScriptedWorld,
};
use lifeweave_types::{
    EntityId, Goal, GoalErrorKind, GoalId, GoalPriority, GoalStatus, GoalType, PersonalityTrigger,
    SessionId, Trigger,
};

// =============================================================================
// Helpers
// =============================================================================

type Scheduler = GoalScheduler<InMemoryGoalStore, ScriptedWorld>;

/// An `ACTIVE` personality goal at step 0, created on turn 0.
fn goal(session_id: SessionId, id: u64, owner: EntityId, steps: &[&str]) -> Goal {
    Goal {
        id: GoalId(id),
        session_id,
        goal_key: format!("goal-{id}"),
        owner_entity_id: owner,
        goal_type: GoalType::Acquire,
        target: format!("item-{id}"),
        description: format!("obtain item {id}"),
        motivation: vec![String::from("wants it")],
        triggered_by: Trigger::Personality(PersonalityTrigger {
            trait_name: String::from("greed"),
            goal_type: GoalType::Acquire,
            target: format!("item-{id}"),
            severity: None,
        }),
        priority: GoalPriority::Medium,
        deadline: None,
        strategies: steps.iter().map(|s| (*s).to_owned()).collect(),
        current_step: 0,
        status: GoalStatus::Active,
        blocked_reason: None,
        success_condition: format!("holding item {id}"),
        failure_condition: None,
        outcome: None,
        created_turn: 0,
        completed_turn: None,
        last_processed_turn: None,
    }
}

fn generous_config() -> SchedulerConfig {
    SchedulerConfig {
        advance_budget_per_entity: 10,
        ..SchedulerConfig::default()
    }
}

async fn setup(goals: &[Goal], config: SchedulerConfig) -> (Arc<InMemoryGoalStore>, Arc<ScriptedWorld>, Scheduler) {
    let store = Arc::new(InMemoryGoalStore::new());
    for g in goals {
        store.save(g).await.expect("seed goal");
    }
    let world = Arc::new(ScriptedWorld::new());
    let scheduler = GoalScheduler::new(Arc::clone(&store), Arc::clone(&world), config);
    (store, world, scheduler)
}

async fn stored(store: &InMemoryGoalStore, session_id: SessionId, id: u64) -> Goal {
    store.get(session_id, GoalId(id)).await.expect("goal present")
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn advance_then_complete_on_success_condition() {
    let session = SessionId::new();
    let owner = EntityId::new();
    let g = goal(session, 1, owner, &["find food", "consume food"]);
    let (store, world, scheduler) = setup(&[g], SchedulerConfig::default()).await;

    let first = scheduler.run_tick(session, 1).await.unwrap();
    assert!(first.is_clean());
    let step = first.step_for(GoalId(1)).expect("transition recorded");
    assert_eq!((step.prev_step, step.new_step), (0, 1));
    assert_eq!(step.new_status, GoalStatus::Active);
    assert_eq!(stored(&store, session, 1).await.last_processed_turn, Some(1));

    world.set_condition("holding item 1", true).await;
    let second = scheduler.run_tick(session, 2).await.unwrap();
    let step = second.step_for(GoalId(1)).expect("transition recorded");
    assert_eq!(step.new_status, GoalStatus::Completed);

    let done = stored(&store, session, 1).await;
    assert_eq!(done.status, GoalStatus::Completed);
    assert_eq!(done.completed_turn, Some(2));
    assert!(store.get_active(session).await.unwrap().is_empty());
}

#[tokio::test]
async fn last_step_success_completes_and_step_stays_in_bounds() {
    let session = SessionId::new();
    let g = goal(session, 1, EntityId::new(), &["only step"]);
    let (store, _world, scheduler) = setup(&[g], SchedulerConfig::default()).await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    let step = result.step_for(GoalId(1)).unwrap();
    assert_eq!(step.new_status, GoalStatus::Completed);
    assert_eq!(step.new_step, 0);

    let done = stored(&store, session, 1).await;
    assert!(done.step_in_bounds());
    assert_eq!(
        done.outcome.as_deref(),
        Some("all strategy steps completed")
    );
}

#[tokio::test]
async fn goal_without_strategies_completes_on_first_tick() {
    let session = SessionId::new();
    let g = goal(session, 1, EntityId::new(), &[]);
    let (store, _world, scheduler) = setup(&[g], SchedulerConfig::default()).await;

    scheduler.run_tick(session, 1).await.unwrap();
    let done = stored(&store, session, 1).await;
    assert_eq!(done.status, GoalStatus::Completed);
    assert_eq!(done.current_step, 0);
}

#[tokio::test]
async fn failure_condition_wins_over_success() {
    let session = SessionId::new();
    let mut g = goal(session, 1, EntityId::new(), &["a", "b"]);
    g.failure_condition = Some(String::from("item destroyed"));
    let (store, world, scheduler) = setup(&[g], SchedulerConfig::default()).await;
    world.set_condition("item destroyed", true).await;
    world.set_condition("holding item 1", true).await;

    scheduler.run_tick(session, 1).await.unwrap();
    let failed = stored(&store, session, 1).await;
    assert_eq!(failed.status, GoalStatus::Failed);
    assert!(failed.outcome.unwrap().contains("item destroyed"));
}

#[tokio::test]
async fn blocked_goal_resumes_when_step_clears() {
    let session = SessionId::new();
    let g = goal(session, 1, EntityId::new(), &["cross bridge", "enter town"]);
    let (store, world, scheduler) = setup(&[g], SchedulerConfig::default()).await;
    world.block_step("cross bridge", "bridge washed out").await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    let step = result.step_for(GoalId(1)).unwrap();
    assert_eq!(step.new_status, GoalStatus::Blocked);
    assert_eq!(step.blocked_reason.as_deref(), Some("bridge washed out"));
    assert_eq!(step.new_step, 0);

    // Still blocked: the goal stays open and keeps its step.
    scheduler.run_tick(session, 2).await.unwrap();
    assert_eq!(stored(&store, session, 1).await.status, GoalStatus::Blocked);

    world.unblock_step("cross bridge").await;
    let result = scheduler.run_tick(session, 3).await.unwrap();
    let step = result.step_for(GoalId(1)).unwrap();
    assert_eq!(step.prev_status, GoalStatus::Blocked);
    assert_eq!(step.new_status, GoalStatus::Active);
    assert_eq!(step.new_step, 0);

    let resumed = stored(&store, session, 1).await;
    assert!(resumed.blocked_reason.is_none());

    scheduler.run_tick(session, 4).await.unwrap();
    assert_eq!(stored(&store, session, 1).await.current_step, 1);
}

#[tokio::test]
async fn processing_interval_skips_recent_goals() {
    let session = SessionId::new();
    let g = goal(session, 1, EntityId::new(), &["a", "b", "c"]);
    let config = SchedulerConfig {
        processing_interval: 3,
        ..SchedulerConfig::default()
    };
    let (store, _world, scheduler) = setup(&[g], config).await;

    scheduler.run_tick(session, 1).await.unwrap();
    assert_eq!(stored(&store, session, 1).await.current_step, 1);

    let skipped = scheduler.run_tick(session, 2).await.unwrap();
    assert!(skipped.goal_steps.is_empty());
    scheduler.run_tick(session, 3).await.unwrap();
    assert_eq!(stored(&store, session, 1).await.current_step, 1);

    scheduler.run_tick(session, 4).await.unwrap();
    assert_eq!(stored(&store, session, 1).await.current_step, 2);
}

#[tokio::test]
async fn terminal_goals_are_not_touched() {
    let session = SessionId::new();
    let mut g = goal(session, 1, EntityId::new(), &["a", "b"]);
    g.status = GoalStatus::Completed;
    g.completed_turn = Some(0);
    let (store, _world, scheduler) = setup(&[g.clone()], SchedulerConfig::default()).await;

    let result = scheduler.run_tick(session, 5).await.unwrap();
    assert!(result.goal_steps.is_empty());
    assert_eq!(stored(&store, session, 1).await, g);
}

// =============================================================================
// Deadlines
// =============================================================================

#[tokio::test]
async fn deadline_passed_fails_goal() {
    let session = SessionId::new();
    let mut g = goal(session, 1, EntityId::new(), &["a", "b", "c"]);
    g.deadline = Some(10);
    let (store, _world, scheduler) = setup(&[g], SchedulerConfig::default()).await;

    // On the deadline turn itself the goal may still act.
    scheduler.run_tick(session, 10).await.unwrap();
    assert_eq!(stored(&store, session, 1).await.status, GoalStatus::Active);

    let result = scheduler.run_tick(session, 11).await.unwrap();
    let step = result.step_for(GoalId(1)).unwrap();
    assert_eq!(step.new_status, GoalStatus::Failed);

    let failed = stored(&store, session, 1).await;
    assert_eq!(failed.status, GoalStatus::Failed);
    assert_eq!(failed.completed_turn, Some(11));
    assert!(failed.outcome.unwrap().contains("deadline"));
}

#[tokio::test]
async fn deadline_applies_to_goals_not_due() {
    let session = SessionId::new();
    let mut g = goal(session, 1, EntityId::new(), &["a", "b"]);
    g.deadline = Some(3);
    g.last_processed_turn = Some(4);
    let config = SchedulerConfig {
        processing_interval: 10,
        ..SchedulerConfig::default()
    };
    let (store, _world, scheduler) = setup(&[g], config).await;

    scheduler.run_tick(session, 5).await.unwrap();
    let failed = stored(&store, session, 1).await;
    assert_eq!(failed.status, GoalStatus::Failed);
    assert_eq!(failed.outcome.as_deref(), Some(DEADLINE_MISSED));
}

#[tokio::test]
async fn deadline_fails_blocked_goal() {
    let session = SessionId::new();
    let mut g = goal(session, 1, EntityId::new(), &["a"]);
    g.status = GoalStatus::Blocked;
    g.blocked_reason = Some(String::from("waiting"));
    g.deadline = Some(2);
    let (store, world, scheduler) = setup(&[g], SchedulerConfig::default()).await;
    world.block_step("a", "still waiting").await;

    scheduler.run_tick(session, 3).await.unwrap();
    let failed = stored(&store, session, 1).await;
    assert_eq!(failed.status, GoalStatus::Failed);
    assert!(failed.blocked_reason.is_none());
}

#[tokio::test]
async fn single_step_goal_past_deadline_fails() {
    let session = SessionId::new();
    let mut g = goal(session, 1, EntityId::new(), &["talk to Marcus"]);
    g.deadline = Some(10);
    let (store, _world, scheduler) = setup(&[g], SchedulerConfig::default()).await;

    let result = scheduler.run_tick(session, 11).await.unwrap();
    let step = result.step_for(GoalId(1)).unwrap();
    assert_eq!(step.prev_status, GoalStatus::Active);
    assert_eq!(step.new_status, GoalStatus::Failed);
    assert_eq!(step.new_step, 0);

    let failed = stored(&store, session, 1).await;
    assert_eq!(failed.status, GoalStatus::Failed);
    assert!(failed.outcome.unwrap().contains("deadline"));
    assert_eq!(failed.last_processed_turn, Some(11));
}

#[tokio::test]
async fn deadline_wins_over_failure_condition() {
    let session = SessionId::new();
    let mut g = goal(session, 1, EntityId::new(), &["a", "b"]);
    g.failure_condition = Some(String::from("item gone"));
    g.deadline = Some(10);
    let (store, world, scheduler) = setup(&[g], SchedulerConfig::default()).await;
    world.set_condition("item gone", true).await;

    scheduler.run_tick(session, 11).await.unwrap();
    let failed = stored(&store, session, 1).await;
    assert_eq!(failed.status, GoalStatus::Failed);
    assert!(failed.outcome.unwrap().contains("deadline"));
}

#[tokio::test]
async fn deadline_wins_over_success_condition() {
    let session = SessionId::new();
    let mut g = goal(session, 1, EntityId::new(), &["a", "b"]);
    g.deadline = Some(10);
    let (store, world, scheduler) = setup(&[g], SchedulerConfig::default()).await;
    world.set_condition("holding item 1", true).await;

    scheduler.run_tick(session, 11).await.unwrap();
    let failed = stored(&store, session, 1).await;
    assert_eq!(failed.status, GoalStatus::Failed);
    assert_eq!(failed.outcome.as_deref(), Some(DEADLINE_MISSED));
    assert_eq!(failed.completed_turn, Some(11));
}

#[tokio::test]
async fn expired_goal_does_not_claim_contested_target() {
    let session = SessionId::new();
    let mut late = goal(session, 1, EntityId::new(), &["seek", "take"]);
    late.target = String::from("crown");
    late.priority = GoalPriority::Urgent;
    late.deadline = Some(4);
    let mut patient = goal(session, 2, EntityId::new(), &["seek", "take"]);
    patient.target = String::from("crown");
    let (store, world, scheduler) = setup(&[late, patient], SchedulerConfig::default()).await;
    world.set_exclusive("crown").await;

    let result = scheduler.run_tick(session, 5).await.unwrap();
    assert!(result.is_clean());
    assert_eq!(stored(&store, session, 1).await.status, GoalStatus::Failed);

    let winner = stored(&store, session, 2).await;
    assert_eq!(winner.status, GoalStatus::Active);
    assert_eq!(winner.current_step, 1);
}

// =============================================================================
// Budget and contention
// =============================================================================

#[tokio::test]
async fn entity_budget_defers_lower_ranked_goals() {
    let session = SessionId::new();
    let owner = EntityId::new();
    let mut high = goal(session, 1, owner, &["a", "b"]);
    high.priority = GoalPriority::High;
    let low = goal(session, 2, owner, &["a", "b"]);
    let other = goal(session, 3, EntityId::new(), &["a", "b"]);
    let (store, _world, scheduler) = setup(&[high, low, other], SchedulerConfig::default()).await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    assert!(result.step_for(GoalId(1)).is_some());
    assert!(result.step_for(GoalId(2)).is_none());
    assert!(result.step_for(GoalId(3)).is_some());

    let deferred = stored(&store, session, 2).await;
    assert_eq!(deferred.current_step, 0);
    assert_eq!(deferred.last_processed_turn, None);

    // Finishing the last step of the high goal uses the budget again.
    let result = scheduler.run_tick(session, 2).await.unwrap();
    assert_eq!(result.step_for(GoalId(1)).unwrap().new_status, GoalStatus::Completed);
    assert!(result.step_for(GoalId(2)).is_none());

    scheduler.run_tick(session, 3).await.unwrap();
    assert_eq!(stored(&store, session, 2).await.current_step, 1);
}

#[tokio::test]
async fn urgent_goals_bypass_budget() {
    let session = SessionId::new();
    let owner = EntityId::new();
    let mut first = goal(session, 1, owner, &["a", "b"]);
    first.priority = GoalPriority::Urgent;
    let mut second = goal(session, 2, owner, &["a", "b"]);
    second.priority = GoalPriority::Urgent;
    let third = goal(session, 3, owner, &["a", "b"]);
    let (_store, _world, scheduler) =
        setup(&[first, second, third], SchedulerConfig::default()).await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    assert!(result.step_for(GoalId(1)).is_some());
    assert!(result.step_for(GoalId(2)).is_some());
    // Urgent work does not consume the budget.
    assert!(result.step_for(GoalId(3)).is_some());
}

#[tokio::test]
async fn urgent_goals_respect_budget_when_bypass_disabled() {
    let session = SessionId::new();
    let owner = EntityId::new();
    let mut first = goal(session, 1, owner, &["a", "b"]);
    first.priority = GoalPriority::Urgent;
    let mut second = goal(session, 2, owner, &["a", "b"]);
    second.priority = GoalPriority::Urgent;
    let config = SchedulerConfig {
        urgent_bypasses_budget: false,
        ..SchedulerConfig::default()
    };
    let (_store, _world, scheduler) = setup(&[first, second], config).await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    assert!(result.step_for(GoalId(1)).is_some());
    assert!(result.step_for(GoalId(2)).is_none());
}

#[tokio::test]
async fn contested_target_goes_to_earliest_goal() {
    let session = SessionId::new();
    let mut early = goal(session, 1, EntityId::new(), &["seek sword", "take sword"]);
    early.target = String::from("unique_sword");
    early.priority = GoalPriority::High;
    early.created_turn = 5;
    let mut late = goal(session, 2, EntityId::new(), &["seek sword", "take sword"]);
    late.target = String::from("unique_sword");
    late.priority = GoalPriority::High;
    late.created_turn = 7;
    let (store, world, scheduler) = setup(&[late, early], SchedulerConfig::default()).await;
    world.set_exclusive("unique_sword").await;

    let result = scheduler.run_tick(session, 8).await.unwrap();
    assert!(result.is_clean());

    let winner = stored(&store, session, 1).await;
    assert_eq!(winner.status, GoalStatus::Active);
    assert_eq!(winner.current_step, 1);

    let loser = stored(&store, session, 2).await;
    assert_eq!(loser.status, GoalStatus::Blocked);
    assert_eq!(loser.current_step, 0);
    assert!(loser.blocked_reason.unwrap().contains("contested"));
}

#[tokio::test]
async fn budget_is_charged_only_to_contention_winners() {
    let session = SessionId::new();
    let owner = EntityId::new();
    let mut outranked = goal(session, 1, owner, &["a", "b"]);
    outranked.target = String::from("sword");
    outranked.priority = GoalPriority::High;
    let fallback = goal(session, 2, owner, &["a", "b"]);
    let mut rival = goal(session, 3, EntityId::new(), &["a", "b"]);
    rival.target = String::from("sword");
    rival.priority = GoalPriority::Urgent;
    let (store, world, scheduler) =
        setup(&[outranked, fallback, rival], SchedulerConfig::default()).await;
    world.set_exclusive("sword").await;

    scheduler.run_tick(session, 1).await.unwrap();
    assert_eq!(stored(&store, session, 1).await.status, GoalStatus::Blocked);
    assert_eq!(stored(&store, session, 3).await.current_step, 1);
    // The blocked goal spent nothing, so the entity still makes progress.
    assert_eq!(stored(&store, session, 2).await.current_step, 1);
}

#[tokio::test]
async fn priority_beats_age_in_contention() {
    let session = SessionId::new();
    let mut old = goal(session, 1, EntityId::new(), &["a", "b"]);
    old.target = String::from("throne");
    old.created_turn = 1;
    let mut urgent = goal(session, 2, EntityId::new(), &["a", "b"]);
    urgent.target = String::from("throne");
    urgent.priority = GoalPriority::Urgent;
    urgent.created_turn = 9;
    let (store, world, scheduler) = setup(&[old, urgent], generous_config()).await;
    world.set_exclusive("throne").await;

    scheduler.run_tick(session, 10).await.unwrap();
    assert_eq!(stored(&store, session, 2).await.current_step, 1);
    assert_eq!(stored(&store, session, 1).await.status, GoalStatus::Blocked);
}

#[tokio::test]
async fn shared_target_is_not_contested() {
    let session = SessionId::new();
    let mut a = goal(session, 1, EntityId::new(), &["a", "b"]);
    a.target = String::from("well");
    let mut b = goal(session, 2, EntityId::new(), &["a", "b"]);
    b.target = String::from("well");
    let (store, _world, scheduler) = setup(&[a, b], SchedulerConfig::default()).await;

    scheduler.run_tick(session, 1).await.unwrap();
    assert_eq!(stored(&store, session, 1).await.current_step, 1);
    assert_eq!(stored(&store, session, 2).await.current_step, 1);
}

// =============================================================================
// Determinism
// =============================================================================

#[tokio::test]
async fn identical_inputs_give_identical_results() {
    let session = SessionId::new();
    let owners = [EntityId::new(), EntityId::new(), EntityId::new()];
    let mut goals = Vec::new();
    for (i, owner) in (1_u64..).zip(owners.iter().cycle().take(9)) {
        let mut g = goal(session, i, *owner, &["scout", "approach", "claim"]);
        g.target = if i % 3 == 0 {
            String::from("relic")
        } else {
            format!("item-{i}")
        };
        g.priority = match i % 4 {
            0 => GoalPriority::Urgent,
            1 => GoalPriority::High,
            2 => GoalPriority::Medium,
            _ => GoalPriority::Low,
        };
        g.created_turn = i % 5;
        goals.push(g);
    }

    let mut results = Vec::new();
    for _ in 0..2 {
        let (_store, world, scheduler) = setup(&goals, SchedulerConfig::default()).await;
        world.set_exclusive("relic").await;
        world.block_step("approach", "guards posted").await;
        let mut run = Vec::new();
        for turn in 1..=4 {
            run.push(scheduler.run_tick(session, turn).await.unwrap());
        }
        results.push(run);
    }
    assert_eq!(results[0], results[1]);

    // Transitions are reported in goal id order.
    for result in &results[0] {
        let ids: Vec<GoalId> = result.goal_steps.iter().map(|s| s.goal_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}

// =============================================================================
// Failure isolation
// =============================================================================

#[tokio::test]
async fn world_query_failure_leaves_goal_untouched() {
    let session = SessionId::new();
    let broken = goal(session, 1, EntityId::new(), &["a", "b"]);
    let healthy = goal(session, 2, EntityId::new(), &["a", "b"]);
    let (store, world, scheduler) = setup(&[broken.clone(), healthy], SchedulerConfig::default()).await;
    world.fail_queries_for("goal-1").await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].goal_id, Some(GoalId(1)));
    assert_eq!(result.errors[0].kind, GoalErrorKind::WorldQuery);

    assert_eq!(stored(&store, session, 1).await, broken);
    assert_eq!(stored(&store, session, 2).await.current_step, 1);
}

#[tokio::test]
async fn slow_world_query_times_out_per_goal() {
    let session = SessionId::new();
    let slow = goal(session, 1, EntityId::new(), &["a", "b"]);
    let fast = goal(session, 2, EntityId::new(), &["a", "b"]);
    let config = SchedulerConfig {
        world_query_timeout_ms: 50,
        ..SchedulerConfig::default()
    };
    let (store, world, scheduler) = setup(&[slow, fast], config).await;
    world
        .stall_queries_for("goal-1", Duration::from_millis(500))
        .await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    let error = result
        .errors
        .iter()
        .find(|e| e.goal_id == Some(GoalId(1)))
        .expect("timeout recorded");
    assert_eq!(error.kind, GoalErrorKind::WorldQuery);
    assert!(error.message.contains("timed out"));

    assert_eq!(stored(&store, session, 1).await.current_step, 0);
    assert_eq!(stored(&store, session, 2).await.current_step, 1);
}

#[tokio::test]
async fn missing_snapshot_records_error_for_every_due_goal() {
    let session = SessionId::new();
    let a = goal(session, 1, EntityId::new(), &["a", "b"]);
    let mut b = goal(session, 2, EntityId::new(), &["a", "b"]);
    b.deadline = Some(0);
    let (store, world, scheduler) = setup(&[a, b], SchedulerConfig::default()).await;
    world.set_snapshot_unavailable(true).await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors.iter().all(|e| e.kind == GoalErrorKind::WorldQuery));

    // Deadlines do not depend on the world and still apply.
    assert_eq!(stored(&store, session, 1).await.current_step, 0);
    assert_eq!(stored(&store, session, 2).await.status, GoalStatus::Failed);
}

#[tokio::test]
async fn store_outage_aborts_tick_and_keeps_overrides() {
    let session = SessionId::new();
    let g = goal(session, 1, EntityId::new(), &["a", "b"]);
    let (store, _world, scheduler) = setup(&[g.clone()], SchedulerConfig::default()).await;
    scheduler
        .submit_override(
            session,
            OverrideRequest::Abandon {
                goal_key: String::from("goal-1"),
                reason: String::from("player cancelled"),
            },
        )
        .await;

    store.set_unavailable(true);
    let err = scheduler.run_tick(session, 1).await;
    assert!(matches!(err, Err(SchedulerError::Store { .. })));
    assert_eq!(scheduler.pending_overrides(session).await, 1);

    store.set_unavailable(false);
    assert_eq!(stored(&store, session, 1).await, g);

    scheduler.run_tick(session, 1).await.unwrap();
    assert_eq!(scheduler.pending_overrides(session).await, 0);
    let abandoned = stored(&store, session, 1).await;
    assert_eq!(abandoned.status, GoalStatus::Abandoned);
    assert_eq!(abandoned.outcome.as_deref(), Some("player cancelled"));
}

// =============================================================================
// Overrides
// =============================================================================

#[tokio::test]
async fn abandoned_goal_is_not_evaluated() {
    let session = SessionId::new();
    let g = goal(session, 1, EntityId::new(), &["a", "b"]);
    let (store, _world, scheduler) = setup(&[g], SchedulerConfig::default()).await;
    scheduler
        .submit_override(
            session,
            OverrideRequest::Abandon {
                goal_key: String::from("goal-1"),
                reason: String::from("gave up"),
            },
        )
        .await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    let step = result.step_for(GoalId(1)).unwrap();
    assert_eq!(step.new_status, GoalStatus::Abandoned);
    assert_eq!(step.new_step, 0);
    assert_eq!(stored(&store, session, 1).await.completed_turn, Some(1));
}

#[tokio::test]
async fn owner_death_abandons_every_open_goal() {
    let session = SessionId::new();
    let dead = EntityId::new();
    let alive = EntityId::new();
    let mut blocked = goal(session, 2, dead, &["a"]);
    blocked.status = GoalStatus::Blocked;
    blocked.blocked_reason = Some(String::from("waiting"));
    let goals = [
        goal(session, 1, dead, &["a", "b"]),
        blocked,
        goal(session, 3, alive, &["a", "b"]),
    ];
    let (store, _world, scheduler) = setup(&goals, generous_config()).await;
    scheduler
        .submit_override(
            session,
            OverrideRequest::AbandonOwnedBy {
                entity_id: dead,
                reason: String::from("owner died"),
            },
        )
        .await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    assert!(result.is_clean());
    assert_eq!(stored(&store, session, 1).await.status, GoalStatus::Abandoned);
    assert_eq!(stored(&store, session, 2).await.status, GoalStatus::Abandoned);
    assert_eq!(stored(&store, session, 3).await.status, GoalStatus::Active);
    assert_eq!(stored(&store, session, 3).await.current_step, 1);
}

#[tokio::test]
async fn override_on_terminal_goal_is_a_validation_error() {
    let session = SessionId::new();
    let mut done = goal(session, 1, EntityId::new(), &["a"]);
    done.status = GoalStatus::Completed;
    done.completed_turn = Some(0);
    done.outcome = Some(String::from("done"));
    let (store, _world, scheduler) = setup(&[done.clone()], SchedulerConfig::default()).await;
    scheduler
        .submit_override(
            session,
            OverrideRequest::Fail {
                goal_key: String::from("goal-1"),
                reason: String::from("too late"),
            },
        )
        .await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, GoalErrorKind::Validation);
    assert_eq!(result.errors[0].goal_id, Some(GoalId(1)));
    assert_eq!(stored(&store, session, 1).await, done);
}

#[tokio::test]
async fn annotate_rewrites_outcome_of_terminal_goal() {
    let session = SessionId::new();
    let mut done = goal(session, 1, EntityId::new(), &["a"]);
    done.status = GoalStatus::Failed;
    done.completed_turn = Some(0);
    done.outcome = Some(String::from("lost"));
    let (store, _world, scheduler) = setup(&[done], SchedulerConfig::default()).await;
    scheduler
        .submit_override(
            session,
            OverrideRequest::AnnotateOutcome {
                goal_key: String::from("goal-1"),
                outcome: String::from("lost to a rival"),
            },
        )
        .await;

    let result = scheduler.run_tick(session, 4).await.unwrap();
    assert!(result.is_clean());
    let annotated = stored(&store, session, 1).await;
    assert_eq!(annotated.status, GoalStatus::Failed);
    assert_eq!(annotated.completed_turn, Some(0));
    assert_eq!(annotated.outcome.as_deref(), Some("lost to a rival"));
}

#[tokio::test]
async fn annotated_open_goal_is_still_evaluated() {
    let session = SessionId::new();
    let g = goal(session, 1, EntityId::new(), &["a", "b"]);
    let (store, _world, scheduler) = setup(&[g], SchedulerConfig::default()).await;
    scheduler
        .submit_override(
            session,
            OverrideRequest::AnnotateOutcome {
                goal_key: String::from("goal-1"),
                outcome: String::from("the innkeeper is watching"),
            },
        )
        .await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    assert!(result.is_clean());
    let advanced = stored(&store, session, 1).await;
    assert_eq!(advanced.status, GoalStatus::Active);
    assert_eq!(advanced.current_step, 1);
    assert_eq!(advanced.last_processed_turn, Some(1));
    assert_eq!(advanced.outcome.as_deref(), Some("the innkeeper is watching"));
}

#[tokio::test]
async fn unknown_goal_key_is_not_found() {
    let session = SessionId::new();
    let (_store, _world, scheduler) = setup(&[], SchedulerConfig::default()).await;
    scheduler
        .submit_override(
            session,
            OverrideRequest::Abandon {
                goal_key: String::from("nope"),
                reason: String::from("typo"),
            },
        )
        .await;

    let result = scheduler.run_tick(session, 1).await.unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, GoalErrorKind::NotFound);
    assert_eq!(result.errors[0].goal_id, None);
}

#[tokio::test]
async fn overrides_are_scoped_to_their_session() {
    let session = SessionId::new();
    let other = SessionId::new();
    let g = goal(session, 1, EntityId::new(), &["a", "b"]);
    let (store, _world, scheduler) = setup(&[g], SchedulerConfig::default()).await;
    scheduler
        .submit_override(
            other,
            OverrideRequest::Abandon {
                goal_key: String::from("goal-1"),
                reason: String::from("wrong session"),
            },
        )
        .await;

    scheduler.run_tick(session, 1).await.unwrap();
    assert_eq!(stored(&store, session, 1).await.status, GoalStatus::Active);
    assert_eq!(scheduler.pending_overrides(other).await, 1);
}
