//! Multi-session runner.
//!
//! [`run_sessions`] drives several independent sessions in lockstep, one
//! turn at a time, with every session's turn running concurrently. Sessions
//! share no mutable state; a session whose turn fails is retried on the
//! next turn while the others carry on.

use std::time::Duration;

use futures::future::join_all;
use lifeweave_needs::NeedsStore;
use lifeweave_types::SessionId;
use tracing::{info, warn};

use crate::config::SimulationConfig;
use crate::driver::{TurnDriver, TurnReport};
use crate::oracle::StrategyOracle;
use crate::store::GoalStore;
use crate::world::WorldStateQuery;

/// Callback invoked after each session turn completes.
pub trait TurnCallback: Send {
    /// Called once per session per successful turn, in driver order.
    fn on_turn(&mut self, session_id: SessionId, turn: u64, report: &TurnReport);
}

/// A no-op turn callback for testing.
pub struct NoOpCallback;

impl TurnCallback for NoOpCallback {
    fn on_turn(&mut self, _session_id: SessionId, _turn: u64, _report: &TurnReport) {}
}

/// Totals from a [`run_sessions`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Turns run (each turn covers every session).
    pub turns_run: u64,
    /// Session turns that completed.
    pub session_turns_completed: u64,
    /// Session turns that failed and were skipped.
    pub session_turns_failed: u64,
}

/// Run every driver from `start_turn` for `config.max_turns` turns.
///
/// Each turn advances `config.minutes_per_turn` minutes of simulated time
/// and sleeps `config.turn_interval_ms` afterwards.
pub async fn run_sessions<S, W, O, N>(
    drivers: &[TurnDriver<S, W, O, N>],
    config: &SimulationConfig,
    start_turn: u64,
    callback: &mut dyn TurnCallback,
) -> RunSummary
where
    S: GoalStore,
    W: WorldStateQuery,
    O: StrategyOracle,
    N: NeedsStore,
{
    let mut summary = RunSummary::default();
    info!(
        sessions = drivers.len(),
        start_turn,
        max_turns = config.max_turns,
        minutes_per_turn = config.minutes_per_turn,
        "simulation starting"
    );

    for offset in 0..config.max_turns {
        let Some(turn) = start_turn.checked_add(offset) else {
            warn!(start_turn, offset, "turn counter overflow, stopping");
            break;
        };

        let outcomes = join_all(
            drivers
                .iter()
                .map(|driver| driver.run_turn(turn, config.minutes_per_turn)),
        )
        .await;

        for (driver, outcome) in drivers.iter().zip(outcomes) {
            match outcome {
                Ok(report) => {
                    summary.session_turns_completed =
                        summary.session_turns_completed.saturating_add(1);
                    callback.on_turn(driver.session_id(), turn, &report);
                }
                Err(e) => {
                    summary.session_turns_failed = summary.session_turns_failed.saturating_add(1);
                    warn!(session = %driver.session_id(), turn, error = %e, "session turn failed");
                }
            }
        }
        summary.turns_run = summary.turns_run.saturating_add(1);

        if config.turn_interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.turn_interval_ms)).await;
        }
    }

    info!(
        turns_run = summary.turns_run,
        completed = summary.session_turns_completed,
        failed = summary.session_turns_failed,
        "simulation ended"
    );
    summary
}
