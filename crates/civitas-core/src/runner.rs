//! Simulation loop runner with operator controls.
//!
//! This module provides [`run_simulation`], the top-level async function
//! that drives the tick loop with support for:
//!
//! - **Bounded simulation**: stop after `max_ticks` or `max_real_time_seconds`
//! - **Pause/resume**: the clock freezes while ticks keep counting
//! - **Time scale**: applied to the clock between ticks
//! - **Periodic snapshots**: every `interval_ticks`, plus one at the end
//! - **Operator stop**: clean stop before the next tick
//!
//! The runner wraps the single-tick [`run_tick`] function and adds the
//! control plane around it.
//!
//! [`run_tick`]: crate::tick::run_tick

use std::sync::Arc;

use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use crate::decision::DecisionOracle;
use crate::operator::{OperatorState, SimulationEndReason};
use crate::persistence::{Persistence, SnapshotStore};
use crate::tick::{self, CityState, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
}

/// Callback invoked after each tick completes.
///
/// The render layer hooks in here to build its
/// [`CityView`](civitas_types::CityView) after every tick.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &CityState);
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &CityState) {}
}

/// Apply pending operator signals to the city clock.
fn sync_operator(state: &mut CityState, operator: &OperatorState) {
    if let Some(scale) = operator.take_time_scale() {
        let applied = state.clock.set_time_scale(scale);
        info!(requested = scale, applied, "Time scale changed");
    }

    match (operator.is_paused(), state.clock.is_paused()) {
        (true, false) => {
            state.clock.pause();
            info!(tick = state.clock.tick(), "Simulation paused");
        }
        (false, true) => {
            state.clock.resume();
            info!(tick = state.clock.tick(), "Simulation resumed");
        }
        _ => {}
    }
}

/// Run the simulation loop until a termination condition is met.
///
/// # Arguments
///
/// * `state` - Mutable city state (clock, buildings, agents)
/// * `oracle` - Source of agent decisions and conversations
/// * `operator` - Shared operator control state
/// * `persistence` - Snapshot policy; saved periodically and at the end
/// * `callback` - Called after each tick for render updates
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick execution fails unrecoverably.
pub async fn run_simulation<O, S>(
    state: &mut CityState,
    oracle: &mut O,
    operator: &Arc<OperatorState>,
    persistence: &mut Persistence<S>,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError>
where
    O: DecisionOracle,
    S: SnapshotStore,
{
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;
    let mut last_tick_at = Instant::now();

    info!(
        max_ticks = operator.max_ticks(),
        max_real_time_seconds = operator.max_real_time_seconds(),
        tick_interval_ms = operator.tick_interval_ms(),
        "Simulation starting"
    );

    let end_reason = loop {
        sync_operator(state, operator);

        // --- Check stop request (before tick) ---
        if operator.is_stop_requested() {
            info!("Operator stop requested");
            break SimulationEndReason::OperatorStop;
        }

        // --- Check time limit (before tick) ---
        if operator.time_limit_reached() {
            info!(
                max_seconds = operator.max_real_time_seconds(),
                elapsed = operator.elapsed_seconds(),
                "Real-time limit reached"
            );
            break SimulationEndReason::MaxRealTimeReached;
        }

        // --- Execute tick ---
        let now = Instant::now();
        let real_ms = u64::try_from(now.duration_since(last_tick_at).as_millis()).unwrap_or(u64::MAX);
        last_tick_at = now;

        let summary = tick::run_tick(state, oracle, real_ms).await?;
        total_ticks = total_ticks.saturating_add(1);

        // --- Notify callback ---
        callback.on_tick(&summary, state);

        // --- Periodic snapshot ---
        persistence.save_if_due(summary.tick, state).await;

        // --- Check tick limit (after tick) ---
        if operator.tick_limit_reached(summary.tick) {
            info!(
                tick = summary.tick,
                max_ticks = operator.max_ticks(),
                "Tick limit reached"
            );
            last_summary = Some(summary);
            break SimulationEndReason::MaxTicksReached;
        }

        last_summary = Some(summary);

        // --- Sleep for tick interval ---
        let interval_ms = operator.tick_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    };

    operator.set_end_reason(end_reason).await;
    persistence.save(state).await;
    oracle.shutdown().await;

    Ok(SimulationResult {
        end_reason,
        final_summary: last_summary,
        total_ticks,
    })
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            game_time = %summary.game_time,
            weather = summary.weather.as_str(),
            idle = summary.idle,
            moving = summary.moving,
            acting = summary.acting,
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use civitas_agents::{Agent, AgentSpawn};
    use civitas_types::{DailySchedule, Personality, Position};
    use civitas_world::create_starting_city;

    use super::*;
    use crate::config::{SimulationBoundsConfig, SimulationConfig};
    use crate::decision::OfflineOracle;
    use crate::persistence::MemorySnapshotStore;

    fn make_state() -> CityState {
        let (registry, ids) = create_starting_city().unwrap();
        let mut state = CityState::new(&SimulationConfig::default(), registry).unwrap();
        for (index, name) in ["Ada", "Ben"].into_iter().enumerate() {
            let residence = ids.residences.get(index).copied();
            let agent = Agent::new(
                AgentSpawn {
                    name: String::from(name),
                    occupation: String::from("clerk"),
                    position: Position::new(0.0, 0.0),
                    residence,
                    workplace: None,
                    personality: Personality::default(),
                    schedule: DailySchedule::default(),
                },
                state.memory,
            );
            state.add_agent(agent).unwrap();
        }
        state
    }

    fn make_operator(max_ticks: u64) -> Arc<OperatorState> {
        let bounds = SimulationBoundsConfig {
            max_ticks,
            max_real_time_seconds: 0,
        };
        Arc::new(OperatorState::new(0, &bounds))
    }

    struct CountingCallback {
        ticks: Vec<u64>,
    }

    impl TickCallback for CountingCallback {
        fn on_tick(&mut self, summary: &TickSummary, _state: &CityState) {
            self.ticks.push(summary.tick);
        }
    }

    #[tokio::test]
    async fn bounded_by_max_ticks() {
        let mut state = make_state();
        let operator = make_operator(5);
        let mut persistence = Persistence::new(MemorySnapshotStore::new(), 0);

        let result = run_simulation(
            &mut state,
            &mut OfflineOracle,
            &operator,
            &mut persistence,
            &mut NoOpCallback,
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert_eq!(result.final_summary.unwrap().tick, 5);
        assert_eq!(
            operator.end_reason().await,
            Some(SimulationEndReason::MaxTicksReached)
        );
    }

    #[tokio::test]
    async fn operator_stop_before_first_tick() {
        let mut state = make_state();
        let operator = make_operator(0);
        operator.request_stop();
        let mut persistence = Persistence::new(MemorySnapshotStore::new(), 0);

        let result = run_simulation(
            &mut state,
            &mut OfflineOracle,
            &operator,
            &mut persistence,
            &mut NoOpCallback,
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::OperatorStop);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
    }

    #[tokio::test]
    async fn tick_callback_is_called() {
        let mut state = make_state();
        let operator = make_operator(3);
        let mut persistence = Persistence::new(MemorySnapshotStore::new(), 0);
        let mut callback = CountingCallback { ticks: Vec::new() };

        run_simulation(
            &mut state,
            &mut OfflineOracle,
            &operator,
            &mut persistence,
            &mut callback,
        )
        .await
        .unwrap();

        assert_eq!(callback.ticks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn snapshot_saved_at_interval_and_end() {
        let mut state = make_state();
        let operator = make_operator(4);
        let mut persistence = Persistence::new(MemorySnapshotStore::new(), 2);

        run_simulation(
            &mut state,
            &mut OfflineOracle,
            &operator,
            &mut persistence,
            &mut NoOpCallback,
        )
        .await
        .unwrap();

        // One city key plus one key per agent.
        assert_eq!(persistence.store().len(), 3);
    }

    #[tokio::test]
    async fn paused_run_keeps_counting_ticks() {
        let mut state = make_state();
        let operator = make_operator(3);
        operator.pause();
        let mut persistence = Persistence::new(MemorySnapshotStore::new(), 0);

        let result = run_simulation(
            &mut state,
            &mut OfflineOracle,
            &operator,
            &mut persistence,
            &mut NoOpCallback,
        )
        .await
        .unwrap();

        assert_eq!(result.total_ticks, 3);
        assert!(result.final_summary.unwrap().paused);
        assert!(state.clock.is_paused());
        assert_eq!(state.clock.now_ms(), 0);
    }

    #[tokio::test]
    async fn time_scale_signal_reaches_clock() {
        let mut state = make_state();
        let operator = make_operator(1);
        assert!(operator.set_time_scale(4.0));
        let mut persistence = Persistence::new(MemorySnapshotStore::new(), 0);

        run_simulation(
            &mut state,
            &mut OfflineOracle,
            &operator,
            &mut persistence,
            &mut NoOpCallback,
        )
        .await
        .unwrap();

        assert!((state.clock.time_scale() - 4.0).abs() < f64::EPSILON);
        assert_eq!(operator.take_time_scale(), None);
    }
}
