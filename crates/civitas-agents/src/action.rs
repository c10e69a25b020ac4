//! The per-agent action state machine.
//!
//! An agent is always in exactly one of three modes:
//!
//! - **Idle**: free to accept a new action once the cooldown has elapsed and
//!   no lock is active
//! - **Moving**: walking in a straight line towards the action's building
//! - **Acting**: performing the action until its planned duration elapses
//!
//! Timed actions are not slept on. [`ActionMachine::tick`] is polled by the
//! city loop with the current sim time and advances movement, completes
//! actions whose time is up, and resets anything that ran past its ceiling.
//! Polling is idempotent: ticking twice at the same instant changes nothing
//! the second time.
//!
//! Every way out of Moving or Acting returns to Idle, sets a cooldown, and
//! appends an outcome to the bounded [`ActionHistory`] together with the
//! measured change in agent state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use civitas_types::{ActionKind, ActionMode, BuildingId, Position};

use crate::config::BehaviorConfig;
use crate::error::ActionError;
use crate::state::{AgentState, StateDelta};

// ---------------------------------------------------------------------------
// Duration model
// ---------------------------------------------------------------------------

/// Lower bound of the random duration factor.
pub const DURATION_JITTER_MIN: f64 = 0.8;

/// Upper bound of the random duration factor.
pub const DURATION_JITTER_MAX: f64 = 1.2;

/// How agent state stretches or shortens an action.
///
/// `(energy / 100 + (1 - stress / 200)) / 2`, so a rested, calm agent scores
/// 1.0 and an exhausted, maximally stressed one 0.25.
pub fn state_adjustment(state: &AgentState) -> f64 {
    (state.energy / 100.0 + (1.0 - state.stress / 200.0)) / 2.0
}

/// Longest duration an action may be planned for.
///
/// Two thirds of the absolute ceiling, so the 1.5x timeout always fits.
pub const fn max_planned_duration(config: &BehaviorConfig) -> u64 {
    config.action_timeout_ms / 3 * 2
}

/// Plan how long an action will take, in sim milliseconds.
///
/// `base x U(0.8, 1.2) x state_adjustment / time_scale`, clamped to a
/// positive value no longer than [`max_planned_duration`].
pub fn plan_duration(
    kind: ActionKind,
    config: &BehaviorConfig,
    state: &AgentState,
    time_scale: f64,
    rng: &mut impl rand::Rng,
) -> u64 {
    let jitter = rng.random_range(DURATION_JITTER_MIN..=DURATION_JITTER_MAX);
    let scale = if time_scale.is_finite() && time_scale > 0.0 {
        time_scale
    } else {
        1.0
    };
    let base = u64_to_f64(config.durations.for_action(kind));
    let raw = base * jitter * state_adjustment(state) / scale;
    let ceiling = max_planned_duration(config).max(1);
    if raw.is_finite() {
        f64_to_u64(raw.round()).clamp(1, ceiling)
    } else {
        config.durations.for_action(kind).clamp(1, ceiling)
    }
}

/// Timeout for an action of the given planned duration: 1.5x the duration,
/// capped at the configured ceiling.
pub fn action_timeout(duration_ms: u64, config: &BehaviorConfig) -> u64 {
    let stretched = duration_ms.saturating_add(duration_ms / 2);
    stretched.min(config.action_timeout_ms)
}

#[allow(clippy::cast_precision_loss)]
const fn u64_to_f64(value: u64) -> f64 {
    value as f64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn f64_to_u64(value: f64) -> u64 {
    // Saturating float-to-int conversion; negatives become zero.
    value as u64
}

// ---------------------------------------------------------------------------
// Plans, history, and events
// ---------------------------------------------------------------------------

/// A decision resolved to a concrete place and duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// What to do.
    pub kind: ActionKind,
    /// Building it happens at.
    pub target: Option<BuildingId>,
    /// Display name of that building.
    pub target_name: Option<String>,
    /// Where to walk first. `None` means act in place.
    pub destination: Option<Position>,
    /// Planned duration in sim milliseconds.
    pub duration_ms: u64,
    /// Energy spent when the action starts.
    pub energy_cost: f64,
    /// Stress change applied on completion.
    pub stress_impact: f64,
    /// Why the agent is doing this.
    pub reason: String,
}

/// A finished action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedAction {
    /// Action kind.
    pub kind: ActionKind,
    /// Building it happened at.
    pub target: Option<BuildingId>,
    /// When acting began.
    pub started_ms: u64,
    /// When it finished.
    pub finished_ms: u64,
    /// Measured change in agent state, including the start cost.
    pub impact: StateDelta,
}

/// A failed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAction {
    /// Action kind.
    pub kind: ActionKind,
    /// Building it was meant to happen at.
    pub target: Option<BuildingId>,
    /// When it failed.
    pub failed_ms: u64,
    /// Why it failed.
    pub error: ActionError,
    /// Measured change in agent state before the failure.
    pub impact: StateDelta,
}

/// Bounded record of recent outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionHistory {
    /// Completed actions, oldest first.
    pub completed: VecDeque<CompletedAction>,
    /// Failed actions, oldest first.
    pub failed: VecDeque<FailedAction>,
}

impl ActionHistory {
    fn push_completed(&mut self, record: CompletedAction, cap: usize) {
        self.completed.push_back(record);
        while self.completed.len() > cap {
            self.completed.pop_front();
        }
    }

    fn push_failed(&mut self, record: FailedAction, cap: usize) {
        self.failed.push_back(record);
        while self.failed.len() > cap {
            self.failed.pop_front();
        }
    }
}

/// How a successful request proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStart {
    /// The action needs no travel and has started.
    Started,
    /// The agent is walking to the action's building.
    Moving,
    /// The agent was already at the building and has started acting.
    AlreadyThere,
}

/// What a poll of the state machine produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionEvent {
    /// Nothing changed.
    Nothing,
    /// The agent moved but has not arrived yet.
    Moved,
    /// The agent arrived and began acting.
    Arrived {
        /// Action kind.
        kind: ActionKind,
        /// Building arrived at.
        target: Option<BuildingId>,
    },
    /// The action finished successfully.
    Completed(CompletedAction),
    /// The move or action failed and the agent is idle again.
    Failed(FailedAction),
}

/// A temporary ban on starting new actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLock {
    /// Why the lock was taken.
    pub reason: String,
    /// Sim time at which it expires.
    pub until_ms: u64,
}

/// The move or action in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAction {
    /// The plan being carried out.
    pub plan: ActionPlan,
    /// Moving or Acting.
    pub mode: ActionMode,
    /// When the current mode was entered.
    pub phase_started_ms: u64,
    /// When movement was last advanced.
    last_step_ms: u64,
    /// State when acting began.
    before: AgentState,
}

// ---------------------------------------------------------------------------
// ActionMachine
// ---------------------------------------------------------------------------

/// The action state machine of a single agent.
#[derive(Debug, Clone, Default)]
pub struct ActionMachine {
    active: Option<ActiveAction>,
    last_action_ms: Option<u64>,
    cooldown_ms: u64,
    lock: Option<ActionLock>,
    history: ActionHistory,
}

impl ActionMachine {
    /// A fresh, idle machine with no cooldown.
    pub const fn new() -> Self {
        Self {
            active: None,
            last_action_ms: None,
            cooldown_ms: 0,
            lock: None,
            history: ActionHistory {
                completed: VecDeque::new(),
                failed: VecDeque::new(),
            },
        }
    }

    /// Rebuild an idle machine around a restored history.
    pub const fn with_history(history: ActionHistory) -> Self {
        Self {
            active: None,
            last_action_ms: None,
            cooldown_ms: 0,
            lock: None,
            history,
        }
    }

    /// Current mode.
    pub fn mode(&self) -> ActionMode {
        self.active.as_ref().map_or(ActionMode::Idle, |a| a.mode)
    }

    /// The move or action in progress.
    pub const fn active(&self) -> Option<&ActiveAction> {
        self.active.as_ref()
    }

    /// Outcome history.
    pub const fn history(&self) -> &ActionHistory {
        &self.history
    }

    /// The lock in force at `now_ms`, if any.
    pub fn lock(&self, now_ms: u64) -> Option<&ActionLock> {
        self.lock.as_ref().filter(|l| l.until_ms > now_ms)
    }

    /// Milliseconds left on the cooldown at `now_ms`.
    pub fn cooldown_remaining(&self, now_ms: u64) -> u64 {
        self.last_action_ms.map_or(0, |last| {
            let ready_at = last.saturating_add(self.cooldown_ms);
            ready_at.saturating_sub(now_ms)
        })
    }

    /// Check that a new action may start at `now_ms`.
    pub fn check_ready(&self, now_ms: u64) -> Result<(), ActionError> {
        if let Some(lock) = self.lock(now_ms) {
            return Err(ActionError::Locked {
                reason: lock.reason.clone(),
                until_ms: lock.until_ms,
            });
        }
        if let Some(active) = &self.active {
            return Err(ActionError::Busy {
                current: active.plan.kind,
            });
        }
        let remaining_ms = self.cooldown_remaining(now_ms);
        if remaining_ms > 0 {
            return Err(ActionError::Cooldown { remaining_ms });
        }
        Ok(())
    }

    /// Whether a new action may start at `now_ms`.
    pub fn can_act(&self, now_ms: u64) -> bool {
        self.check_ready(now_ms).is_ok()
    }

    /// Forbid new actions for `duration_ms`.
    pub fn lock_action(&mut self, now_ms: u64, reason: impl Into<String>, duration_ms: u64) {
        self.lock = Some(ActionLock {
            reason: reason.into(),
            until_ms: now_ms.saturating_add(duration_ms),
        });
    }

    /// Try to start a plan.
    ///
    /// Travel is needed when the plan has a destination further away than
    /// the arrival tolerance. Otherwise acting starts immediately and the
    /// plan's energy cost is charged to `state`.
    pub fn request_action(
        &mut self,
        now_ms: u64,
        plan: ActionPlan,
        position: Position,
        state: &mut AgentState,
        config: &BehaviorConfig,
    ) -> Result<ActionStart, ActionError> {
        self.check_ready(now_ms)?;

        let outcome = match plan.destination {
            None => ActionStart::Started,
            Some(dest) if position.distance_to(dest) <= config.arrival_tolerance => {
                ActionStart::AlreadyThere
            }
            Some(_) => ActionStart::Moving,
        };

        if outcome == ActionStart::Moving {
            self.active = Some(ActiveAction {
                plan,
                mode: ActionMode::Moving,
                phase_started_ms: now_ms,
                last_step_ms: now_ms,
                before: *state,
            });
        } else {
            self.begin_acting(now_ms, plan, state);
        }
        Ok(outcome)
    }

    fn begin_acting(&mut self, now_ms: u64, plan: ActionPlan, state: &mut AgentState) {
        let before = *state;
        *state = state.apply(StateDelta::energy_cost(plan.energy_cost));
        self.active = Some(ActiveAction {
            plan,
            mode: ActionMode::Acting,
            phase_started_ms: now_ms,
            last_step_ms: now_ms,
            before,
        });
    }

    /// Advance the machine to `now_ms`.
    ///
    /// Moves the agent, completes due actions, and resets anything past its
    /// ceiling. Expired locks are dropped.
    pub fn tick(
        &mut self,
        now_ms: u64,
        position: &mut Position,
        state: &mut AgentState,
        config: &BehaviorConfig,
    ) -> ActionEvent {
        if self.lock.as_ref().is_some_and(|l| l.until_ms <= now_ms) {
            self.lock = None;
        }

        let Some(active) = self.active.as_mut() else {
            return ActionEvent::Nothing;
        };
        let elapsed = now_ms.saturating_sub(active.phase_started_ms);

        match active.mode {
            ActionMode::Moving => {
                // Advance first: a late poll still covers the ground walked
                // since the last step. The timeout only applies while short.
                let mut moved = false;
                if let Some(dest) = active.plan.destination {
                    let step_ms = now_ms.saturating_sub(active.last_step_ms);
                    if step_ms > 0 {
                        active.last_step_ms = now_ms;
                        let max_step = config.movement_speed * u64_to_f64(step_ms) / 1000.0;
                        *position = position.step_towards(dest, max_step);
                        moved = true;
                    }
                    if position.distance_to(dest) <= config.arrival_tolerance {
                        *position = dest;
                        let plan = active.plan.clone();
                        let (kind, target) = (plan.kind, plan.target);
                        self.begin_acting(now_ms, plan, state);
                        return ActionEvent::Arrived { kind, target };
                    }
                }
                if elapsed > config.movement_timeout_ms {
                    let error = ActionError::ExecutionTimeout {
                        action: active.plan.kind,
                        elapsed_ms: elapsed,
                        limit_ms: config.movement_timeout_ms,
                    };
                    return self.fail_current(now_ms, error, state, config);
                }
                if moved {
                    ActionEvent::Moved
                } else {
                    ActionEvent::Nothing
                }
            }
            ActionMode::Acting => {
                let limit = action_timeout(active.plan.duration_ms, config);
                if elapsed > limit {
                    let error = ActionError::ExecutionTimeout {
                        action: active.plan.kind,
                        elapsed_ms: elapsed,
                        limit_ms: limit,
                    };
                    return self.fail_current(now_ms, error, state, config);
                }
                if elapsed < active.plan.duration_ms {
                    return ActionEvent::Nothing;
                }
                self.complete(now_ms, state, config)
            }
            ActionMode::Idle => ActionEvent::Nothing,
        }
    }

    fn complete(
        &mut self,
        now_ms: u64,
        state: &mut AgentState,
        config: &BehaviorConfig,
    ) -> ActionEvent {
        let Some(active) = self.active.take() else {
            return ActionEvent::Nothing;
        };
        let effect = StateDelta::on_completion(active.plan.kind)
            .plus(StateDelta::stress(active.plan.stress_impact));
        *state = state.apply(effect);

        let record = CompletedAction {
            kind: active.plan.kind,
            target: active.plan.target,
            started_ms: active.phase_started_ms,
            finished_ms: now_ms,
            impact: state.delta_since(active.before),
        };
        self.history
            .push_completed(record.clone(), config.completed_history_cap);
        self.last_action_ms = Some(now_ms);
        self.cooldown_ms = config.success_cooldown_ms;
        ActionEvent::Completed(record)
    }

    /// Abort the move or action in progress with `error`.
    ///
    /// The machine returns to Idle with the cooldown that matches the
    /// failure. Returns [`ActionEvent::Nothing`] when idle.
    fn fail_current(
        &mut self,
        now_ms: u64,
        error: ActionError,
        state: &AgentState,
        config: &BehaviorConfig,
    ) -> ActionEvent {
        let Some(active) = self.active.take() else {
            return ActionEvent::Nothing;
        };
        let impact = if active.mode == ActionMode::Acting {
            state.delta_since(active.before)
        } else {
            StateDelta::default()
        };
        let record = FailedAction {
            kind: active.plan.kind,
            target: active.plan.target,
            failed_ms: now_ms,
            error,
            impact,
        };
        self.finish_failure(now_ms, record.clone(), config);
        ActionEvent::Failed(record)
    }

    /// Record a failure that happened before anything started, such as no
    /// building being available. Blocked rejections are ignored.
    pub fn record_failure(
        &mut self,
        now_ms: u64,
        kind: ActionKind,
        error: ActionError,
        config: &BehaviorConfig,
    ) -> Option<FailedAction> {
        if error.is_blocked() {
            return None;
        }
        let record = FailedAction {
            kind,
            target: None,
            failed_ms: now_ms,
            error,
            impact: StateDelta::default(),
        };
        self.finish_failure(now_ms, record.clone(), config);
        Some(record)
    }

    fn finish_failure(&mut self, now_ms: u64, record: FailedAction, config: &BehaviorConfig) {
        self.cooldown_ms = match record.error {
            ActionError::NoSuitableTarget { .. } => config.no_target_cooldown_ms,
            ActionError::ExecutionError { .. } => config.error_cooldown_ms,
            ActionError::ExecutionTimeout { .. }
            | ActionError::Busy { .. }
            | ActionError::Cooldown { .. }
            | ActionError::Locked { .. } => config.failure_cooldown_ms,
        };
        self.last_action_ms = Some(now_ms);
        self.history.push_failed(record, config.failed_history_cap);
    }

    /// Force the machine back to Idle.
    ///
    /// Releases the lock and fails any move or action in progress with an
    /// [`ActionError::ExecutionError`] carrying `reason`, which puts the
    /// machine on the error cooldown. Returns [`ActionEvent::Nothing`] when
    /// nothing was in progress.
    pub fn reset(
        &mut self,
        now_ms: u64,
        reason: impl Into<String>,
        state: &AgentState,
        config: &BehaviorConfig,
    ) -> ActionEvent {
        self.lock = None;
        let Some(action) = self.active.as_ref().map(|a| a.plan.kind) else {
            return ActionEvent::Nothing;
        };
        let error = ActionError::ExecutionError {
            action,
            reason: reason.into(),
        };
        self.fail_current(now_ms, error, state, config)
    }

    /// Progress of the current action in `[0, 100]`. Zero unless acting.
    pub fn progress(&self, now_ms: u64) -> u8 {
        let Some(active) = self.active.as_ref() else {
            return 0;
        };
        if active.mode != ActionMode::Acting {
            return 0;
        }
        let duration = active.plan.duration_ms.max(1);
        let elapsed = now_ms.saturating_sub(active.phase_started_ms).min(duration);
        let pct = elapsed.saturating_mul(100) / duration;
        u8::try_from(pct.min(100)).unwrap_or(100)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn make_plan(kind: ActionKind, destination: Option<Position>, duration_ms: u64) -> ActionPlan {
        ActionPlan {
            kind,
            target: Some(BuildingId::new()),
            target_name: Some(String::from("Somewhere")),
            destination,
            duration_ms,
            energy_cost: 5.0,
            stress_impact: -5.0,
            reason: String::from("test"),
        }
    }

    fn make_tired_state() -> AgentState {
        AgentState {
            energy: 40.0,
            stress: 50.0,
            ..AgentState::default()
        }
    }

    #[test]
    fn fresh_machine_can_act() {
        let machine = ActionMachine::new();
        assert!(machine.can_act(0));
        assert_eq!(machine.mode(), ActionMode::Idle);
    }

    #[test]
    fn act_in_place_starts_immediately_and_charges_energy() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        let mut state = make_tired_state();
        let start = machine
            .request_action(0, make_plan(ActionKind::Rest, None, 1_000), Position::default(), &mut state, &config)
            .unwrap();
        assert_eq!(start, ActionStart::Started);
        assert_eq!(machine.mode(), ActionMode::Acting);
        assert!((state.energy - 35.0).abs() < 1e-9);
    }

    #[test]
    fn already_at_destination_skips_moving() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        let mut state = AgentState::default();
        let here = Position::new(5.0, 5.0);
        let start = machine
            .request_action(0, make_plan(ActionKind::Eat, Some(Position::new(5.5, 5.0)), 1_000), here, &mut state, &config)
            .unwrap();
        assert_eq!(start, ActionStart::AlreadyThere);
        assert_eq!(machine.mode(), ActionMode::Acting);
    }

    #[test]
    fn busy_machine_rejects_requests() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        let mut state = AgentState::default();
        machine
            .request_action(0, make_plan(ActionKind::Work, None, 1_000), Position::default(), &mut state, &config)
            .unwrap();
        let err = machine
            .request_action(10, make_plan(ActionKind::Eat, None, 1_000), Position::default(), &mut state, &config)
            .unwrap_err();
        assert_eq!(err, ActionError::Busy { current: ActionKind::Work });
    }

    #[test]
    fn cooldown_boundary() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        let mut state = AgentState::default();
        let mut pos = Position::default();
        machine
            .request_action(0, make_plan(ActionKind::Rest, None, 1_000), pos, &mut state, &config)
            .unwrap();
        let event = machine.tick(1_000, &mut pos, &mut state, &config);
        assert!(matches!(event, ActionEvent::Completed(_)));

        let ready_at = 1_000 + config.success_cooldown_ms;
        assert!(!machine.can_act(ready_at - 1));
        assert_eq!(machine.cooldown_remaining(ready_at - 1), 1);
        assert!(machine.can_act(ready_at));
    }

    #[test]
    fn lock_blocks_until_expiry() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        machine.lock_action(0, "being questioned", 2_000);
        let mut state = AgentState::default();
        let err = machine
            .request_action(1_999, make_plan(ActionKind::Rest, None, 1_000), Position::default(), &mut state, &config)
            .unwrap_err();
        assert!(matches!(err, ActionError::Locked { until_ms: 2_000, .. }));
        assert!(machine.can_act(2_000));
    }

    #[test]
    fn movement_reaches_destination_then_acts() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        let mut state = AgentState::default();
        let mut pos = Position::default();
        let dest = Position::new(90.0, 0.0);
        let start = machine
            .request_action(0, make_plan(ActionKind::Eat, Some(dest), 2_000), pos, &mut state, &config)
            .unwrap();
        assert_eq!(start, ActionStart::Moving);

        // 60 units per second: one second covers 60 of the 90 units.
        assert_eq!(machine.tick(1_000, &mut pos, &mut state, &config), ActionEvent::Moved);
        assert!((pos.x - 60.0).abs() < 1e-9);
        // Ticking again at the same instant changes nothing.
        assert_eq!(machine.tick(1_000, &mut pos, &mut state, &config), ActionEvent::Nothing);

        let event = machine.tick(2_000, &mut pos, &mut state, &config);
        assert!(matches!(event, ActionEvent::Arrived { kind: ActionKind::Eat, .. }));
        assert_eq!(pos, dest);
        assert_eq!(machine.mode(), ActionMode::Acting);

        assert_eq!(machine.progress(3_000), 50);
        let done = machine.tick(4_000, &mut pos, &mut state, &config);
        assert!(matches!(done, ActionEvent::Completed(_)));
        assert_eq!(machine.mode(), ActionMode::Idle);
    }

    #[test]
    fn movement_times_out() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        let mut state = AgentState::default();
        let mut pos = Position::default();
        let far = Position::new(100_000.0, 0.0);
        machine
            .request_action(0, make_plan(ActionKind::Work, Some(far), 1_000), pos, &mut state, &config)
            .unwrap();
        let event = machine.tick(config.movement_timeout_ms + 1, &mut pos, &mut state, &config);
        assert!(matches!(
            event,
            ActionEvent::Failed(FailedAction { error: ActionError::ExecutionTimeout { .. }, .. })
        ));
        assert_eq!(machine.mode(), ActionMode::Idle);
        assert_eq!(machine.history().failed.len(), 1);
    }

    #[test]
    fn late_poll_on_short_walk_still_arrives() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        let mut state = AgentState::default();
        let mut pos = Position::default();
        let dest = Position::new(90.0, 0.0);
        machine
            .request_action(0, make_plan(ActionKind::Eat, Some(dest), 2_000), pos, &mut state, &config)
            .unwrap();
        // The first poll comes after the movement timeout, but the walk
        // only needed 1.5 seconds.
        let now = config.movement_timeout_ms + 1;
        let event = machine.tick(now, &mut pos, &mut state, &config);
        assert!(matches!(event, ActionEvent::Arrived { kind: ActionKind::Eat, .. }));
        assert_eq!(pos, dest);
        assert_eq!(machine.mode(), ActionMode::Acting);
        assert!(machine.history().failed.is_empty());
    }

    #[test]
    fn watchdog_resets_overlong_action() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        let mut state = AgentState::default();
        let mut pos = Position::default();
        machine
            .request_action(0, make_plan(ActionKind::Work, None, 10_000), pos, &mut state, &config)
            .unwrap();
        // Polled far too late: elapsed exceeds 1.5x the planned duration.
        let event = machine.tick(15_001, &mut pos, &mut state, &config);
        let record = match event {
            ActionEvent::Failed(record) => record,
            other => panic!("Expected Failed, got {other:?}"),
        };
        assert!(matches!(record.error, ActionError::ExecutionTimeout { limit_ms: 15_000, .. }));
        assert_eq!(machine.mode(), ActionMode::Idle);
        assert_eq!(machine.cooldown_remaining(15_001), config.failure_cooldown_ms);
    }

    #[test]
    fn completion_applies_deltas_and_records_impact() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        let mut state = AgentState {
            energy: 15.0,
            stress: 50.0,
            ..AgentState::default()
        };
        let mut pos = Position::default();
        machine
            .request_action(0, make_plan(ActionKind::Rest, None, 1_000), pos, &mut state, &config)
            .unwrap();
        let event = machine.tick(1_000, &mut pos, &mut state, &config);
        // 15 - 5 cost + 30 rest.
        assert!((state.energy - 40.0).abs() < 1e-9);
        // 50 - 20 rest - 5 stress impact.
        assert!((state.stress - 25.0).abs() < 1e-9);
        let record = match event {
            ActionEvent::Completed(record) => record,
            other => panic!("Expected Completed, got {other:?}"),
        };
        assert!((record.impact.energy - 25.0).abs() < 1e-9);
        assert_eq!(machine.history().completed.len(), 1);
    }

    #[test]
    fn failures_set_matching_cooldowns() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        let record = machine.record_failure(
            100,
            ActionKind::Eat,
            ActionError::NoSuitableTarget { action: ActionKind::Eat },
            &config,
        );
        assert!(record.is_some());
        assert_eq!(machine.cooldown_remaining(100), config.no_target_cooldown_ms);

        let blocked = machine.record_failure(
            200,
            ActionKind::Eat,
            ActionError::Cooldown { remaining_ms: 1 },
            &config,
        );
        assert!(blocked.is_none());
        assert_eq!(machine.history().failed.len(), 1);
    }

    #[test]
    fn history_is_bounded() {
        let config = BehaviorConfig {
            success_cooldown_ms: 0,
            ..BehaviorConfig::default()
        };
        let mut machine = ActionMachine::new();
        let mut state = AgentState::default();
        let mut pos = Position::default();
        for i in 0..50_u64 {
            let now = i * 10;
            machine
                .request_action(now, make_plan(ActionKind::Relax, None, 5), pos, &mut state, &config)
                .unwrap();
            machine.tick(now + 5, &mut pos, &mut state, &config);
        }
        assert_eq!(machine.history().completed.len(), config.completed_history_cap);
    }

    #[test]
    fn reset_returns_to_idle_and_releases_lock() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        let mut state = AgentState::default();
        machine
            .request_action(0, make_plan(ActionKind::Work, None, 10_000), Position::default(), &mut state, &config)
            .unwrap();
        machine.lock_action(0, "meeting", 60_000);
        let event = machine.reset(10, "stuck", &state, &config);
        let record = match event {
            ActionEvent::Failed(record) => record,
            other => panic!("Expected Failed, got {other:?}"),
        };
        assert!(matches!(record.error, ActionError::ExecutionError { ref reason, .. } if reason == "stuck"));
        assert_eq!(machine.mode(), ActionMode::Idle);
        assert!(machine.lock(10).is_none());
        assert_eq!(machine.history().failed.len(), 1);
        assert_eq!(machine.cooldown_remaining(10), config.error_cooldown_ms);
    }

    #[test]
    fn reset_when_idle_only_releases_lock() {
        let config = BehaviorConfig::default();
        let mut machine = ActionMachine::new();
        machine.lock_action(0, "meeting", 60_000);
        let event = machine.reset(10, "stuck", &AgentState::default(), &config);
        assert_eq!(event, ActionEvent::Nothing);
        assert!(machine.can_act(10));
        assert!(machine.history().failed.is_empty());
    }

    #[test]
    fn work_duration_stays_within_jitter_band() {
        let config = BehaviorConfig::default();
        let state = make_tired_state();
        let adj = state_adjustment(&state);
        let base = 120_000.0;
        let mut rng = StdRng::seed_from_u64(7);
        for scale in [0.5, 1.0, 2.0, 5.0, 10.0] {
            for _ in 0..200 {
                let d = plan_duration(ActionKind::Work, &config, &state, scale, &mut rng);
                let d = u64_to_f64(d);
                let low = DURATION_JITTER_MIN * base / scale * adj;
                let high = DURATION_JITTER_MAX * base / scale * adj;
                assert!(d >= low.floor() && d <= high.ceil(), "{d} not in [{low}, {high}]");
            }
        }
    }

    #[test]
    fn duration_is_positive_and_capped() {
        let config = BehaviorConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let state = AgentState::default();
        let slow = plan_duration(ActionKind::Socialize, &config, &state, 0.0001, &mut rng);
        assert_eq!(slow, max_planned_duration(&config));
        let fast = plan_duration(ActionKind::Eat, &config, &state, 1e12, &mut rng);
        assert_eq!(fast, 1);
    }

    #[test]
    fn timeout_is_one_and_a_half_times_capped() {
        let config = BehaviorConfig::default();
        assert_eq!(action_timeout(10_000, &config), 15_000);
        assert_eq!(action_timeout(1_000_000, &config), config.action_timeout_ms);
    }
}
