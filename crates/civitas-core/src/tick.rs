//! Tick cycle: the loop that drives the city one step at a time.
//!
//! Each tick runs these phases in a fixed order:
//!
//! 1. **Clock** -- advance sim and game time. A paused tick stops here.
//! 2. **World** -- roll the weather and refresh every building's open
//!    state, condition, and service load.
//! 3. **Agents** -- for each agent in insertion order: apply natural drift,
//!    poll the action state machine, and if the agent is free, decide
//!    (urgent need, then oracle, then local fallback), pick a building, and
//!    request the action. A conversation started by an agent runs to
//!    completion before the next agent is processed.
//! 4. **Bookkeeping** -- forget idle relationships and count modes.
//!
//! A failure inside one agent's step is logged and recorded against that
//! agent; it never aborts the tick for the others.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use civitas_agents::{
    ActionError, ActionEvent, ActionPlan, ActionStart, Agent, AgentError, AgentSnapshot,
    BehaviorConfig, MemoryConfig, SocialConfig, fallback_building_kinds, fallback_decision,
    plan_duration, urgent_need,
};
use civitas_types::{
    ActionKind, ActionMode, AgentId, BuildingId, BuildingKind, Decision, DecisionContext,
    DecisionOrigin, Position, ServiceKind, Weather,
};
use civitas_world::{
    Building, BuildingRegistry, Presence, TargetQuery, WeatherSystem, WorldError, candidate_kinds,
    is_night,
};

use crate::clock::{CityClock, ClockAdvance, ClockError};
use crate::config::SimulationConfig;
use crate::decision::{DecisionOracle, OracleError, validate_decision, with_deadline};
use crate::interaction::{self, SocialError, SocialOutcome};

/// Radius of the "nearby buildings" list given to the oracle.
const CONTEXT_RADIUS: f64 = 200.0;
/// Buildings listed in a decision context.
const CONTEXT_BUILDINGS: usize = 8;
/// Memories listed in a decision context.
const CONTEXT_MEMORIES: usize = 5;

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// An agent operation failed.
    #[error("agent error for {agent_id}: {source}")]
    Agent {
        /// The agent that caused the error.
        agent_id: AgentId,
        /// The underlying agent error.
        source: AgentError,
    },

    /// A building operation failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// A conversation could not be carried out.
    #[error("social error: {source}")]
    Social {
        /// The underlying social error.
        #[from]
        source: SocialError,
    },

    /// An agent id does not belong to the city.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),
}

// ---------------------------------------------------------------------------
// CityState
// ---------------------------------------------------------------------------

/// The mutable simulation state passed through the tick cycle.
#[derive(Debug)]
pub struct CityState {
    /// The city clock.
    pub clock: CityClock,
    /// Every building.
    pub registry: BuildingRegistry,
    /// The weather system.
    pub weather: WeatherSystem,
    /// Action timing and state drift.
    pub behavior: BehaviorConfig,
    /// Memory capacities for new agents.
    pub memory: MemoryConfig,
    /// Partner discovery and social preconditions.
    pub social: SocialConfig,
    /// Hard deadline for every oracle call, in real milliseconds.
    pub oracle_timeout_ms: u64,
    /// Records of each kind in the render view.
    pub render_recent: usize,
    /// Residents in insertion order.
    agents: Vec<Agent>,
    /// Source of duration jitter.
    pub(crate) rng: StdRng,
}

impl CityState {
    /// Build a city from configuration and a building registry.
    ///
    /// Buildings are refreshed once so opening hours hold before the first
    /// tick.
    pub fn new(config: &SimulationConfig, registry: BuildingRegistry) -> Result<Self, ClockError> {
        let clock = CityClock::new(config.city.start_hour, config.city.time_scale)?;
        let mut state = Self {
            clock,
            registry,
            weather: WeatherSystem::new(config.city.seed, config.city.weather_change_chance),
            behavior: config.behavior.clone(),
            memory: config.memory,
            social: config.social,
            oracle_timeout_ms: config.oracle.timeout_ms,
            render_recent: config.city.render_recent,
            agents: Vec::new(),
            rng: StdRng::seed_from_u64(config.city.seed),
        };
        let hour = state.clock.game_hour();
        state.registry.refresh(hour, &[]);
        Ok(state)
    }

    /// Add a resident and place them in their home.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::DuplicateName`] if the name is taken. A home
    /// that cannot take the agent is logged and leaves them outside.
    pub fn add_agent(&mut self, mut agent: Agent) -> Result<AgentId, AgentError> {
        if self.agents.iter().any(|a| a.name == agent.name || a.id == agent.id) {
            return Err(AgentError::DuplicateName(agent.name));
        }
        if let Some(home) = agent.residence {
            match self.registry.try_enter(home, agent.id) {
                Ok(()) => agent.location = Some(home),
                Err(e) => warn!(agent_id = %agent.id, error = %e, "Agent could not enter home"),
            }
        }
        let id = agent.id;
        info!(agent_id = %id, name = %agent.name, occupation = %agent.occupation, "Agent joined the city");
        self.agents.push(agent);
        Ok(id)
    }

    /// Restore an agent from a snapshot.
    ///
    /// The snapshot's building is kept only if it still exists and has
    /// room; otherwise the agent stays where they are.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`] if no agent has the snapshot's
    /// id.
    pub fn restore_agent(&mut self, snapshot: AgentSnapshot) -> Result<(), AgentError> {
        let id = snapshot.id;
        let wanted = snapshot.location;
        let agent = self
            .agents
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AgentError::AgentNotFound(id))?;
        let current = agent.location;
        agent.restore(snapshot)?;
        agent.location = current;

        if let Some(target) = wanted {
            if wanted != current && self.registry.restore_occupant(id, current, target).is_ok() {
                agent.location = Some(target);
            }
        }
        Ok(())
    }

    /// Residents in insertion order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Look up an agent.
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Look up an agent for mutation.
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    /// Position of an agent in insertion order.
    pub(crate) fn index_of(&self, id: AgentId) -> Option<usize> {
        self.agents.iter().position(|a| a.id == id)
    }

    /// Replace the agent at `index`.
    pub(crate) fn put_agent(&mut self, index: usize, agent: Agent) {
        if let Some(slot) = self.agents.get_mut(index) {
            *slot = agent;
        }
    }

    // -------------------------------------------------------------------
    // Query surface
    // -------------------------------------------------------------------

    /// Agents within `radius` of `position`, nearest first.
    pub fn nearby_agents(&self, position: Position, radius: f64) -> Vec<&Agent> {
        let mut found: Vec<(f64, &Agent)> = self
            .agents
            .iter()
            .map(|a| (a.position.distance_to(position), a))
            .filter(|(d, _)| *d <= radius)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.into_iter().map(|(_, a)| a).collect()
    }

    /// Buildings within `radius` of `position`, nearest first.
    pub fn nearby_buildings(&self, position: Position, radius: f64) -> Vec<&Building> {
        self.registry.nearby_buildings(position, radius)
    }

    /// Buildings offering a service.
    pub fn buildings_by_service(&self, service: ServiceKind) -> Vec<&Building> {
        self.registry.buildings_by_service(service)
    }

    /// Current weather.
    pub const fn current_weather(&self) -> Weather {
        self.weather.current()
    }

    /// Current game hour.
    pub const fn game_hour(&self) -> u32 {
        self.clock.game_hour()
    }

    /// Every agent's building, with the service their action is using.
    fn presence(&self) -> Vec<Presence> {
        self.agents
            .iter()
            .filter_map(|agent| {
                let building = agent.location?;
                let service = agent
                    .machine()
                    .active()
                    .filter(|a| a.mode == ActionMode::Acting && a.plan.target == Some(building))
                    .map(|a| a.plan.kind.service());
                Some(Presence { building, service })
            })
            .collect()
    }

    /// Map an oracle target to a building: an id, a building name, or
    /// "home".
    fn resolve_building(&self, text: &str, residence: Option<BuildingId>) -> Option<BuildingId> {
        if let Some(id) = BuildingId::parse(text) {
            return self.registry.get(id).map(|b| b.id);
        }
        let lower = text.to_lowercase();
        if matches!(lower.as_str(), "home" | "residence" | "my home") {
            return residence;
        }
        self.registry
            .iter()
            .find(|b| b.name.to_lowercase() == lower)
            .map(|b| b.id)
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Summary of a single tick's execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Sim time at the end of the tick.
    pub now_ms: u64,
    /// Game clock as `HH:MM`.
    pub game_time: String,
    /// The weather during this tick.
    pub weather: Weather,
    /// Whether the weather changed this tick.
    pub weather_changed: bool,
    /// Whether the clock was paused.
    pub paused: bool,
    /// Decisions forced by an urgent need.
    pub urgent_decisions: u32,
    /// Decisions taken from the oracle.
    pub oracle_decisions: u32,
    /// Decisions from the local fallback.
    pub fallback_decisions: u32,
    /// Actions started or travel begun.
    pub actions_started: u32,
    /// Actions that completed.
    pub actions_completed: u32,
    /// Actions that failed, including ones that never found a building.
    pub actions_failed: u32,
    /// Conversations held.
    pub interactions: u32,
    /// Agents whose step raised an error.
    pub agent_errors: u32,
    /// Agents idle at the end of the tick.
    pub idle: u32,
    /// Agents walking at the end of the tick.
    pub moving: u32,
    /// Agents acting at the end of the tick.
    pub acting: u32,
}

impl TickSummary {
    /// Total decisions taken this tick.
    pub const fn decisions(&self) -> u32 {
        self.urgent_decisions
            .saturating_add(self.oracle_decisions)
            .saturating_add(self.fallback_decisions)
    }

    fn absorb(&mut self, step: &StepReport) {
        match step.decision {
            Some(DecisionOrigin::Urgent) => bump(&mut self.urgent_decisions),
            Some(DecisionOrigin::Oracle) => bump(&mut self.oracle_decisions),
            Some(DecisionOrigin::Fallback) => bump(&mut self.fallback_decisions),
            None => {}
        }
        if step.started {
            bump(&mut self.actions_started);
        }
        if step.completed {
            bump(&mut self.actions_completed);
        }
        self.actions_failed = self.actions_failed.saturating_add(step.failed);
        if step.interacted {
            bump(&mut self.interactions);
        }
    }
}

const fn bump(counter: &mut u32) {
    *counter = counter.saturating_add(1);
}

/// What happened to one agent during a tick.
#[derive(Debug, Default)]
struct StepReport {
    decision: Option<DecisionOrigin>,
    started: bool,
    completed: bool,
    failed: u32,
    interacted: bool,
}

/// A decision together with the building kinds it should be served by.
struct PlannedDecision {
    decision: Decision,
    preferred_kinds: Option<&'static [BuildingKind]>,
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// Execute one complete tick of the simulation.
///
/// `real_ms` is the wall time since the previous tick.
///
/// # Errors
///
/// Returns [`TickError::Clock`] if the clock cannot advance. Per-agent
/// errors are logged and counted in the summary.
pub async fn run_tick<O: DecisionOracle>(
    state: &mut CityState,
    oracle: &mut O,
    real_ms: u64,
) -> Result<TickSummary, TickError> {
    // --- Clock ---
    let advance = state.clock.advance(real_ms)?;
    let mut summary = TickSummary {
        tick: advance.tick,
        now_ms: advance.now_ms,
        game_time: state.clock.time_string(),
        weather: state.weather.current(),
        paused: state.clock.is_paused(),
        ..TickSummary::default()
    };
    if summary.paused {
        debug!(tick = advance.tick, "Tick skipped while paused");
        count_modes(state, &mut summary);
        return Ok(summary);
    }

    // --- World ---
    if let Some(weather) = state.weather.update(advance.tick) {
        info!(tick = advance.tick, weather = weather.as_str(), "Weather changed");
        summary.weather = weather;
        summary.weather_changed = true;
    }
    let presence = state.presence();
    state.registry.refresh(state.clock.game_hour(), &presence);

    // --- Agents ---
    let behavior = state.behavior.clone();
    let ids: Vec<AgentId> = state.agents.iter().map(|a| a.id).collect();
    for agent_id in ids {
        match step_agent(state, oracle, agent_id, &advance, &behavior).await {
            Ok(step) => summary.absorb(&step),
            Err(e) => {
                bump(&mut summary.agent_errors);
                warn!(tick = advance.tick, agent_id = %agent_id, error = %e, "Agent update failed");
                if recover_agent(state, agent_id, &e, &behavior) {
                    bump(&mut summary.actions_failed);
                }
            }
        }
    }

    // --- Bookkeeping ---
    for agent in &mut state.agents {
        let forgotten = agent.collect_idle_relationships(advance.now_ms);
        if !forgotten.is_empty() {
            debug!(agent_id = %agent.id, count = forgotten.len(), "Forgot idle relationships");
        }
    }
    count_modes(state, &mut summary);

    debug!(
        tick = summary.tick,
        decisions = summary.decisions(),
        started = summary.actions_started,
        completed = summary.actions_completed,
        failed = summary.actions_failed,
        interactions = summary.interactions,
        "Tick finished"
    );
    Ok(summary)
}

fn count_modes(state: &CityState, summary: &mut TickSummary) {
    for agent in &state.agents {
        match agent.machine().mode() {
            ActionMode::Idle => bump(&mut summary.idle),
            ActionMode::Moving => bump(&mut summary.moving),
            ActionMode::Acting => bump(&mut summary.acting),
        }
    }
}

/// Reset an agent whose step failed and hold it for the error cooldown.
///
/// Returns whether an action in progress was abandoned.
fn recover_agent(
    state: &mut CityState,
    agent_id: AgentId,
    error: &TickError,
    behavior: &BehaviorConfig,
) -> bool {
    let now_ms = state.clock.now_ms();
    let Some(agent) = state.agent_mut(agent_id) else {
        return false;
    };
    let was_moving = agent.machine().mode() == ActionMode::Moving;
    let event = agent.reset(now_ms, error.to_string(), behavior);
    agent.lock_action(now_ms, "recovering from an update error", behavior.error_cooldown_ms);
    let ActionEvent::Failed(record) = event else {
        return false;
    };
    if was_moving {
        vacate_unreached(state, agent_id, record.target);
    }
    true
}

/// Give up a seat reserved for a destination the agent never reached.
///
/// The agent is left outside any building.
fn vacate_unreached(state: &mut CityState, agent_id: AgentId, target: Option<BuildingId>) {
    let Some(agent) = state.agent_mut(agent_id) else {
        return;
    };
    let Some(target) = target.filter(|t| agent.location == Some(*t)) else {
        return;
    };
    agent.location = None;
    if let Err(e) = state.registry.leave(target, agent_id) {
        debug!(agent_id = %agent_id, error = %e, "Release of unreserved building");
    }
}

/// Run one agent's share of a tick.
async fn step_agent<O: DecisionOracle>(
    state: &mut CityState,
    oracle: &mut O,
    agent_id: AgentId,
    advance: &ClockAdvance,
    behavior: &BehaviorConfig,
) -> Result<StepReport, TickError> {
    let now_ms = advance.now_ms;
    let mut report = StepReport::default();

    let agent = state
        .agent_mut(agent_id)
        .ok_or(TickError::AgentNotFound(agent_id))?;
    agent.drift(advance.game_minutes, behavior);
    let was_moving = agent.machine().mode() == ActionMode::Moving;
    match agent.tick_action(now_ms, behavior) {
        ActionEvent::Completed(record) => {
            report.completed = true;
            debug!(agent_id = %agent_id, action = %record.kind, "Action completed");
        }
        ActionEvent::Failed(record) => {
            report.failed = 1;
            warn!(agent_id = %agent_id, action = %record.kind, error = %record.error, "Action failed");
            if was_moving {
                vacate_unreached(state, agent_id, record.target);
            }
        }
        ActionEvent::Arrived {
            kind: ActionKind::Socialize,
            target,
        } => {
            report.interacted = socialize(state, oracle, agent_id, target).await?;
        }
        ActionEvent::Arrived { .. } | ActionEvent::Moved | ActionEvent::Nothing => {}
    }

    let agent = state
        .agent(agent_id)
        .ok_or(TickError::AgentNotFound(agent_id))?;
    if !agent.can_act(now_ms, behavior) {
        return Ok(report);
    }

    let planned = decide(state, oracle, agent_id).await?;
    report.decision = Some(planned.decision.origin);
    state
        .agent_mut(agent_id)
        .ok_or(TickError::AgentNotFound(agent_id))?
        .record_decision(now_ms, planned.decision.clone(), behavior)
        .map_err(|source| TickError::Agent { agent_id, source })?;

    execute_decision(state, oracle, agent_id, planned, behavior, &mut report).await?;
    Ok(report)
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Decide what an agent does next.
///
/// An urgent need wins outright. Otherwise the oracle is asked under the
/// hard deadline; any failure or invalid answer falls back to the local
/// rule.
async fn decide<O: DecisionOracle>(
    state: &CityState,
    oracle: &mut O,
    agent_id: AgentId,
) -> Result<PlannedDecision, TickError> {
    let agent = state
        .agent(agent_id)
        .ok_or(TickError::AgentNotFound(agent_id))?;

    if let Some(need) = urgent_need(agent.state(), &state.behavior.urgency) {
        info!(agent_id = %agent_id, action = %need.action(), reason = need.reason(), "Urgent need");
        return Ok(PlannedDecision {
            decision: need.decision(agent.residence),
            preferred_kinds: Some(need.building_kinds()),
        });
    }

    let context = decision_context(state, agent);
    let answer = with_deadline(state.oracle_timeout_ms, oracle.get_decision(&context)).await;
    let residence = agent.residence;
    let decision = match answer {
        Ok(payload) => {
            match validate_decision(payload, |t| state.resolve_building(t, residence)) {
                Ok(decision) => Some(decision),
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "Invalid decision from oracle");
                    None
                }
            }
        }
        Err(OracleError::Unavailable { reason }) => {
            debug!(agent_id = %agent_id, reason = %reason, "Oracle unavailable");
            None
        }
        Err(e) => {
            warn!(agent_id = %agent_id, error = %e, "Oracle call failed");
            None
        }
    };

    Ok(decision.map_or_else(
        || {
            let decision = fallback_decision(agent.state(), residence);
            let kinds = fallback_building_kinds(decision.action);
            PlannedDecision {
                decision,
                preferred_kinds: (!kinds.is_empty()).then_some(kinds),
            }
        },
        |decision| PlannedDecision {
            decision,
            preferred_kinds: None,
        },
    ))
}

/// What the oracle is told about an agent.
fn decision_context(state: &CityState, agent: &Agent) -> DecisionContext {
    let slot = state.clock.time_slot();
    DecisionContext {
        agent_id: agent.id,
        name: agent.name.clone(),
        occupation: agent.occupation.clone(),
        location: agent
            .location
            .and_then(|id| state.registry.name_of(id))
            .map(String::from),
        residence: agent.residence,
        game_time: state.clock.time_string(),
        time_slot: slot,
        weather: state.weather.current(),
        needs: agent.state().need_summary(),
        nearby_buildings: state
            .registry
            .nearby_buildings(agent.position, CONTEXT_RADIUS)
            .into_iter()
            .filter(|b| b.is_open())
            .take(CONTEXT_BUILDINGS)
            .map(|b| format!("{} {} ({})", b.id, b.name, b.kind))
            .collect(),
        planned_activities: agent.schedule.activities(slot).to_vec(),
        recent_memories: agent
            .memory()
            .recent(CONTEXT_MEMORIES)
            .into_iter()
            .map(|m| m.content.clone())
            .collect(),
    }
}

/// Pick the building a decision will be carried out at.
///
/// A named target is used if it can take the agent. An agent already in a
/// fitting open building stays there. Otherwise the decision's preferred
/// kinds are searched first, then the day/night table for the action.
fn resolve_target(state: &CityState, agent: &Agent, planned: &PlannedDecision) -> Option<BuildingId> {
    let action = planned.decision.action;
    if let Some(target) = planned.decision.target {
        if state.registry.accepts(target, agent.id) {
            return Some(target);
        }
    }

    let hour = state.clock.game_hour();
    let kinds = planned
        .preferred_kinds
        .unwrap_or_else(|| candidate_kinds(action, is_night(hour)));
    let here = agent.location.and_then(|id| state.registry.get(id));
    if let Some(building) = here {
        if building.is_open() && building.offers(action.service()) && kinds.contains(&building.kind) {
            return Some(building.id);
        }
    }

    let familiar = agent.familiar_places();
    let query = TargetQuery {
        action,
        from: agent.position,
        hour,
        kinds: planned.preferred_kinds,
        familiar: &familiar,
    };
    state
        .registry
        .find_suitable(&query)
        .or_else(|| {
            planned.preferred_kinds.and_then(|_| {
                state.registry.find_suitable(&TargetQuery {
                    kinds: None,
                    ..query
                })
            })
        })
        .map(|b| b.id)
}

/// Reserve a building and hand the plan to the action state machine.
async fn execute_decision<O: DecisionOracle>(
    state: &mut CityState,
    oracle: &mut O,
    agent_id: AgentId,
    planned: PlannedDecision,
    behavior: &BehaviorConfig,
    report: &mut StepReport,
) -> Result<(), TickError> {
    let now_ms = state.clock.now_ms();
    let kind = planned.decision.action;
    let agent = state
        .agent(agent_id)
        .ok_or(TickError::AgentNotFound(agent_id))?;
    let previous = agent.location;
    let agent_state = *agent.state();

    let Some(target) = resolve_target(state, agent, &planned) else {
        warn!(agent_id = %agent_id, action = %kind, "No suitable building");
        fail_before_start(state, agent_id, kind, ActionError::NoSuitableTarget { action: kind }, behavior);
        report.failed = report.failed.saturating_add(1);
        return Ok(());
    };

    if let Err(e) = state.registry.relocate(agent_id, previous, target) {
        warn!(agent_id = %agent_id, action = %kind, error = %e, "Could not reserve building");
        let failure = ActionError::ExecutionError {
            action: kind,
            reason: e.to_string(),
        };
        fail_before_start(state, agent_id, kind, failure, behavior);
        report.failed = report.failed.saturating_add(1);
        return Ok(());
    }
    let (destination, target_name) = state
        .registry
        .get(target)
        .map(|b| (b.position, b.name.clone()))
        .ok_or(WorldError::BuildingNotFound(target))?;

    let duration_ms = plan_duration(
        kind,
        behavior,
        &agent_state,
        state.clock.time_scale(),
        &mut state.rng,
    );
    let plan = ActionPlan {
        kind,
        target: Some(target),
        target_name: Some(target_name.clone()),
        destination: Some(destination),
        duration_ms,
        energy_cost: planned.decision.energy_cost,
        stress_impact: planned.decision.stress_impact,
        reason: planned.decision.reason,
    };

    let agent = state
        .agent_mut(agent_id)
        .ok_or(TickError::AgentNotFound(agent_id))?;
    agent.location = Some(target);
    match agent.request_action(now_ms, plan, behavior) {
        Ok(start) => {
            report.started = true;
            info!(
                agent_id = %agent_id,
                action = %kind,
                target = %target_name,
                duration_ms,
                moving = start == ActionStart::Moving,
                "Action started"
            );
            if kind == ActionKind::Socialize && start != ActionStart::Moving {
                report.interacted = socialize(state, oracle, agent_id, Some(target)).await?;
            }
        }
        Err(e) => {
            if e.is_blocked() {
                debug!(agent_id = %agent_id, action = %kind, reason = %e, "Action blocked");
            } else {
                warn!(agent_id = %agent_id, action = %kind, error = %e, "Action rejected");
                agent.record_failure(now_ms, kind, e, behavior);
                report.failed = report.failed.saturating_add(1);
            }
            agent.location = previous;
            release(state, agent_id, target, previous);
        }
    }
    Ok(())
}

/// Record a failure for an action that never started.
fn fail_before_start(
    state: &mut CityState,
    agent_id: AgentId,
    kind: ActionKind,
    error: ActionError,
    behavior: &BehaviorConfig,
) {
    let now_ms = state.clock.now_ms();
    if let Some(agent) = state.agent_mut(agent_id) {
        agent.record_failure(now_ms, kind, error, behavior);
    }
}

/// Undo a reservation at `target`, moving the agent back to `previous`.
fn release(state: &mut CityState, agent_id: AgentId, target: BuildingId, previous: Option<BuildingId>) {
    if previous == Some(target) {
        return;
    }
    if let Some(old) = previous {
        if state.registry.try_enter(old, agent_id).is_err() {
            debug!(agent_id = %agent_id, building = %old, "Previous building no longer has room");
            if let Some(agent) = state.agent_mut(agent_id) {
                agent.location = Some(target);
            }
            return;
        }
    }
    if let Err(e) = state.registry.leave(target, agent_id) {
        debug!(agent_id = %agent_id, error = %e, "Release of unreserved building");
    }
}

/// Run the social protocol for an agent that is ready to socialize.
async fn socialize<O: DecisionOracle>(
    state: &mut CityState,
    oracle: &mut O,
    agent_id: AgentId,
    venue: Option<BuildingId>,
) -> Result<bool, TickError> {
    match interaction::interact(state, oracle, agent_id, venue).await? {
        SocialOutcome::Interacted(done) => {
            info!(
                agent_id = %agent_id,
                partner = %done.partner,
                topic = %done.conversation.topic,
                mood = done.conversation.mood.as_str(),
                change = done.change,
                "Conversation held"
            );
            Ok(true)
        }
        other => {
            debug!(agent_id = %agent_id, outcome = ?other, "No conversation");
            Ok(false)
        }
    }
}
