//! The agent aggregate.
//!
//! An [`Agent`] bundles identity, position, state, the action state
//! machine, memory, and the decision and interaction logs. It keeps its
//! parts consistent: every action outcome is also written to memory, and
//! every decision respects the think cooldown.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use civitas_types::{
    ActionKind, ActivityLine, AgentId, AgentView, BuildingId, Conversation, DailySchedule,
    Decision, MemoryKind, Mood, Personality, Position,
};

use crate::action::{ActionEvent, ActionHistory, ActionMachine, ActionPlan, ActionStart};
use crate::config::{BehaviorConfig, MemoryConfig};
use crate::error::{ActionError, AgentError};
use crate::memory::{MemoryEntry, MemorySnapshot, MemoryStore};
use crate::social::{InteractionRecord, SocialProfile};
use crate::state::{AgentState, StateDelta};

/// Interaction lines kept per agent.
const INTERACTION_LOG_CAP: usize = 10;

/// A decision the agent made, with when it made it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Sim time of the decision.
    pub at_ms: u64,
    /// The decision itself.
    pub decision: Decision,
}

/// A conversation the agent took part in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionLine {
    /// Sim time of the conversation.
    pub at_ms: u64,
    /// Who the agent talked to.
    pub partner: AgentId,
    /// Partner's name.
    pub partner_name: String,
    /// What it was about.
    pub topic: String,
    /// How it felt.
    pub mood: Mood,
    /// Reported impact.
    pub impact: f64,
}

/// Everything needed to create an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpawn {
    /// Display name.
    pub name: String,
    /// Occupation.
    pub occupation: String,
    /// Where the agent starts.
    pub position: Position,
    /// Home building.
    pub residence: Option<BuildingId>,
    /// Place of work.
    pub workplace: Option<BuildingId>,
    /// Personality profile.
    pub personality: Personality,
    /// Daily plan.
    pub schedule: DailySchedule,
}

/// Persistable form of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Agent id.
    pub id: AgentId,
    /// Position at snapshot time.
    pub position: Position,
    /// Building occupied at snapshot time.
    #[serde(default)]
    pub location: Option<BuildingId>,
    /// Personality.
    pub personality: Personality,
    /// Daily plan.
    pub schedule: DailySchedule,
    /// State values.
    pub state: AgentState,
    /// Memory contents.
    pub memory: MemorySnapshot,
    /// Action outcomes.
    #[serde(default)]
    pub history: ActionHistory,
    /// Recent decisions.
    #[serde(default)]
    pub decisions: Vec<DecisionRecord>,
    /// Recent interactions.
    #[serde(default)]
    pub interactions: Vec<InteractionLine>,
}

/// A resident of the city.
#[derive(Debug, Clone)]
pub struct Agent {
    /// Unique id.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Occupation.
    pub occupation: String,
    /// Current position.
    pub position: Position,
    /// Home building.
    pub residence: Option<BuildingId>,
    /// Place of work.
    pub workplace: Option<BuildingId>,
    /// Building the agent is in or has reserved a place at.
    pub location: Option<BuildingId>,
    /// Personality profile.
    pub personality: Personality,
    /// Daily plan.
    pub schedule: DailySchedule,
    state: AgentState,
    machine: ActionMachine,
    memory: MemoryStore,
    decisions: VecDeque<DecisionRecord>,
    interactions: VecDeque<InteractionLine>,
    last_decision_ms: Option<u64>,
}

impl Agent {
    /// Create an agent with default state.
    pub fn new(spawn: AgentSpawn, memory_config: MemoryConfig) -> Self {
        Self {
            id: AgentId::new(),
            name: spawn.name,
            occupation: spawn.occupation,
            position: spawn.position,
            residence: spawn.residence,
            workplace: spawn.workplace,
            location: None,
            personality: spawn.personality,
            schedule: spawn.schedule,
            state: AgentState::default(),
            machine: ActionMachine::new(),
            memory: MemoryStore::new(memory_config),
            decisions: VecDeque::new(),
            interactions: VecDeque::new(),
            last_decision_ms: None,
        }
    }

    /// Current state.
    pub const fn state(&self) -> &AgentState {
        &self.state
    }

    /// Replace the state, clamping it into range.
    pub fn set_state(&mut self, state: AgentState) {
        self.state = state.clamped();
    }

    /// Apply a delta to the state.
    pub fn apply(&mut self, delta: StateDelta) {
        self.state = self.state.apply(delta);
    }

    /// The action state machine.
    pub const fn machine(&self) -> &ActionMachine {
        &self.machine
    }

    /// Memory.
    pub const fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Recent decisions, oldest first.
    pub fn decisions(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.decisions.iter()
    }

    /// Recent interactions, oldest first.
    pub fn interactions(&self) -> impl Iterator<Item = &InteractionLine> {
        self.interactions.iter()
    }

    /// The fields compatibility scoring looks at.
    pub fn social_profile(&self) -> SocialProfile<'_> {
        SocialProfile {
            occupation: &self.occupation,
            personality: &self.personality,
        }
    }

    /// Apply natural drift for `game_minutes` of game time.
    pub fn drift(&mut self, game_minutes: f64, config: &BehaviorConfig) {
        self.apply(StateDelta::natural(&config.rates, game_minutes));
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    /// Milliseconds until the agent may decide again.
    pub fn think_remaining(&self, now_ms: u64, config: &BehaviorConfig) -> u64 {
        self.last_decision_ms.map_or(0, |last| {
            last.saturating_add(config.think_interval_ms)
                .saturating_sub(now_ms)
        })
    }

    /// Whether the agent may decide at `now_ms`.
    pub fn can_think(&self, now_ms: u64, config: &BehaviorConfig) -> bool {
        self.think_remaining(now_ms, config) == 0
    }

    /// Whether the agent may both decide and start an action at `now_ms`.
    pub fn can_act(&self, now_ms: u64, config: &BehaviorConfig) -> bool {
        self.machine.can_act(now_ms) && self.can_think(now_ms, config)
    }

    /// Log a decision.
    ///
    /// Rejected while the think cooldown is running, so decision timestamps
    /// are always at least the think interval apart.
    pub fn record_decision(
        &mut self,
        now_ms: u64,
        decision: Decision,
        config: &BehaviorConfig,
    ) -> Result<(), AgentError> {
        let remaining_ms = self.think_remaining(now_ms, config);
        if remaining_ms > 0 {
            return Err(AgentError::ThinkCooldown { remaining_ms });
        }
        self.last_decision_ms = Some(now_ms);
        let content = format!("Decided to {}: {}", decision.action, decision.reason);
        self.decisions.push_back(DecisionRecord {
            at_ms: now_ms,
            decision,
        });
        while self.decisions.len() > config.decision_log_cap {
            self.decisions.pop_front();
        }
        self.remember(MemoryEntry::new(MemoryKind::Decision, content, now_ms), now_ms);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Try to start a plan. See [`ActionMachine::request_action`].
    pub fn request_action(
        &mut self,
        now_ms: u64,
        plan: ActionPlan,
        config: &BehaviorConfig,
    ) -> Result<ActionStart, ActionError> {
        self.machine
            .request_action(now_ms, plan, self.position, &mut self.state, config)
    }

    /// Advance the action state machine and record any outcome in memory.
    pub fn tick_action(&mut self, now_ms: u64, config: &BehaviorConfig) -> ActionEvent {
        let place = self
            .machine
            .active()
            .and_then(|a| a.plan.target_name.clone());
        let event = self
            .machine
            .tick(now_ms, &mut self.position, &mut self.state, config);
        match &event {
            ActionEvent::Completed(record) => {
                let entry = MemoryEntry::action(
                    record.kind,
                    format!("Finished {}", describe(record.kind, place.as_deref())),
                    now_ms,
                );
                self.remember(with_place(entry, place), now_ms);
            }
            ActionEvent::Failed(record) => {
                let entry = MemoryEntry::action(
                    record.kind,
                    format!("Could not finish {}: {}", record.kind, record.error),
                    now_ms,
                )
                .with_impact(-0.2);
                self.remember(with_place(entry, place), now_ms);
            }
            ActionEvent::Nothing | ActionEvent::Moved | ActionEvent::Arrived { .. } => {}
        }
        event
    }

    /// Record a failure that happened before an action could start.
    pub fn record_failure(
        &mut self,
        now_ms: u64,
        kind: ActionKind,
        error: ActionError,
        config: &BehaviorConfig,
    ) {
        if let Some(record) = self.machine.record_failure(now_ms, kind, error, config) {
            let entry = MemoryEntry::action(
                record.kind,
                format!("Could not {}: {}", record.kind, record.error),
                now_ms,
            );
            self.remember(entry, now_ms);
        }
    }

    /// Take an action lock.
    pub fn lock_action(&mut self, now_ms: u64, reason: impl Into<String>, duration_ms: u64) {
        self.machine.lock_action(now_ms, reason, duration_ms);
    }

    /// Force the agent back to Idle, giving up on anything in progress.
    ///
    /// See [`ActionMachine::reset`]. An abandoned action is remembered.
    pub fn reset(
        &mut self,
        now_ms: u64,
        reason: impl Into<String>,
        config: &BehaviorConfig,
    ) -> ActionEvent {
        let place = self
            .machine
            .active()
            .and_then(|a| a.plan.target_name.clone());
        let event = self.machine.reset(now_ms, reason, &self.state, config);
        if let ActionEvent::Failed(record) = &event {
            let entry = MemoryEntry::action(
                record.kind,
                format!("Gave up on {}: {}", record.kind, record.error),
                now_ms,
            )
            .with_impact(-0.2);
            self.remember(with_place(entry, place), now_ms);
        }
        event
    }

    // -----------------------------------------------------------------------
    // Memory and relationships
    // -----------------------------------------------------------------------

    /// Add a memory.
    pub fn remember(&mut self, entry: MemoryEntry, now_ms: u64) {
        self.memory.add(entry, now_ms);
    }

    /// Names of places the agent recently acted at.
    pub fn familiar_places(&self) -> BTreeSet<String> {
        self.memory
            .short_term()
            .filter(|m| m.kind == MemoryKind::Action)
            .filter_map(|m| m.location.clone())
            .collect()
    }

    /// Relationship level with another agent.
    pub fn relationship_level(&self, other: AgentId) -> f64 {
        self.memory.relationships().level(other)
    }

    /// Record a conversation with `partner`.
    ///
    /// Updates the relationship ledger, the interaction log, and memory.
    /// Returns the new relationship level.
    pub fn record_conversation(
        &mut self,
        now_ms: u64,
        partner: AgentId,
        partner_name: &str,
        conversation: &Conversation,
        change: f64,
        location: &str,
    ) -> f64 {
        let cap = self.memory.config().relationship_history_cap;
        let (_, level) = self.memory.relationships_mut().record(
            partner,
            InteractionRecord {
                at_ms: now_ms,
                topic: conversation.topic.clone(),
                mood: conversation.mood,
                impact: conversation.impact,
                change,
            },
            cap,
        );

        self.interactions.push_back(InteractionLine {
            at_ms: now_ms,
            partner,
            partner_name: String::from(partner_name),
            topic: conversation.topic.clone(),
            mood: conversation.mood,
            impact: conversation.impact,
        });
        while self.interactions.len() > INTERACTION_LOG_CAP {
            self.interactions.pop_front();
        }

        let entry = MemoryEntry::new(
            MemoryKind::Conversation,
            format!(
                "Talked with {partner_name} about {}: {}",
                conversation.topic, conversation.content
            ),
            now_ms,
        )
        .at(location)
        .with_partner(partner)
        .with_impact(conversation.impact);
        self.remember(entry, now_ms);

        level
    }

    /// Forget relationships that went idle for too long.
    pub fn collect_idle_relationships(&mut self, now_ms: u64) -> Vec<AgentId> {
        self.memory.collect_idle_relationships(now_ms)
    }

    // -----------------------------------------------------------------------
    // Views and snapshots
    // -----------------------------------------------------------------------

    /// Read-only render view with the last `recent` records of each kind.
    pub fn view(&self, now_ms: u64, recent: usize) -> AgentView {
        let active = self.machine.active();
        let skip_decisions = self.decisions.len().saturating_sub(recent);
        let skip_interactions = self.interactions.len().saturating_sub(recent);
        AgentView {
            id: self.id,
            name: self.name.clone(),
            occupation: self.occupation.clone(),
            position: self.position,
            mode: self.machine.mode(),
            current_action: active.map(|a| a.plan.kind),
            target: active.and_then(|a| a.plan.target),
            progress: self.machine.progress(now_ms),
            bars: self.state.bars(),
            recent_memories: self
                .memory
                .recent(recent)
                .into_iter()
                .map(|m| ActivityLine {
                    at_ms: m.at_ms,
                    kind: Some(m.kind),
                    text: m.content.clone(),
                })
                .collect(),
            recent_decisions: self
                .decisions
                .iter()
                .skip(skip_decisions)
                .map(|d| ActivityLine {
                    at_ms: d.at_ms,
                    kind: None,
                    text: format!("{}: {}", d.decision.action, d.decision.reason),
                })
                .collect(),
            recent_interactions: self
                .interactions
                .iter()
                .skip(skip_interactions)
                .map(|i| ActivityLine {
                    at_ms: i.at_ms,
                    kind: Some(MemoryKind::Conversation),
                    text: format!("{} ({}): {}", i.partner_name, i.mood.as_str(), i.topic),
                })
                .collect(),
        }
    }

    /// Capture the persistable parts of this agent.
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            position: self.position,
            location: self.location,
            personality: self.personality.clone(),
            schedule: self.schedule.clone(),
            state: self.state,
            memory: self.memory.snapshot(),
            history: self.machine.history().clone(),
            decisions: self.decisions.iter().cloned().collect(),
            interactions: self.interactions.iter().cloned().collect(),
        }
    }

    /// Restore from a snapshot of this same agent.
    ///
    /// The action machine comes back Idle with its history; anything that
    /// was in progress when the snapshot was taken is dropped.
    pub fn restore(&mut self, snapshot: AgentSnapshot) -> Result<(), AgentError> {
        if snapshot.id != self.id {
            return Err(AgentError::SnapshotMismatch {
                expected: self.id,
                found: snapshot.id,
            });
        }
        let config = *self.memory.config();
        self.position = snapshot.position;
        self.location = snapshot.location;
        self.personality = snapshot.personality;
        self.schedule = snapshot.schedule;
        self.state = snapshot.state.clamped();
        self.memory = MemoryStore::from_snapshot(config, snapshot.memory);
        self.machine = ActionMachine::with_history(snapshot.history);
        self.decisions = snapshot.decisions.into_iter().collect();
        self.interactions = snapshot.interactions.into_iter().collect();
        self.last_decision_ms = None;
        Ok(())
    }
}

/// "work at Office Tower" style description.
fn describe(kind: ActionKind, place: Option<&str>) -> String {
    place.map_or_else(|| kind.to_string(), |p| format!("{kind} at {p}"))
}

fn with_place(entry: MemoryEntry, place: Option<String>) -> MemoryEntry {
    match place {
        Some(p) => entry.at(p),
        None => entry,
    }
}
