//! Read-only render views of the city.
//!
//! These are the only shapes the render layer ever sees. They are plain
//! data, rebuilt from simulation state after each tick and exported to
//! `TypeScript` via `ts-rs`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActionKind, ActionMode, BuildingKind, MemoryKind, Weather};
use crate::ids::{AgentId, BuildingId};
use crate::structs::Position;

/// Need bars shown next to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StateBars {
    /// Energy (0-100).
    pub energy: f64,
    /// Health (0-100).
    pub health: f64,
    /// Hunger (0-100).
    pub hunger: f64,
    /// Fatigue (0-100).
    pub fatigue: f64,
    /// Happiness (0-100).
    pub happiness: f64,
    /// Stress (0-100).
    pub stress: f64,
    /// Satisfaction (0-100).
    pub satisfaction: f64,
    /// Social need (0-100).
    pub social_needs: f64,
}

/// One line in an agent's recent-activity panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActivityLine {
    /// Sim-time timestamp in milliseconds.
    #[ts(type = "number")]
    pub at_ms: u64,
    /// Memory category (for memory lines).
    pub kind: Option<MemoryKind>,
    /// Display text.
    pub text: String,
}

/// Render view of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentView {
    /// Agent id.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Occupation.
    pub occupation: String,
    /// Current position.
    pub position: Position,
    /// Behavior mode.
    pub mode: ActionMode,
    /// The action being performed or travelled to.
    pub current_action: Option<ActionKind>,
    /// The building involved in the current action.
    pub target: Option<BuildingId>,
    /// Progress of the current action (0-100).
    pub progress: u8,
    /// Need bars.
    pub bars: StateBars,
    /// Most recent memories, newest last.
    pub recent_memories: Vec<ActivityLine>,
    /// Most recent decisions, newest last.
    pub recent_decisions: Vec<ActivityLine>,
    /// Most recent interactions, newest last.
    pub recent_interactions: Vec<ActivityLine>,
}

/// Render view of one building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BuildingView {
    /// Building id.
    pub id: BuildingId,
    /// Display name.
    pub name: String,
    /// Kind of building.
    pub kind: BuildingKind,
    /// Where it stands.
    pub position: Position,
    /// Whether it is open right now.
    pub open: bool,
    /// Agents inside.
    pub occupancy: u32,
    /// Maximum agents inside.
    pub capacity: u32,
    /// Physical condition (0-100).
    pub condition: f64,
}

/// Render view of the whole city after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CityView {
    /// Tick number.
    #[ts(type = "number")]
    pub tick: u64,
    /// Game day, starting at 1.
    #[ts(type = "number")]
    pub day: u64,
    /// Game clock as `HH:MM`.
    pub game_time: String,
    /// Current time-scale factor.
    pub time_scale: f64,
    /// Whether the clock is paused.
    pub paused: bool,
    /// Current weather.
    pub weather: Weather,
    /// Every agent, in insertion order.
    pub agents: Vec<AgentView>,
    /// Every building, in insertion order.
    pub buildings: Vec<BuildingView>,
}
