//! Agent state, needs, memory, relationships, and behavior for Civitas.
//!
//! This crate is the logic layer for a single resident: everything that
//! operates on one agent without touching the city, the clock, or I/O. The
//! city tick loop in `civitas-core` drives it with sim timestamps.
//!
//! # Modules
//!
//! - [`action`] -- Action state machine, duration model, outcome history
//! - [`agent`] -- The agent aggregate ([`Agent`]) and its snapshots
//! - [`config`] -- Behavior, memory, and social tunables
//! - [`error`] -- Action failure taxonomy ([`ActionError`]) and [`AgentError`]
//! - [`memory`] -- Short- and long-term memory with importance-based eviction
//! - [`needs`] -- Urgent needs and the deterministic fallback decision
//! - [`social`] -- Relationship ledger, conversation scoring, compatibility
//! - [`state`] -- Clamped state values and deltas

pub mod action;
pub mod agent;
pub mod config;
pub mod error;
pub mod memory;
pub mod needs;
pub mod social;
pub mod state;

// Re-export primary types at crate root for convenience.
pub use action::{
    ActionEvent, ActionHistory, ActionMachine, ActionPlan, ActionStart, CompletedAction,
    FailedAction, action_timeout, plan_duration,
};
pub use agent::{Agent, AgentSnapshot, AgentSpawn, DecisionRecord, InteractionLine};
pub use config::{BehaviorConfig, MemoryConfig, SocialConfig};
pub use error::{ActionError, AgentError};
pub use memory::{MemoryEntry, MemorySnapshot, MemoryStore};
pub use needs::{UrgentNeed, fallback_building_kinds, fallback_decision, urgent_need};
pub use social::{RelationshipLedger, SocialProfile, compatibility, relationship_change};
pub use state::{AgentState, StateDelta};
