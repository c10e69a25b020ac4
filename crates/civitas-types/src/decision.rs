//! Decision and conversation payloads exchanged with the decision oracle.
//!
//! Two shapes exist for each exchange. The `*Payload` structs mirror what
//! an external oracle sends back: every field optional, nothing trusted.
//! The validated forms ([`Decision`], [`Conversation`]) are what the
//! simulation acts on. The `*Context` structs are what the oracle is given.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActionKind, Mood, TimeSlot, Weather};
use crate::ids::{AgentId, BuildingId};
use crate::structs::Personality;

// ---------------------------------------------------------------------------
// Validated forms
// ---------------------------------------------------------------------------

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DecisionOrigin {
    /// An urgent need forced the decision; the oracle was not consulted.
    Urgent,
    /// The oracle supplied the decision and it passed validation.
    Oracle,
    /// The local deterministic fallback supplied the decision.
    Fallback,
}

/// A validated decision an agent will try to carry out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Decision {
    /// What to do.
    pub action: ActionKind,
    /// Specific building to do it at. `None` lets the registry choose.
    pub target: Option<BuildingId>,
    /// Human-readable justification.
    pub reason: String,
    /// Energy spent when the action starts (0-50).
    pub energy_cost: f64,
    /// Stress change applied when the action completes.
    pub stress_impact: f64,
    /// Where the decision came from.
    pub origin: DecisionOrigin,
}

/// A validated conversation between two residents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Conversation {
    /// What was said, summarized.
    pub content: String,
    /// Main topic.
    pub topic: String,
    /// Emotional tone.
    pub mood: Mood,
    /// Effect on both participants, in `[-1, 1]`.
    pub impact: f64,
    /// How well it went, in `[0, 1]`.
    pub quality: f64,
    /// Topics both participants cared about.
    pub common_topics: Vec<String>,
}

impl Conversation {
    /// The canned small-talk conversation used when the oracle is
    /// unavailable.
    pub fn small_talk() -> Self {
        Self {
            content: String::from("A short chat about the day."),
            topic: String::from("daily life"),
            mood: Mood::Neutral,
            impact: 0.1,
            quality: 0.5,
            common_topics: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Untrusted oracle payloads
// ---------------------------------------------------------------------------

/// Raw decision as returned by the oracle. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPayload {
    /// Action label.
    #[serde(default)]
    pub action: Option<String>,
    /// Target building id or free-form name.
    #[serde(default)]
    pub target: Option<String>,
    /// Justification.
    #[serde(default)]
    pub reason: Option<String>,
    /// Energy spent on start.
    #[serde(default, alias = "energy_cost")]
    pub energy_cost: Option<f64>,
    /// Stress change on completion.
    #[serde(default, alias = "stress_impact")]
    pub stress_impact: Option<f64>,
}

/// Raw conversation as returned by the oracle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPayload {
    /// What was said.
    #[serde(default)]
    pub content: Option<String>,
    /// Main topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Mood label.
    #[serde(default)]
    pub mood: Option<String>,
    /// Impact in `[-1, 1]`.
    #[serde(default)]
    pub impact: Option<f64>,
    /// Quality in `[0, 1]`.
    #[serde(default)]
    pub quality: Option<f64>,
    /// Shared topics.
    #[serde(default, alias = "common_topics")]
    pub common_topics: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Oracle contexts
// ---------------------------------------------------------------------------

/// Need levels summarized for a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NeedSummary {
    /// Energy (0-100).
    pub energy: f64,
    /// Hunger (0-100).
    pub hunger: f64,
    /// Stress (0-100).
    pub stress: f64,
    /// Social need (0-100).
    pub social_needs: f64,
    /// Happiness (0-100).
    pub happiness: f64,
}

/// Everything the oracle is told when asked for a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    /// The deciding agent.
    pub agent_id: AgentId,
    /// Agent name.
    pub name: String,
    /// Agent occupation.
    pub occupation: String,
    /// Name of the building the agent is in, if any.
    pub location: Option<String>,
    /// The agent's home, offered as the default rest target.
    pub residence: Option<BuildingId>,
    /// Game clock as `HH:MM`.
    pub game_time: String,
    /// Current part of the day.
    pub time_slot: TimeSlot,
    /// Current weather.
    pub weather: Weather,
    /// Current needs.
    pub needs: NeedSummary,
    /// Open buildings nearby, as `"<id> <name> (<kind>)"` lines.
    pub nearby_buildings: Vec<String>,
    /// Activities from the agent's schedule for this slot.
    pub planned_activities: Vec<String>,
    /// Most recent memories, newest last.
    pub recent_memories: Vec<String>,
}

/// One side of a conversation, as told to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Agent id.
    pub agent_id: AgentId,
    /// Name.
    pub name: String,
    /// Occupation.
    pub occupation: String,
    /// Personality profile.
    pub personality: Personality,
    /// Current needs.
    pub needs: NeedSummary,
}

/// Everything the oracle is told when asked for a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// The agent who started the conversation.
    pub initiator: Participant,
    /// The agent who was approached.
    pub partner: Participant,
    /// Where the conversation happens.
    pub location: String,
    /// Part of the day.
    pub time_slot: TimeSlot,
    /// Existing relationship level in `[-1, 1]`.
    pub relationship_level: f64,
}

/// Seed data for generating a personality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalitySeed {
    /// Agent name.
    pub name: String,
    /// Agent occupation.
    pub occupation: String,
    /// Traits assigned at spawn, to build on.
    #[serde(default)]
    pub traits: Vec<String>,
}

/// Seed data for generating a daily schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// Agent name.
    pub name: String,
    /// Agent occupation.
    pub occupation: String,
    /// Personality to plan around.
    pub personality: Personality,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn payload_accepts_camel_and_snake_case() {
        let camel: DecisionPayload =
            serde_json::from_str(r#"{"action":"rest","energyCost":5}"#).unwrap();
        let snake: DecisionPayload =
            serde_json::from_str(r#"{"action":"rest","energy_cost":5}"#).unwrap();
        assert_eq!(camel.energy_cost, Some(5.0));
        assert_eq!(snake.energy_cost, Some(5.0));
    }

    #[test]
    fn payload_tolerates_missing_fields() {
        let payload: DecisionPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.action.is_none());
        assert!(payload.stress_impact.is_none());
    }

    #[test]
    fn small_talk_is_mildly_positive() {
        let talk = Conversation::small_talk();
        assert_eq!(talk.mood, Mood::Neutral);
        assert!(talk.impact > 0.0);
    }
}
