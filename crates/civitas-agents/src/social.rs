//! Relationships and compatibility between agents.
//!
//! Each agent keeps its own [`RelationshipLedger`]. A relationship is
//! created on the first interaction and updated by every later one; both
//! participants record it, so the data is stored redundantly on purpose.
//! Levels range from -1.0 (hostile) to 1.0 (close friends) and are clamped
//! on every update.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use civitas_types::{AgentId, Conversation, Mood, Personality};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum relationship level.
const LEVEL_MAX: f64 = 1.0;

/// Minimum relationship level.
const LEVEL_MIN: f64 = -1.0;

/// Largest change a single conversation can make.
const MAX_CHANGE_PER_INTERACTION: f64 = 0.2;

/// Bonus per topic both participants care about.
const COMMON_TOPIC_BONUS: f64 = 0.05;

/// Compatibility bonus for sharing an occupation.
const SAME_OCCUPATION_BONUS: f64 = 0.3;

/// Compatibility bonus per shared trait.
const SHARED_TRAIT_BONUS: f64 = 0.1;

/// Compatibility bonus per shared interest.
const SHARED_INTEREST_BONUS: f64 = 0.1;

/// Weight of the existing relationship level in compatibility.
const RELATIONSHIP_WEIGHT: f64 = 0.2;

/// Clamp a level into `[-1, 1]`. Non-finite values reset to neutral.
fn clamp_level(level: f64) -> f64 {
    if level.is_finite() {
        level.clamp(LEVEL_MIN, LEVEL_MAX)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Relationship
// ---------------------------------------------------------------------------

/// One remembered interaction with a partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Sim time of the interaction.
    pub at_ms: u64,
    /// What it was about.
    pub topic: String,
    /// How it felt.
    pub mood: Mood,
    /// Reported impact in `[-1, 1]`.
    pub impact: f64,
    /// Resulting change in relationship level.
    pub change: f64,
}

/// The relationship with one partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Current level in `[-1, 1]`.
    pub level: f64,
    /// Total number of interactions.
    pub interaction_count: u64,
    /// Sim time of the most recent interaction.
    pub last_interaction_ms: u64,
    /// Most recent interactions, oldest first.
    pub history: VecDeque<InteractionRecord>,
}

/// All relationships of one agent, keyed by partner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipLedger {
    relationships: BTreeMap<AgentId, Relationship>,
}

impl RelationshipLedger {
    /// Create an empty ledger.
    pub const fn new() -> Self {
        Self {
            relationships: BTreeMap::new(),
        }
    }

    /// The relationship with a partner, if one exists.
    pub fn get(&self, partner: AgentId) -> Option<&Relationship> {
        self.relationships.get(&partner)
    }

    /// Relationship level with a partner. Unknown partners are neutral.
    pub fn level(&self, partner: AgentId) -> f64 {
        self.relationships.get(&partner).map_or(0.0, |r| r.level)
    }

    /// Record an interaction, creating the relationship if needed.
    ///
    /// The level moves by `record.change` and is clamped. History keeps at
    /// most `history_cap` entries. Returns the old and new level.
    pub fn record(
        &mut self,
        partner: AgentId,
        record: InteractionRecord,
        history_cap: usize,
    ) -> (f64, f64) {
        let relationship = self
            .relationships
            .entry(partner)
            .or_insert_with(|| Relationship {
                level: 0.0,
                interaction_count: 0,
                last_interaction_ms: record.at_ms,
                history: VecDeque::new(),
            });

        let old = relationship.level;
        let new = clamp_level(old + record.change);
        relationship.level = new;
        relationship.interaction_count = relationship.interaction_count.saturating_add(1);
        relationship.last_interaction_ms = relationship.last_interaction_ms.max(record.at_ms);
        relationship.history.push_back(record);
        while relationship.history.len() > history_cap {
            relationship.history.pop_front();
        }

        (old, new)
    }

    /// Remove relationships idle for longer than `idle_ms`.
    ///
    /// Returns the partners that were forgotten.
    pub fn collect_idle(&mut self, now_ms: u64, idle_ms: u64) -> Vec<AgentId> {
        let stale: Vec<AgentId> = self
            .relationships
            .iter()
            .filter(|(_, r)| now_ms.saturating_sub(r.last_interaction_ms) > idle_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            self.relationships.remove(id);
        }
        stale
    }

    /// Number of known partners.
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    /// Whether no relationships exist.
    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// Iterate over every relationship.
    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &Relationship)> {
        self.relationships.iter()
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Base relationship change for a conversation mood.
const fn mood_change(mood: Mood) -> f64 {
    match mood {
        Mood::Friendly => 0.1,
        Mood::Neutral => 0.05,
        Mood::Awkward => -0.05,
        Mood::Negative => -0.1,
    }
}

/// Relationship change produced by a conversation.
///
/// The mood sets the base change, scaled by quality. Each common topic
/// adds a small bonus, and the total is capped at +/-0.2.
pub fn relationship_change(conversation: &Conversation) -> f64 {
    let quality = if conversation.quality.is_finite() {
        conversation.quality.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let topics = f64::from(u32::try_from(conversation.common_topics.len()).unwrap_or(u32::MAX));
    let change = mood_change(conversation.mood).mul_add(quality, topics * COMMON_TOPIC_BONUS);
    change.clamp(-MAX_CHANGE_PER_INTERACTION, MAX_CHANGE_PER_INTERACTION)
}

/// The parts of an agent that compatibility looks at.
#[derive(Debug, Clone, Copy)]
pub struct SocialProfile<'a> {
    /// Occupation.
    pub occupation: &'a str,
    /// Personality.
    pub personality: &'a Personality,
}

/// Count entries of `a` that also appear in `b`, ignoring case.
fn shared_count(a: &[String], b: &[String]) -> u32 {
    let count = a
        .iter()
        .filter(|x| b.iter().any(|y| y.eq_ignore_ascii_case(x)))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Compatibility of two agents in `[0, 1]`.
///
/// Shared occupation, traits, and interests add fixed bonuses, and the
/// existing relationship level contributes a scaled share.
pub fn compatibility(a: SocialProfile<'_>, b: SocialProfile<'_>, relationship_level: f64) -> f64 {
    let mut score = 0.0;
    if !a.occupation.is_empty() && a.occupation.eq_ignore_ascii_case(b.occupation) {
        score += SAME_OCCUPATION_BONUS;
    }
    score += f64::from(shared_count(&a.personality.traits, &b.personality.traits))
        * SHARED_TRAIT_BONUS;
    score += f64::from(shared_count(&a.personality.interests, &b.personality.interests))
        * SHARED_INTEREST_BONUS;
    score += clamp_level(relationship_level) * RELATIONSHIP_WEIGHT;
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(at_ms: u64, change: f64) -> InteractionRecord {
        InteractionRecord {
            at_ms,
            topic: String::from("weather"),
            mood: Mood::Friendly,
            impact: 0.5,
            change,
        }
    }

    fn make_personality(traits: &[&str], interests: &[&str]) -> Personality {
        Personality {
            traits: traits.iter().map(|s| String::from(*s)).collect(),
            interests: interests.iter().map(|s| String::from(*s)).collect(),
            ..Personality::default()
        }
    }

    fn make_conversation(mood: Mood, quality: f64, topics: usize) -> Conversation {
        Conversation {
            mood,
            quality,
            common_topics: vec![String::from("t"); topics],
            ..Conversation::small_talk()
        }
    }

    #[test]
    fn first_interaction_creates_relationship() {
        let mut ledger = RelationshipLedger::new();
        let partner = AgentId::new();
        assert!(ledger.get(partner).is_none());
        let (old, new) = ledger.record(partner, make_record(10, 0.1), 20);
        assert!(old.abs() < f64::EPSILON);
        assert!((new - 0.1).abs() < 1e-9);
        let rel = ledger.get(partner);
        assert!(rel.is_some_and(|r| r.interaction_count == 1 && r.last_interaction_ms == 10));
    }

    #[test]
    fn level_is_clamped() {
        let mut ledger = RelationshipLedger::new();
        let partner = AgentId::new();
        for i in 0..20 {
            ledger.record(partner, make_record(i, 0.2), 20);
        }
        assert!((ledger.level(partner) - 1.0).abs() < f64::EPSILON);
        for i in 20..40 {
            ledger.record(partner, make_record(i, -0.2), 20);
        }
        assert!((ledger.level(partner) - -1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn history_is_bounded() {
        let mut ledger = RelationshipLedger::new();
        let partner = AgentId::new();
        for i in 0..30 {
            ledger.record(partner, make_record(i, 0.01), 5);
        }
        let rel = ledger.get(partner);
        assert!(rel.is_some_and(|r| r.history.len() == 5 && r.interaction_count == 30));
    }

    #[test]
    fn idle_relationships_are_collected() {
        let mut ledger = RelationshipLedger::new();
        let old_friend = AgentId::new();
        let new_friend = AgentId::new();
        ledger.record(old_friend, make_record(0, 0.1), 20);
        ledger.record(new_friend, make_record(900, 0.1), 20);
        let forgotten = ledger.collect_idle(1_000, 500);
        assert_eq!(forgotten, vec![old_friend]);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn friendly_conversation_scales_with_quality() {
        let change = relationship_change(&make_conversation(Mood::Friendly, 0.5, 0));
        assert!((change - 0.05).abs() < 1e-9);
    }

    #[test]
    fn common_topics_add_bonus_but_cap() {
        let change = relationship_change(&make_conversation(Mood::Neutral, 1.0, 1));
        assert!((change - 0.1).abs() < 1e-9);
        let capped = relationship_change(&make_conversation(Mood::Friendly, 1.0, 10));
        assert!((capped - 0.2).abs() < 1e-9);
    }

    #[test]
    fn negative_mood_lowers_relationship() {
        let change = relationship_change(&make_conversation(Mood::Negative, 1.0, 0));
        assert!((change - -0.1).abs() < 1e-9);
    }

    #[test]
    fn compatibility_adds_bonuses() {
        let pa = make_personality(&["curious", "kind"], &["music"]);
        let pb = make_personality(&["Kind"], &["music", "chess"]);
        let a = SocialProfile {
            occupation: "librarian",
            personality: &pa,
        };
        let b = SocialProfile {
            occupation: "Librarian",
            personality: &pb,
        };
        // 0.3 occupation + 0.1 trait + 0.1 interest + 0.5 * 0.2 relationship
        let score = compatibility(a, b, 0.5);
        assert!((score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn compatibility_is_capped() {
        let p = make_personality(&["a", "b", "c", "d"], &["e", "f", "g", "h"]);
        let profile = SocialProfile {
            occupation: "chef",
            personality: &p,
        };
        assert!((compatibility(profile, profile, 1.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn strangers_with_nothing_in_common_score_zero() {
        let pa = make_personality(&["shy"], &[]);
        let pb = make_personality(&["loud"], &[]);
        let a = SocialProfile {
            occupation: "chef",
            personality: &pa,
        };
        let b = SocialProfile {
            occupation: "pilot",
            personality: &pb,
        };
        assert!(compatibility(a, b, 0.0).abs() < f64::EPSILON);
    }
}
