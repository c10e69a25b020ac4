//! Agent memory: a short-term ring buffer, a bounded long-term set, and the
//! relationship ledger.
//!
//! New entries always land in short-term memory. When the ring buffer
//! overflows, the oldest entry is either promoted to long-term memory (if
//! it is significant) or forgotten. When long-term memory overflows, the
//! entry with the lowest [`importance_score`] is evicted.
//!
//! ## Significance
//!
//! An entry is significant when any of these hold:
//!
//! - its kind is conversation, decision, relationship update, or achievement
//! - it is an action entry for work, socializing, or rest
//! - it is a thought flagged urgent
//! - its impact magnitude exceeds 0.3
//!
//! ## Importance
//!
//! Importance is a kind weight plus the impact magnitude plus a recency
//! bonus that halves every `recency_half_life_ms` of sim time.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use civitas_types::{ActionKind, AgentId, MemoryKind};

use crate::config::MemoryConfig;
use crate::social::RelationshipLedger;

/// Impact magnitude above which any entry is significant.
const SIGNIFICANT_IMPACT: f64 = 0.3;

/// Recency bonus of a brand-new entry.
const RECENCY_BONUS_MAX: f64 = 1.0;

/// Base importance by memory kind.
const fn kind_weight(kind: MemoryKind) -> f64 {
    match kind {
        MemoryKind::Achievement => 3.0,
        MemoryKind::Conversation | MemoryKind::RelationshipUpdate => 2.0,
        MemoryKind::Decision => 1.5,
        MemoryKind::Action => 1.0,
        MemoryKind::Thought | MemoryKind::Observation => 0.5,
    }
}

// ---------------------------------------------------------------------------
// MemoryEntry
// ---------------------------------------------------------------------------

/// A single remembered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Category.
    pub kind: MemoryKind,
    /// Description.
    pub content: String,
    /// Sim time at which it happened.
    pub at_ms: u64,
    /// Where it happened.
    #[serde(default)]
    pub location: Option<String>,
    /// Other agent involved.
    #[serde(default)]
    pub partner: Option<AgentId>,
    /// Emotional impact in `[-1, 1]`.
    #[serde(default)]
    pub impact: Option<f64>,
    /// Action involved, for action entries.
    #[serde(default)]
    pub action: Option<ActionKind>,
    /// Whether a thought was urgent.
    #[serde(default)]
    pub urgent: bool,
}

impl MemoryEntry {
    /// A plain entry of the given kind.
    pub fn new(kind: MemoryKind, content: impl Into<String>, at_ms: u64) -> Self {
        Self {
            kind,
            content: content.into(),
            at_ms,
            location: None,
            partner: None,
            impact: None,
            action: None,
            urgent: false,
        }
    }

    /// An entry describing an action.
    pub fn action(action: ActionKind, content: impl Into<String>, at_ms: u64) -> Self {
        Self {
            action: Some(action),
            ..Self::new(MemoryKind::Action, content, at_ms)
        }
    }

    /// Set the location.
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the partner.
    #[must_use]
    pub const fn with_partner(mut self, partner: AgentId) -> Self {
        self.partner = Some(partner);
        self
    }

    /// Set the impact.
    #[must_use]
    pub const fn with_impact(mut self, impact: f64) -> Self {
        self.impact = Some(impact);
        self
    }

    /// Flag a thought as urgent.
    #[must_use]
    pub const fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }

    fn impact_magnitude(&self) -> f64 {
        self.impact
            .filter(|i| i.is_finite())
            .map_or(0.0, f64::abs)
    }
}

/// Whether an entry deserves a place in long-term memory.
pub fn is_significant(entry: &MemoryEntry) -> bool {
    let by_kind = match entry.kind {
        MemoryKind::Conversation
        | MemoryKind::Decision
        | MemoryKind::RelationshipUpdate
        | MemoryKind::Achievement => true,
        MemoryKind::Action => matches!(
            entry.action,
            Some(ActionKind::Work | ActionKind::Socialize | ActionKind::Rest)
        ),
        MemoryKind::Thought => entry.urgent,
        MemoryKind::Observation => false,
    };
    by_kind || entry.impact_magnitude() > SIGNIFICANT_IMPACT
}

/// Importance of an entry at `now_ms`.
#[allow(clippy::cast_precision_loss)]
pub fn importance_score(entry: &MemoryEntry, now_ms: u64, half_life_ms: u64) -> f64 {
    let age = now_ms.saturating_sub(entry.at_ms) as f64;
    let recency = if half_life_ms == 0 {
        0.0
    } else {
        RECENCY_BONUS_MAX * 0.5_f64.powf(age / half_life_ms as f64)
    };
    kind_weight(entry.kind) + entry.impact_magnitude() + recency
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Persistable contents of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Short-term entries, oldest first.
    #[serde(default)]
    pub short_term: Vec<MemoryEntry>,
    /// Long-term entries.
    #[serde(default)]
    pub long_term: Vec<MemoryEntry>,
    /// Relationships.
    #[serde(default)]
    pub relationships: RelationshipLedger,
}

/// What happened to the entry pushed out of short-term memory.
#[derive(Debug, Clone, PartialEq)]
pub enum Overflow {
    /// Nothing overflowed.
    None,
    /// The oldest entry was promoted to long-term memory.
    Promoted {
        /// An entry evicted from long-term memory to make room.
        evicted: Option<MemoryEntry>,
    },
    /// The oldest entry was not significant and was forgotten.
    Forgotten(MemoryEntry),
}

/// Bounded memory of one agent.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    short_term: VecDeque<MemoryEntry>,
    long_term: Vec<MemoryEntry>,
    relationships: RelationshipLedger,
    config: MemoryConfig,
}

impl MemoryStore {
    /// Create an empty store.
    pub const fn new(config: MemoryConfig) -> Self {
        Self {
            short_term: VecDeque::new(),
            long_term: Vec::new(),
            relationships: RelationshipLedger::new(),
            config,
        }
    }

    /// Restore a store from a snapshot. Caps are re-applied, so a snapshot
    /// taken under a larger configuration is trimmed.
    pub fn from_snapshot(config: MemoryConfig, snapshot: MemorySnapshot) -> Self {
        let mut store = Self {
            short_term: VecDeque::new(),
            long_term: snapshot.long_term,
            relationships: snapshot.relationships,
            config,
        };
        let newest = store
            .long_term
            .iter()
            .chain(snapshot.short_term.iter())
            .map(|e| e.at_ms)
            .max()
            .unwrap_or(0);
        store.enforce_long_term_cap(newest);
        for entry in snapshot.short_term {
            store.add(entry, newest);
        }
        store
    }

    /// Capture the store's contents.
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            short_term: self.short_term.iter().cloned().collect(),
            long_term: self.long_term.clone(),
            relationships: self.relationships.clone(),
        }
    }

    /// Add an entry to short-term memory, promoting or forgetting the
    /// oldest entry if the buffer is full.
    pub fn add(&mut self, entry: MemoryEntry, now_ms: u64) -> Overflow {
        self.short_term.push_back(entry);
        if self.short_term.len() <= self.config.short_term_cap {
            return Overflow::None;
        }
        let Some(oldest) = self.short_term.pop_front() else {
            return Overflow::None;
        };
        if is_significant(&oldest) {
            self.long_term.push(oldest);
            let evicted = self.enforce_long_term_cap(now_ms);
            Overflow::Promoted { evicted }
        } else {
            Overflow::Forgotten(oldest)
        }
    }

    /// Evict least-important long-term entries until the cap holds.
    /// Returns the last evicted entry.
    fn enforce_long_term_cap(&mut self, now_ms: u64) -> Option<MemoryEntry> {
        let half_life = self.config.recency_half_life_ms;
        let mut evicted = None;
        while self.long_term.len() > self.config.long_term_cap {
            let weakest = self
                .long_term
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    importance_score(a, now_ms, half_life)
                        .total_cmp(&importance_score(b, now_ms, half_life))
                        .then_with(|| a.at_ms.cmp(&b.at_ms))
                })
                .map(|(idx, _)| idx);
            let Some(idx) = weakest else {
                break;
            };
            evicted = Some(self.long_term.remove(idx));
        }
        evicted
    }

    /// Short-term entries, oldest first.
    pub fn short_term(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.short_term.iter()
    }

    /// Long-term entries.
    pub fn long_term(&self) -> &[MemoryEntry] {
        &self.long_term
    }

    /// The `n` most recent short-term entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&MemoryEntry> {
        let skip = self.short_term.len().saturating_sub(n);
        self.short_term.iter().skip(skip).collect()
    }

    /// Number of short-term entries.
    pub fn short_term_len(&self) -> usize {
        self.short_term.len()
    }

    /// Number of long-term entries.
    pub fn long_term_len(&self) -> usize {
        self.long_term.len()
    }

    /// The relationship ledger.
    pub const fn relationships(&self) -> &RelationshipLedger {
        &self.relationships
    }

    /// Mutable access to the relationship ledger.
    pub const fn relationships_mut(&mut self) -> &mut RelationshipLedger {
        &mut self.relationships
    }

    /// Forget relationships idle for longer than the configured window.
    pub fn collect_idle_relationships(&mut self, now_ms: u64) -> Vec<AgentId> {
        let forgotten = self
            .relationships
            .collect_idle(now_ms, self.config.relationship_idle_ms);
        if !forgotten.is_empty() {
            tracing::debug!(count = forgotten.len(), "relationships collected after idle period");
        }
        forgotten
    }

    /// The active configuration.
    pub const fn config(&self) -> &MemoryConfig {
        &self.config
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn make_config(short: usize, long: usize) -> MemoryConfig {
        MemoryConfig {
            short_term_cap: short,
            long_term_cap: long,
            ..MemoryConfig::default()
        }
    }

    fn make_observation(at_ms: u64) -> MemoryEntry {
        MemoryEntry::new(MemoryKind::Observation, "saw a pigeon", at_ms)
    }

    fn make_conversation(at_ms: u64) -> MemoryEntry {
        MemoryEntry::new(MemoryKind::Conversation, "talked about the weather", at_ms)
            .with_impact(0.2)
    }

    #[test]
    fn significance_rules() {
        assert!(is_significant(&make_conversation(0)));
        assert!(is_significant(&MemoryEntry::action(ActionKind::Work, "worked", 0)));
        assert!(!is_significant(&MemoryEntry::action(ActionKind::Eat, "ate", 0)));
        assert!(!is_significant(&make_observation(0)));
        assert!(is_significant(&make_observation(0).with_impact(-0.5)));
        assert!(!is_significant(&MemoryEntry::new(MemoryKind::Thought, "hmm", 0)));
        assert!(is_significant(&MemoryEntry::new(MemoryKind::Thought, "hmm", 0).urgent()));
    }

    #[test]
    fn recency_bonus_decays() {
        let entry = make_observation(0);
        let fresh = importance_score(&entry, 0, 60_000);
        let one_half_life = importance_score(&entry, 60_000, 60_000);
        assert!((fresh - 1.5).abs() < 1e-9);
        assert!((one_half_life - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overflow_promotes_significant_entries() {
        let mut store = MemoryStore::new(make_config(2, 10));
        store.add(make_conversation(1), 1);
        store.add(make_observation(2), 2);
        let result = store.add(make_observation(3), 3);
        assert_eq!(result, Overflow::Promoted { evicted: None });
        assert_eq!(store.long_term_len(), 1);
        assert_eq!(store.short_term_len(), 2);
    }

    #[test]
    fn overflow_forgets_insignificant_entries() {
        let mut store = MemoryStore::new(make_config(1, 10));
        store.add(make_observation(1), 1);
        let result = store.add(make_observation(2), 2);
        assert!(matches!(result, Overflow::Forgotten(e) if e.at_ms == 1));
        assert_eq!(store.long_term_len(), 0);
    }

    #[test]
    fn long_term_evicts_least_important() {
        let mut store = MemoryStore::new(make_config(1, 2));
        let achievement = MemoryEntry::new(MemoryKind::Achievement, "promoted", 1);
        store.add(achievement, 1);
        let decision = MemoryEntry::new(MemoryKind::Decision, "decided", 2);
        store.add(decision.clone(), 2);
        store.add(make_conversation(3), 3);
        // Pushing one more promotes the conversation and overflows long-term.
        let result = store.add(make_observation(4), 4);
        assert_eq!(
            result,
            Overflow::Promoted {
                evicted: Some(decision)
            }
        );
        assert_eq!(store.long_term_len(), 2);
    }

    #[test]
    fn recent_returns_newest_in_order() {
        let mut store = MemoryStore::default();
        for i in 0..8 {
            store.add(make_observation(i), i);
        }
        let recent: Vec<u64> = store.recent(3).iter().map(|e| e.at_ms).collect();
        assert_eq!(recent, vec![5, 6, 7]);
    }

    #[test]
    fn snapshot_restores_under_smaller_caps() {
        let mut store = MemoryStore::new(make_config(5, 5));
        for i in 0..12 {
            store.add(make_conversation(i), i);
        }
        let restored = MemoryStore::from_snapshot(make_config(2, 3), store.snapshot());
        assert!(restored.short_term_len() <= 2);
        assert!(restored.long_term_len() <= 3);
    }

    fn arb_entry() -> impl Strategy<Value = MemoryEntry> {
        (0_u8..7, 0_u64..1_000_000, proptest::option::of(-1.0_f64..1.0)).prop_map(
            |(kind, at_ms, impact)| {
                let kind = match kind {
                    0 => MemoryKind::Action,
                    1 => MemoryKind::Decision,
                    2 => MemoryKind::Conversation,
                    3 => MemoryKind::RelationshipUpdate,
                    4 => MemoryKind::Achievement,
                    5 => MemoryKind::Thought,
                    _ => MemoryKind::Observation,
                };
                MemoryEntry {
                    impact,
                    ..MemoryEntry::new(kind, "event", at_ms)
                }
            },
        )
    }

    proptest! {
        #[test]
        fn caps_always_hold(
            entries in prop::collection::vec(arb_entry(), 0..200),
            short in 1_usize..10,
            long in 1_usize..20,
        ) {
            let mut store = MemoryStore::new(make_config(short, long));
            for (now, entry) in (0_u64..).zip(entries) {
                store.add(entry, now);
                prop_assert!(store.short_term_len() <= short);
                prop_assert!(store.long_term_len() <= long);
            }
        }
    }
}
