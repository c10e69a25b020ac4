//! Short-lived cache of oracle decisions.
//!
//! Agents in the same situation ask the same question many times a minute.
//! A decision is reused while it is younger than the TTL and the agent's
//! needs are in the same ten-point band.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use civitas_types::{AgentId, DecisionContext, DecisionPayload, TimeSlot};
use tracing::debug;

/// What makes two decision requests interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    agent: AgentId,
    location: Option<String>,
    slot: TimeSlot,
    energy: u8,
    stress: u8,
    social: u8,
}

impl CacheKey {
    /// Build the key for a decision request.
    pub fn for_context(context: &DecisionContext) -> Self {
        Self {
            agent: context.agent_id,
            location: context.location.clone(),
            slot: context.time_slot,
            energy: band(context.needs.energy),
            stress: band(context.needs.stress),
            social: band(context.needs.social_needs),
        }
    }
}

/// A 0-100 value rounded to the nearest ten, as a band index.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn band(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    (value.clamp(0.0, 100.0) / 10.0).round() as u8
}

struct Entry {
    payload: DecisionPayload,
    stored_at: Instant,
}

/// TTL cache of decision payloads.
pub struct DecisionCache {
    entries: HashMap<CacheKey, Entry>,
    ttl: Duration,
    max_entries: usize,
}

impl DecisionCache {
    /// Create an empty cache.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries,
        }
    }

    /// A cached payload still inside the TTL.
    pub fn get(&self, key: &CacheKey, now: Instant) -> Option<DecisionPayload> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.stored_at) < self.ttl {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// Store a payload. Sweeps expired entries once the cache grows past
    /// its limit.
    pub fn insert(&mut self, key: CacheKey, payload: DecisionPayload, now: Instant) {
        self.entries.insert(
            key,
            Entry {
                payload,
                stored_at: now,
            },
        );
        if self.entries.len() > self.max_entries {
            self.sweep(now);
        }
    }

    /// Drop every expired entry.
    pub fn sweep(&mut self, now: Instant) {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);
        debug!(
            removed = before.saturating_sub(self.entries.len()),
            remaining = self.entries.len(),
            "Swept decision cache"
        );
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
