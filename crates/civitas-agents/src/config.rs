//! Tunable parameters for agent behavior, memory, and social mechanics.
//!
//! These structs are deserialized directly from the `behavior`, `memory`,
//! and `social` sections of `civitas-config.yaml`. Every field has a named
//! default so partial YAML files work, and tests can override one knob at a
//! time with struct update syntax.
//!
//! All durations are sim-time milliseconds: elapsed unpaused wall time as
//! reported by the city clock.

use serde::{Deserialize, Serialize};

use civitas_types::ActionKind;

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Natural state drift per game minute.
///
/// Positive values raise a field over time, negative values lower it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NaturalRates {
    /// Energy change (default: -0.2).
    #[serde(default = "default_energy_rate")]
    pub energy: f64,
    /// Hunger change (default: +0.3).
    #[serde(default = "default_hunger_rate")]
    pub hunger: f64,
    /// Fatigue change (default: +0.2).
    #[serde(default = "default_fatigue_rate")]
    pub fatigue: f64,
    /// Happiness change (default: -0.1).
    #[serde(default = "default_happiness_rate")]
    pub happiness: f64,
    /// Stress change (default: +0.15).
    #[serde(default = "default_stress_rate")]
    pub stress: f64,
    /// Satisfaction change (default: -0.1).
    #[serde(default = "default_satisfaction_rate")]
    pub satisfaction: f64,
    /// Social need change (default: +0.25).
    #[serde(default = "default_social_rate")]
    pub social_needs: f64,
}

impl Default for NaturalRates {
    fn default() -> Self {
        Self {
            energy: default_energy_rate(),
            hunger: default_hunger_rate(),
            fatigue: default_fatigue_rate(),
            happiness: default_happiness_rate(),
            stress: default_stress_rate(),
            satisfaction: default_satisfaction_rate(),
            social_needs: default_social_rate(),
        }
    }
}

/// Base duration of each action kind before randomization and scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseDurations {
    /// Work (default: 120 s).
    #[serde(default = "default_work_ms")]
    pub work_ms: u64,
    /// Rest (default: 90 s).
    #[serde(default = "default_rest_ms")]
    pub rest_ms: u64,
    /// Eat (default: 60 s).
    #[serde(default = "default_eat_ms")]
    pub eat_ms: u64,
    /// Socialize (default: 180 s).
    #[serde(default = "default_socialize_ms")]
    pub socialize_ms: u64,
    /// Entertainment (default: 150 s).
    #[serde(default = "default_entertainment_ms")]
    pub entertainment_ms: u64,
    /// Relax (default: 60 s).
    #[serde(default = "default_relax_ms")]
    pub relax_ms: u64,
}

impl BaseDurations {
    /// Base duration for an action kind.
    pub const fn for_action(&self, kind: ActionKind) -> u64 {
        match kind {
            ActionKind::Work => self.work_ms,
            ActionKind::Rest => self.rest_ms,
            ActionKind::Eat => self.eat_ms,
            ActionKind::Socialize => self.socialize_ms,
            ActionKind::Entertainment => self.entertainment_ms,
            ActionKind::Relax => self.relax_ms,
        }
    }
}

impl Default for BaseDurations {
    fn default() -> Self {
        Self {
            work_ms: default_work_ms(),
            rest_ms: default_rest_ms(),
            eat_ms: default_eat_ms(),
            socialize_ms: default_socialize_ms(),
            entertainment_ms: default_entertainment_ms(),
            relax_ms: default_relax_ms(),
        }
    }
}

/// Urgent-need thresholds, checked in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UrgencyThresholds {
    /// Energy below this forces rest (default: 20).
    #[serde(default = "default_urgent_energy")]
    pub energy_below: f64,
    /// Hunger above this forces eating (default: 80).
    #[serde(default = "default_urgent_high")]
    pub hunger_above: f64,
    /// Stress above this forces relaxing (default: 80).
    #[serde(default = "default_urgent_high")]
    pub stress_above: f64,
    /// Social need above this forces socializing (default: 80).
    #[serde(default = "default_urgent_high")]
    pub social_above: f64,
}

impl Default for UrgencyThresholds {
    fn default() -> Self {
        Self {
            energy_below: default_urgent_energy(),
            hunger_above: default_urgent_high(),
            stress_above: default_urgent_high(),
            social_above: default_urgent_high(),
        }
    }
}

/// Configuration for the per-agent behavior loop and action state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Cooldown after a completed action (default: 5 s).
    #[serde(default = "default_success_cooldown_ms")]
    pub success_cooldown_ms: u64,

    /// Cooldown after a failed or timed-out action (default: 8 s).
    #[serde(default = "default_failure_cooldown_ms")]
    pub failure_cooldown_ms: u64,

    /// Cooldown after no building could serve an action (default: 10 s).
    #[serde(default = "default_no_target_cooldown_ms")]
    pub no_target_cooldown_ms: u64,

    /// Cooldown after an unexpected execution error (default: 15 s).
    #[serde(default = "default_error_cooldown_ms")]
    pub error_cooldown_ms: u64,

    /// Absolute ceiling for any single action (default: 300 s).
    ///
    /// The action timeout is `1.5 x planned duration`, capped here.
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,

    /// Ceiling for a single move (default: 10 s).
    #[serde(default = "default_movement_timeout_ms")]
    pub movement_timeout_ms: u64,

    /// Minimum gap between two decisions of the same agent (default: 5 s).
    #[serde(default = "default_think_interval_ms")]
    pub think_interval_ms: u64,

    /// Movement speed in units per sim second (default: 60).
    #[serde(default = "default_movement_speed")]
    pub movement_speed: f64,

    /// Distance at which a destination counts as reached (default: 1).
    #[serde(default = "default_arrival_tolerance")]
    pub arrival_tolerance: f64,

    /// Completed actions kept in history (default: 20).
    #[serde(default = "default_completed_history_cap")]
    pub completed_history_cap: usize,

    /// Failed actions kept in history (default: 10).
    #[serde(default = "default_failed_history_cap")]
    pub failed_history_cap: usize,

    /// Decisions kept in the decision log (default: 10).
    #[serde(default = "default_decision_log_cap")]
    pub decision_log_cap: usize,

    /// Base action durations.
    #[serde(default)]
    pub durations: BaseDurations,

    /// Natural state drift per game minute.
    #[serde(default)]
    pub rates: NaturalRates,

    /// Urgent-need thresholds.
    #[serde(default)]
    pub urgency: UrgencyThresholds,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            success_cooldown_ms: default_success_cooldown_ms(),
            failure_cooldown_ms: default_failure_cooldown_ms(),
            no_target_cooldown_ms: default_no_target_cooldown_ms(),
            error_cooldown_ms: default_error_cooldown_ms(),
            action_timeout_ms: default_action_timeout_ms(),
            movement_timeout_ms: default_movement_timeout_ms(),
            think_interval_ms: default_think_interval_ms(),
            movement_speed: default_movement_speed(),
            arrival_tolerance: default_arrival_tolerance(),
            completed_history_cap: default_completed_history_cap(),
            failed_history_cap: default_failed_history_cap(),
            decision_log_cap: default_decision_log_cap(),
            durations: BaseDurations::default(),
            rates: NaturalRates::default(),
            urgency: UrgencyThresholds::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Configuration for the per-agent memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Short-term ring buffer size (default: 20).
    #[serde(default = "default_short_term_cap")]
    pub short_term_cap: usize,

    /// Long-term capacity (default: 100).
    #[serde(default = "default_long_term_cap")]
    pub long_term_cap: usize,

    /// Interaction records kept per relationship (default: 20).
    #[serde(default = "default_relationship_history_cap")]
    pub relationship_history_cap: usize,

    /// Relationships idle longer than this are collected (default: 24 h).
    #[serde(default = "default_relationship_idle_ms")]
    pub relationship_idle_ms: u64,

    /// Half-life of the recency bonus in importance scoring
    /// (default: 60 s, one game hour at 1x).
    #[serde(default = "default_recency_half_life_ms")]
    pub recency_half_life_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_cap: default_short_term_cap(),
            long_term_cap: default_long_term_cap(),
            relationship_history_cap: default_relationship_history_cap(),
            relationship_idle_ms: default_relationship_idle_ms(),
            recency_half_life_ms: default_recency_half_life_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Social
// ---------------------------------------------------------------------------

/// Configuration for partner discovery and social preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SocialConfig {
    /// Radius within which partners are searched (default: 100).
    #[serde(default = "default_search_radius")]
    pub search_radius: f64,

    /// Compatibility a partner must exceed (default: 0.5).
    #[serde(default = "default_compatibility_threshold")]
    pub compatibility_threshold: f64,

    /// Minimum social need to be willing to talk (default: 30).
    #[serde(default = "default_social_need_floor")]
    pub social_need_floor: f64,

    /// Maximum stress to be willing to talk (default: 80).
    #[serde(default = "default_stress_ceiling")]
    pub stress_ceiling: f64,

    /// First hour at which conversations are allowed (default: 6).
    #[serde(default = "default_earliest_hour")]
    pub earliest_hour: u32,

    /// Hour from which conversations stop (default: 22).
    #[serde(default = "default_latest_hour")]
    pub latest_hour: u32,

    /// Minimum gap between two conversations of the same pair
    /// (default: 30 s).
    #[serde(default = "default_partner_cooldown_ms")]
    pub partner_cooldown_ms: u64,
}

impl SocialConfig {
    /// Whether conversations are allowed at the given game hour.
    pub const fn hour_permitted(&self, hour: u32) -> bool {
        hour >= self.earliest_hour && hour < self.latest_hour
    }
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            search_radius: default_search_radius(),
            compatibility_threshold: default_compatibility_threshold(),
            social_need_floor: default_social_need_floor(),
            stress_ceiling: default_stress_ceiling(),
            earliest_hour: default_earliest_hour(),
            latest_hour: default_latest_hour(),
            partner_cooldown_ms: default_partner_cooldown_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_energy_rate() -> f64 {
    -0.2
}

const fn default_hunger_rate() -> f64 {
    0.3
}

const fn default_fatigue_rate() -> f64 {
    0.2
}

const fn default_happiness_rate() -> f64 {
    -0.1
}

const fn default_stress_rate() -> f64 {
    0.15
}

const fn default_satisfaction_rate() -> f64 {
    -0.1
}

const fn default_social_rate() -> f64 {
    0.25
}

const fn default_work_ms() -> u64 {
    120_000
}

const fn default_rest_ms() -> u64 {
    90_000
}

const fn default_eat_ms() -> u64 {
    60_000
}

const fn default_socialize_ms() -> u64 {
    180_000
}

const fn default_entertainment_ms() -> u64 {
    150_000
}

const fn default_relax_ms() -> u64 {
    60_000
}

const fn default_urgent_energy() -> f64 {
    20.0
}

const fn default_urgent_high() -> f64 {
    80.0
}

const fn default_success_cooldown_ms() -> u64 {
    5_000
}

const fn default_failure_cooldown_ms() -> u64 {
    8_000
}

const fn default_no_target_cooldown_ms() -> u64 {
    10_000
}

const fn default_error_cooldown_ms() -> u64 {
    15_000
}

const fn default_action_timeout_ms() -> u64 {
    300_000
}

const fn default_movement_timeout_ms() -> u64 {
    10_000
}

const fn default_think_interval_ms() -> u64 {
    5_000
}

const fn default_movement_speed() -> f64 {
    60.0
}

const fn default_arrival_tolerance() -> f64 {
    1.0
}

const fn default_completed_history_cap() -> usize {
    20
}

const fn default_failed_history_cap() -> usize {
    10
}

const fn default_decision_log_cap() -> usize {
    10
}

const fn default_short_term_cap() -> usize {
    20
}

const fn default_long_term_cap() -> usize {
    100
}

const fn default_relationship_history_cap() -> usize {
    20
}

const fn default_relationship_idle_ms() -> u64 {
    86_400_000
}

const fn default_recency_half_life_ms() -> u64 {
    60_000
}

const fn default_search_radius() -> f64 {
    100.0
}

const fn default_compatibility_threshold() -> f64 {
    0.5
}

const fn default_social_need_floor() -> f64 {
    30.0
}

const fn default_stress_ceiling() -> f64 {
    80.0
}

const fn default_earliest_hour() -> u32 {
    6
}

const fn default_latest_hour() -> u32 {
    22
}

const fn default_partner_cooldown_ms() -> u64 {
    30_000
}
