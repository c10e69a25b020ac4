//! Physical, emotional, and social state of an agent.
//!
//! [`AgentState`] is a value record. It is never mutated in place: every
//! change goes through [`AgentState::apply`], which returns a new state with
//! each field clamped to `[0, 100]`. A [`StateDelta`] describes a change and
//! is also what action history records as the measured impact of an action.

use serde::{Deserialize, Serialize};

use civitas_types::{ActionKind, NeedSummary, StateBars};

use crate::config::NaturalRates;

/// Lower bound of every state field.
pub const STATE_MIN: f64 = 0.0;

/// Upper bound of every state field.
pub const STATE_MAX: f64 = 100.0;

/// Clamp a value to the state range. Non-finite values collapse to the
/// lower bound.
fn clamp_field(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(STATE_MIN, STATE_MAX)
    } else {
        STATE_MIN
    }
}

/// Current state of one agent. All fields are in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Physical energy. Low energy forces rest.
    pub energy: f64,
    /// General health.
    pub health: f64,
    /// Hunger. High hunger forces eating.
    pub hunger: f64,
    /// Accumulated fatigue.
    pub fatigue: f64,
    /// Happiness.
    pub happiness: f64,
    /// Stress. High stress forces relaxing.
    pub stress: f64,
    /// Life satisfaction.
    pub satisfaction: f64,
    /// Need for company. High values force socializing.
    pub social_needs: f64,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            energy: 100.0,
            health: 100.0,
            hunger: 0.0,
            fatigue: 0.0,
            happiness: 100.0,
            stress: 0.0,
            satisfaction: 100.0,
            social_needs: 100.0,
        }
    }
}

impl AgentState {
    /// Apply a delta and return the resulting state, clamped to range.
    #[must_use]
    pub fn apply(self, delta: StateDelta) -> Self {
        Self {
            energy: clamp_field(self.energy + delta.energy),
            health: clamp_field(self.health + delta.health),
            hunger: clamp_field(self.hunger + delta.hunger),
            fatigue: clamp_field(self.fatigue + delta.fatigue),
            happiness: clamp_field(self.happiness + delta.happiness),
            stress: clamp_field(self.stress + delta.stress),
            satisfaction: clamp_field(self.satisfaction + delta.satisfaction),
            social_needs: clamp_field(self.social_needs + delta.social_needs),
        }
    }

    /// Return this state with every field forced into range.
    ///
    /// Used on states that come from outside, such as restored snapshots.
    #[must_use]
    pub fn clamped(self) -> Self {
        self.apply(StateDelta::default())
    }

    /// The change that turns `earlier` into `self`.
    pub fn delta_since(self, earlier: Self) -> StateDelta {
        StateDelta {
            energy: self.energy - earlier.energy,
            health: self.health - earlier.health,
            hunger: self.hunger - earlier.hunger,
            fatigue: self.fatigue - earlier.fatigue,
            happiness: self.happiness - earlier.happiness,
            stress: self.stress - earlier.stress,
            satisfaction: self.satisfaction - earlier.satisfaction,
            social_needs: self.social_needs - earlier.social_needs,
        }
    }

    /// Whether every field is within `[0, 100]`.
    pub fn in_bounds(&self) -> bool {
        [
            self.energy,
            self.health,
            self.hunger,
            self.fatigue,
            self.happiness,
            self.stress,
            self.satisfaction,
            self.social_needs,
        ]
        .iter()
        .all(|v| (STATE_MIN..=STATE_MAX).contains(v))
    }

    /// Summary of the fields that drive decisions.
    pub const fn need_summary(&self) -> NeedSummary {
        NeedSummary {
            energy: self.energy,
            hunger: self.hunger,
            stress: self.stress,
            social_needs: self.social_needs,
            happiness: self.happiness,
        }
    }

    /// Render bars for this state.
    pub const fn bars(&self) -> StateBars {
        StateBars {
            energy: self.energy,
            health: self.health,
            hunger: self.hunger,
            fatigue: self.fatigue,
            happiness: self.happiness,
            stress: self.stress,
            satisfaction: self.satisfaction,
            social_needs: self.social_needs,
        }
    }
}

/// A change to apply to an [`AgentState`]. Fields default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StateDelta {
    /// Energy change.
    #[serde(default)]
    pub energy: f64,
    /// Health change.
    #[serde(default)]
    pub health: f64,
    /// Hunger change.
    #[serde(default)]
    pub hunger: f64,
    /// Fatigue change.
    #[serde(default)]
    pub fatigue: f64,
    /// Happiness change.
    #[serde(default)]
    pub happiness: f64,
    /// Stress change.
    #[serde(default)]
    pub stress: f64,
    /// Satisfaction change.
    #[serde(default)]
    pub satisfaction: f64,
    /// Social need change.
    #[serde(default)]
    pub social_needs: f64,
}

impl StateDelta {
    /// Natural drift over `game_minutes` of game time.
    pub fn natural(rates: &NaturalRates, game_minutes: f64) -> Self {
        let minutes = if game_minutes.is_finite() {
            game_minutes.max(0.0)
        } else {
            0.0
        };
        Self {
            energy: rates.energy * minutes,
            health: 0.0,
            hunger: rates.hunger * minutes,
            fatigue: rates.fatigue * minutes,
            happiness: rates.happiness * minutes,
            stress: rates.stress * minutes,
            satisfaction: rates.satisfaction * minutes,
            social_needs: rates.social_needs * minutes,
        }
    }

    /// The effect of completing an action of the given kind.
    #[allow(clippy::match_same_arms)]
    pub fn on_completion(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Rest => Self {
                energy: 30.0,
                stress: -20.0,
                ..Self::default()
            },
            ActionKind::Eat => Self {
                hunger: -50.0,
                energy: 10.0,
                happiness: 5.0,
                ..Self::default()
            },
            ActionKind::Relax => Self {
                stress: -30.0,
                happiness: 15.0,
                energy: 10.0,
                ..Self::default()
            },
            ActionKind::Socialize => Self {
                social_needs: -30.0,
                happiness: 10.0,
                stress: -10.0,
                ..Self::default()
            },
            ActionKind::Work => Self {
                energy: -10.0,
                stress: 15.0,
                satisfaction: 5.0,
                social_needs: 5.0,
                ..Self::default()
            },
            ActionKind::Entertainment => Self {
                energy: -5.0,
                happiness: 20.0,
                stress: -20.0,
                ..Self::default()
            },
        }
    }

    /// Energy spent when an action starts.
    pub fn energy_cost(cost: f64) -> Self {
        Self {
            energy: -cost,
            ..Self::default()
        }
    }

    /// Stress change applied when an action completes.
    pub fn stress(impact: f64) -> Self {
        Self {
            stress: impact,
            ..Self::default()
        }
    }

    /// Field-wise sum of two deltas.
    #[must_use]
    pub fn plus(self, other: Self) -> Self {
        Self {
            energy: self.energy + other.energy,
            health: self.health + other.health,
            hunger: self.hunger + other.hunger,
            fatigue: self.fatigue + other.fatigue,
            happiness: self.happiness + other.happiness,
            stress: self.stress + other.stress,
            satisfaction: self.satisfaction + other.satisfaction,
            social_needs: self.social_needs + other.social_needs,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn make_state(energy: f64, hunger: f64, stress: f64, social: f64) -> AgentState {
        AgentState {
            energy,
            hunger,
            stress,
            social_needs: social,
            ..AgentState::default()
        }
    }

    #[test]
    fn initial_values() {
        let state = AgentState::default();
        assert!((state.energy - 100.0).abs() < f64::EPSILON);
        assert!(state.hunger.abs() < f64::EPSILON);
        assert!((state.social_needs - 100.0).abs() < f64::EPSILON);
        assert!(state.in_bounds());
    }

    #[test]
    fn apply_is_pure_and_clamps() {
        let before = make_state(95.0, 10.0, 5.0, 50.0);
        let after = before.apply(StateDelta::on_completion(ActionKind::Rest));
        assert!((after.energy - 100.0).abs() < f64::EPSILON);
        assert!(after.stress.abs() < f64::EPSILON);
        // The original is untouched.
        assert!((before.energy - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn natural_drift_per_minute() {
        let state = AgentState::default();
        let drift = StateDelta::natural(&NaturalRates::default(), 10.0);
        let after = state.apply(drift);
        assert!((after.energy - 98.0).abs() < 1e-9);
        assert!((after.hunger - 3.0).abs() < 1e-9);
        assert!((after.stress - 1.5).abs() < 1e-9);
    }

    #[test]
    fn negative_minutes_do_nothing() {
        let drift = StateDelta::natural(&NaturalRates::default(), -5.0);
        assert_eq!(drift, StateDelta::default());
    }

    #[test]
    fn non_finite_values_collapse() {
        let state = AgentState::default().apply(StateDelta {
            energy: f64::NAN,
            ..StateDelta::default()
        });
        assert!(state.in_bounds());
    }

    #[test]
    fn delta_since_measures_impact() {
        let before = make_state(50.0, 50.0, 50.0, 50.0);
        let after = before.apply(StateDelta::on_completion(ActionKind::Eat));
        let impact = after.delta_since(before);
        assert!((impact.hunger - -50.0).abs() < 1e-9);
        assert!((impact.energy - 10.0).abs() < 1e-9);
    }

    fn arb_delta() -> impl Strategy<Value = StateDelta> {
        let field = -500.0_f64..500.0;
        (
            field.clone(),
            field.clone(),
            field.clone(),
            field.clone(),
            field.clone(),
            field.clone(),
            field.clone(),
            field,
        )
            .prop_map(
                |(energy, health, hunger, fatigue, happiness, stress, satisfaction, social_needs)| {
                    StateDelta {
                        energy,
                        health,
                        hunger,
                        fatigue,
                        happiness,
                        stress,
                        satisfaction,
                        social_needs,
                    }
                },
            )
    }

    proptest! {
        #[test]
        fn any_sequence_of_deltas_stays_in_bounds(deltas in prop::collection::vec(arb_delta(), 1..40)) {
            let mut state = AgentState::default();
            for delta in deltas {
                state = state.apply(delta);
                prop_assert!(state.in_bounds());
            }
        }
    }
}
