//! Need model: urgent needs and the deterministic fallback decision.
//!
//! Urgent needs are checked in strict priority order and the first match
//! wins:
//!
//! 1. energy below threshold: rest at a residential building
//! 2. hunger above threshold: eat at a food building
//! 3. stress above threshold: relax at a park
//! 4. social need above threshold: socialize at a public space
//!
//! An urgent need bypasses the decision oracle entirely. When nothing is
//! urgent the oracle is consulted, and [`fallback_decision`] stands in
//! whenever the oracle cannot answer.

use civitas_types::{ActionKind, BuildingId, BuildingKind, Decision, DecisionOrigin};

use crate::config::UrgencyThresholds;
use crate::state::AgentState;

/// Energy below which the fallback chooses rest.
const FALLBACK_LOW_ENERGY: f64 = 30.0;

/// Stress above which the fallback chooses relaxing.
const FALLBACK_HIGH_STRESS: f64 = 70.0;

/// Social need above which the fallback chooses socializing.
const FALLBACK_HIGH_SOCIAL: f64 = 70.0;

/// A need pressing enough to override normal decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrgentNeed {
    /// Energy is critically low.
    Rest,
    /// Hunger is critically high.
    Eat,
    /// Stress is critically high.
    Relax,
    /// Social need is critically high.
    Socialize,
}

impl UrgentNeed {
    /// The action that addresses this need.
    pub const fn action(self) -> ActionKind {
        match self {
            Self::Rest => ActionKind::Rest,
            Self::Eat => ActionKind::Eat,
            Self::Relax => ActionKind::Relax,
            Self::Socialize => ActionKind::Socialize,
        }
    }

    /// Building kinds that may serve this need.
    pub const fn building_kinds(self) -> &'static [BuildingKind] {
        match self {
            Self::Rest => &[BuildingKind::Residential],
            Self::Eat => &[
                BuildingKind::Restaurant,
                BuildingKind::Cafeteria,
                BuildingKind::Cafe,
            ],
            Self::Relax => &[BuildingKind::Park],
            Self::Socialize => &[
                BuildingKind::Plaza,
                BuildingKind::Park,
                BuildingKind::CommunityCenter,
            ],
        }
    }

    /// Short explanation recorded with the decision.
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Rest => "Exhausted, needs to rest",
            Self::Eat => "Very hungry, needs food",
            Self::Relax => "Overwhelmed by stress, needs to unwind",
            Self::Socialize => "Lonely, needs company",
        }
    }

    /// Build the decision for this need. Rest goes home when the agent has
    /// a residence. Every other target is left to the building registry.
    pub fn decision(self, residence: Option<BuildingId>) -> Decision {
        let target = match self {
            Self::Rest => residence,
            Self::Eat | Self::Relax | Self::Socialize => None,
        };
        Decision {
            action: self.action(),
            target,
            reason: String::from(self.reason()),
            energy_cost: 0.0,
            stress_impact: 0.0,
            origin: DecisionOrigin::Urgent,
        }
    }
}

/// Return the single most urgent need, if any.
///
/// Checks run in priority order and the first match wins, so an exhausted,
/// starving, stressed, lonely agent rests.
pub fn urgent_need(state: &AgentState, thresholds: &UrgencyThresholds) -> Option<UrgentNeed> {
    if state.energy < thresholds.energy_below {
        return Some(UrgentNeed::Rest);
    }
    if state.hunger > thresholds.hunger_above {
        return Some(UrgentNeed::Eat);
    }
    if state.stress > thresholds.stress_above {
        return Some(UrgentNeed::Relax);
    }
    if state.social_needs > thresholds.social_above {
        return Some(UrgentNeed::Socialize);
    }
    None
}

/// Deterministic decision used when the oracle is unavailable, slow, or
/// returns something invalid.
pub fn fallback_decision(state: &AgentState, residence: Option<BuildingId>) -> Decision {
    let (action, target, reason, energy_cost, stress_impact) = if state.energy < FALLBACK_LOW_ENERGY
    {
        (ActionKind::Rest, residence, "Tired, going home to rest", 5.0, -10.0)
    } else if state.stress > FALLBACK_HIGH_STRESS {
        (ActionKind::Relax, None, "Stressed, heading to a park", 5.0, -15.0)
    } else if state.social_needs > FALLBACK_HIGH_SOCIAL {
        (ActionKind::Socialize, None, "Wants some company", 10.0, -5.0)
    } else {
        (ActionKind::Rest, residence, "Nothing pressing, taking it easy", 5.0, -5.0)
    };

    Decision {
        action,
        target,
        reason: String::from(reason),
        energy_cost,
        stress_impact,
        origin: DecisionOrigin::Fallback,
    }
}

/// Building kinds the fallback prefers for an action, before the normal
/// day/night rules apply.
pub const fn fallback_building_kinds(action: ActionKind) -> &'static [BuildingKind] {
    match action {
        ActionKind::Relax => &[BuildingKind::Park],
        ActionKind::Socialize => &[BuildingKind::Plaza],
        ActionKind::Rest => &[BuildingKind::Residential],
        ActionKind::Work | ActionKind::Eat | ActionKind::Entertainment => &[],
    }
}

#[cfg(test)]
mod tests {
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
    fn priority_order_resolves_to_rest() {
        let state = make_state(10.0, 90.0, 90.0, 90.0);
        let need = urgent_need(&state, &UrgencyThresholds::default());
        assert_eq!(need, Some(UrgentNeed::Rest));
    }

    #[test]
    fn hunger_beats_stress_and_social() {
        let state = make_state(50.0, 90.0, 90.0, 90.0);
        let need = urgent_need(&state, &UrgencyThresholds::default());
        assert_eq!(need, Some(UrgentNeed::Eat));
    }

    #[test]
    fn stress_beats_social() {
        let state = make_state(50.0, 10.0, 90.0, 90.0);
        assert_eq!(
            urgent_need(&state, &UrgencyThresholds::default()),
            Some(UrgentNeed::Relax)
        );
    }

    #[test]
    fn thresholds_are_strict() {
        let state = make_state(20.0, 80.0, 80.0, 80.0);
        assert_eq!(urgent_need(&state, &UrgencyThresholds::default()), None);
    }

    #[test]
    fn urgent_rest_targets_residence() {
        let home = BuildingId::new();
        let decision = UrgentNeed::Rest.decision(Some(home));
        assert_eq!(decision.action, ActionKind::Rest);
        assert_eq!(decision.target, Some(home));
        assert_eq!(decision.origin, DecisionOrigin::Urgent);
        assert_eq!(UrgentNeed::Rest.building_kinds(), &[BuildingKind::Residential]);
    }

    #[test]
    fn fallback_prefers_rest_when_tired() {
        let home = BuildingId::new();
        let decision = fallback_decision(&make_state(25.0, 0.0, 90.0, 90.0), Some(home));
        assert_eq!(decision.action, ActionKind::Rest);
        assert_eq!(decision.target, Some(home));
        assert_eq!(decision.origin, DecisionOrigin::Fallback);
    }

    #[test]
    fn fallback_relaxes_when_stressed() {
        let decision = fallback_decision(&make_state(60.0, 0.0, 75.0, 90.0), None);
        assert_eq!(decision.action, ActionKind::Relax);
        assert!((decision.stress_impact - -15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fallback_socializes_when_lonely() {
        let decision = fallback_decision(&make_state(60.0, 0.0, 10.0, 75.0), None);
        assert_eq!(decision.action, ActionKind::Socialize);
        assert!((decision.energy_cost - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fallback_defaults_to_rest() {
        let decision = fallback_decision(&make_state(60.0, 0.0, 10.0, 10.0), None);
        assert_eq!(decision.action, ActionKind::Rest);
    }
}
