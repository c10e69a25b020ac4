//! The decision oracle seam: trait, offline stub, and response validation.
//!
//! Agents that have no urgent need ask a [`DecisionOracle`] what to do. The
//! oracle is an external, untrusted, possibly slow service, so every call
//! from the tick loop goes through [`with_deadline`] and every response
//! goes through [`validate_decision`] or [`validate_conversation`] before
//! it reaches an agent. Failures never propagate past this module's
//! callers: each has a deterministic fallback.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use civitas_types::{
    ActionKind, BuildingId, Conversation, ConversationContext, ConversationPayload,
    DailySchedule, Decision, DecisionContext, DecisionOrigin, DecisionPayload, Mood, Personality,
    PersonalitySeed, ScheduleRequest, TimeSlot,
};

/// Largest energy cost a decision may carry.
const MAX_ENERGY_COST: f64 = 50.0;

/// Errors an oracle call can end in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// No oracle is configured, or every provider is exhausted.
    #[error("oracle unavailable: {reason}")]
    Unavailable {
        /// Why no call was made.
        reason: String,
    },

    /// The call did not finish within the hard deadline.
    #[error("oracle call timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline in milliseconds.
        timeout_ms: u64,
    },

    /// The provider or the local limiter refused the request.
    #[error("rate limited by {provider}, retry in {retry_after_ms}ms")]
    RateLimited {
        /// Provider that refused.
        provider: String,
        /// Milliseconds until a retry may succeed.
        retry_after_ms: u64,
    },

    /// The provider rejected the credentials.
    #[error("provider {provider} rejected the API key")]
    Unauthorized {
        /// Provider that refused.
        provider: String,
    },

    /// The provider answered with an error status or could not be reached.
    #[error("provider {provider} failed: {message}")]
    Provider {
        /// Provider that failed.
        provider: String,
        /// Status and body, or the transport error.
        message: String,
    },

    /// The response text held no usable JSON.
    #[error("unparseable oracle response: {reason}")]
    Parse {
        /// What went wrong.
        reason: String,
    },
}

/// Why an oracle response was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidDecision {
    /// A required field was absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// The action is not one the simulation knows.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Energy cost outside `[0, 50]`.
    #[error("energy cost {0} out of range")]
    EnergyCostOutOfRange(f64),

    /// Stress impact is NaN or infinite.
    #[error("stress impact is not finite")]
    NonFiniteStressImpact,
}

// ---------------------------------------------------------------------------
// Oracle trait
// ---------------------------------------------------------------------------

/// A source of decisions, conversations, and agent profiles.
///
/// Implementations may fail on any call; callers always have a fallback.
/// Methods take `&mut self` because real oracles keep cache and rate-limit
/// state between calls.
pub trait DecisionOracle {
    /// Ask what an agent should do next.
    fn get_decision(
        &mut self,
        context: &DecisionContext,
    ) -> impl Future<Output = Result<DecisionPayload, OracleError>> + Send;

    /// Generate the content of a conversation between two agents.
    fn generate_conversation(
        &mut self,
        context: &ConversationContext,
    ) -> impl Future<Output = Result<ConversationPayload, OracleError>> + Send;

    /// Flesh out a personality for a new agent.
    fn generate_personality(
        &mut self,
        seed: &PersonalitySeed,
    ) -> impl Future<Output = Result<Personality, OracleError>> + Send;

    /// Plan a day for an agent.
    fn generate_daily_schedule(
        &mut self,
        request: &ScheduleRequest,
    ) -> impl Future<Output = Result<DailySchedule, OracleError>> + Send;

    /// Release connections and flush state.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// An oracle that is never available.
///
/// Every agent runs on urgent needs and the local fallback. Used when no
/// provider is configured and in tests.
#[derive(Debug, Clone, Default)]
pub struct OfflineOracle;

impl OfflineOracle {
    /// Create a new offline oracle.
    pub const fn new() -> Self {
        Self
    }

    fn unavailable<T>() -> Result<T, OracleError> {
        Err(OracleError::Unavailable {
            reason: "offline".to_owned(),
        })
    }
}

impl DecisionOracle for OfflineOracle {
    async fn get_decision(
        &mut self,
        _context: &DecisionContext,
    ) -> Result<DecisionPayload, OracleError> {
        Self::unavailable()
    }

    async fn generate_conversation(
        &mut self,
        _context: &ConversationContext,
    ) -> Result<ConversationPayload, OracleError> {
        Self::unavailable()
    }

    async fn generate_personality(
        &mut self,
        _seed: &PersonalitySeed,
    ) -> Result<Personality, OracleError> {
        Self::unavailable()
    }

    async fn generate_daily_schedule(
        &mut self,
        _request: &ScheduleRequest,
    ) -> Result<DailySchedule, OracleError> {
        Self::unavailable()
    }
}

/// Run an oracle call under a hard deadline.
///
/// # Errors
///
/// Returns [`OracleError::Timeout`] if the call does not finish in time,
/// or whatever error the call itself returned.
pub async fn with_deadline<T, F>(timeout_ms: u64, call: F) -> Result<T, OracleError>
where
    F: Future<Output = Result<T, OracleError>>,
{
    tokio::time::timeout(Duration::from_millis(timeout_ms), call)
        .await
        .unwrap_or(Err(OracleError::Timeout { timeout_ms }))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Turn an untrusted decision payload into a [`Decision`].
///
/// All five fields must be present. `resolve` maps the target text (a
/// building name or id) to a building; an unknown target is kept as `None`
/// and left to the registry.
pub fn validate_decision(
    payload: DecisionPayload,
    resolve: impl Fn(&str) -> Option<BuildingId>,
) -> Result<Decision, InvalidDecision> {
    let action_label = payload.action.ok_or(InvalidDecision::MissingField("action"))?;
    let target = payload.target.ok_or(InvalidDecision::MissingField("target"))?;
    let reason = payload.reason.ok_or(InvalidDecision::MissingField("reason"))?;
    let energy_cost = payload
        .energy_cost
        .ok_or(InvalidDecision::MissingField("energyCost"))?;
    let stress_impact = payload
        .stress_impact
        .ok_or(InvalidDecision::MissingField("stressImpact"))?;

    let Some(action) = ActionKind::from_label(action_label.trim()) else {
        return Err(InvalidDecision::UnknownAction(action_label));
    };
    if !(0.0..=MAX_ENERGY_COST).contains(&energy_cost) {
        return Err(InvalidDecision::EnergyCostOutOfRange(energy_cost));
    }
    if !stress_impact.is_finite() {
        return Err(InvalidDecision::NonFiniteStressImpact);
    }

    Ok(Decision {
        action,
        target: resolve(target.trim()),
        reason,
        energy_cost,
        stress_impact,
        origin: DecisionOrigin::Oracle,
    })
}

/// Turn an untrusted conversation payload into a [`Conversation`].
///
/// Content and topic are required. Mood defaults to neutral, impact is
/// clamped to `[-1, 1]`, and quality to `[0, 1]`.
pub fn validate_conversation(payload: ConversationPayload) -> Result<Conversation, InvalidDecision> {
    let content = payload
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or(InvalidDecision::MissingField("content"))?;
    let topic = payload
        .topic
        .filter(|t| !t.trim().is_empty())
        .ok_or(InvalidDecision::MissingField("topic"))?;
    let mood = payload.mood.as_deref().map_or(Mood::Neutral, Mood::from_label);
    let impact = payload
        .impact
        .filter(|i| i.is_finite())
        .map_or(0.0, |i| i.clamp(-1.0, 1.0));
    let quality = payload
        .quality
        .filter(|q| q.is_finite())
        .map_or(0.5, |q| q.clamp(0.0, 1.0));

    Ok(Conversation {
        content,
        topic,
        mood,
        impact,
        quality,
        common_topics: payload.common_topics.unwrap_or_default(),
    })
}

// ---------------------------------------------------------------------------
// Profile fallbacks
// ---------------------------------------------------------------------------

/// Personality used when the oracle cannot generate one.
pub fn fallback_personality(seed: &PersonalitySeed) -> Personality {
    Personality {
        traits: seed.traits.clone(),
        interests: Vec::new(),
        values: Vec::new(),
        goals: vec![format!("Do good work as a {}", seed.occupation)],
    }
}

/// Daily plan used when the oracle cannot generate one.
pub fn fallback_schedule() -> DailySchedule {
    let slot = |items: &[&str]| items.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>();
    DailySchedule {
        slots: BTreeMap::from([
            (
                TimeSlot::Morning,
                slot(&[
                    "07:00 wake up at home",
                    "07:30 breakfast at home",
                    "08:30 work at the workplace",
                ]),
            ),
            (
                TimeSlot::Afternoon,
                slot(&["12:00 lunch at a restaurant", "13:00 work at the workplace"]),
            ),
            (
                TimeSlot::Evening,
                slot(&["18:00 dinner at home", "19:00 relax at home"]),
            ),
            (TimeSlot::Night, slot(&["22:00 sleep at home"])),
        ]),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_payload() -> DecisionPayload {
        DecisionPayload {
            action: Some("eat".to_owned()),
            target: Some("Corner Cafe".to_owned()),
            reason: Some("Lunch time".to_owned()),
            energy_cost: Some(5.0),
            stress_impact: Some(-5.0),
        }
    }

    #[test]
    fn valid_payload_resolves_target() {
        let cafe = BuildingId::new();
        let decision =
            validate_decision(make_payload(), |name| (name == "Corner Cafe").then_some(cafe))
                .unwrap();
        assert_eq!(decision.action, ActionKind::Eat);
        assert_eq!(decision.target, Some(cafe));
        assert_eq!(decision.origin, DecisionOrigin::Oracle);
    }

    #[test]
    fn unknown_target_is_left_to_the_registry() {
        let decision = validate_decision(make_payload(), |_| None).unwrap();
        assert!(decision.target.is_none());
    }

    #[test]
    fn missing_fields_are_rejected() {
        let payload = DecisionPayload {
            stress_impact: None,
            ..make_payload()
        };
        assert_eq!(
            validate_decision(payload, |_| None),
            Err(InvalidDecision::MissingField("stressImpact"))
        );
    }

    #[test]
    fn unknown_action_is_rejected() {
        let payload = DecisionPayload {
            action: Some("fly".to_owned()),
            ..make_payload()
        };
        assert!(matches!(
            validate_decision(payload, |_| None),
            Err(InvalidDecision::UnknownAction(_))
        ));
    }

    #[test]
    fn energy_cost_out_of_range_is_rejected() {
        for cost in [-1.0, 50.5, f64::NAN] {
            let payload = DecisionPayload {
                energy_cost: Some(cost),
                ..make_payload()
            };
            assert!(matches!(
                validate_decision(payload, |_| None),
                Err(InvalidDecision::EnergyCostOutOfRange(_))
            ));
        }
    }

    #[test]
    fn infinite_stress_is_rejected() {
        let payload = DecisionPayload {
            stress_impact: Some(f64::INFINITY),
            ..make_payload()
        };
        assert_eq!(
            validate_decision(payload, |_| None),
            Err(InvalidDecision::NonFiniteStressImpact)
        );
    }

    #[test]
    fn conversation_defaults_and_clamps() {
        let payload = ConversationPayload {
            content: Some("Talked about the weather".to_owned()),
            topic: Some("weather".to_owned()),
            mood: Some("ecstatic".to_owned()),
            impact: Some(4.0),
            quality: None,
            common_topics: None,
        };
        let conversation = validate_conversation(payload).unwrap();
        assert_eq!(conversation.mood, Mood::Neutral);
        assert!((conversation.impact - 1.0).abs() < f64::EPSILON);
        assert!((conversation.quality - 0.5).abs() < f64::EPSILON);
        assert!(conversation.common_topics.is_empty());
    }

    #[test]
    fn empty_conversation_is_rejected() {
        let payload = ConversationPayload {
            content: Some("   ".to_owned()),
            topic: Some("x".to_owned()),
            ..ConversationPayload::default()
        };
        assert_eq!(
            validate_conversation(payload),
            Err(InvalidDecision::MissingField("content"))
        );
    }

    #[tokio::test]
    async fn offline_oracle_is_unavailable() {
        let mut oracle = OfflineOracle::new();
        let seed = PersonalitySeed {
            name: "Ada".to_owned(),
            occupation: "engineer".to_owned(),
            traits: vec!["curious".to_owned()],
        };
        let result = oracle.generate_personality(&seed).await;
        assert!(matches!(result, Err(OracleError::Unavailable { .. })));
        assert_eq!(fallback_personality(&seed).traits, vec!["curious"]);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_slow_calls() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<u32, OracleError>(1)
        };
        let result = with_deadline(500, slow).await;
        assert_eq!(result, Err(OracleError::Timeout { timeout_ms: 500 }));
    }

    #[tokio::test]
    async fn deadline_passes_fast_results_through() {
        let result = with_deadline(500, async { Ok::<u32, OracleError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn fallback_schedule_covers_every_slot() {
        let schedule = fallback_schedule();
        for slot in [
            TimeSlot::Morning,
            TimeSlot::Afternoon,
            TimeSlot::Evening,
            TimeSlot::Night,
        ] {
            assert!(!schedule.activities(slot).is_empty());
        }
    }
}
