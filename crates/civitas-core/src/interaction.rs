//! Social interaction protocol.
//!
//! A conversation always involves two agents: the initiator, whose
//! socialize action triggered it, and the most compatible partner nearby.
//! The protocol runs in five steps:
//!
//! 1. find an open venue that offers socializing
//! 2. pick the best partner above the compatibility threshold
//! 3. check that both agents are willing
//! 4. ask the oracle for the conversation, or use small talk
//! 5. commit both sides
//!
//! Steps 1 to 4 only read the city. The commit builds both updated agents
//! on the side and writes them back together, so a failure leaves neither
//! side changed.

use tracing::debug;

use civitas_agents::{Agent, SocialConfig, StateDelta, compatibility, relationship_change};
use civitas_types::{
    AgentId, BuildingId, Conversation, ConversationContext, Participant, ServiceKind,
};
use civitas_world::{Building, SEARCH_RANGE};

use crate::decision::{DecisionOracle, validate_conversation, with_deadline};
use crate::tick::CityState;

/// Social need removed by a conversation.
const SOCIAL_RELIEF: f64 = 30.0;
/// Happiness gained per unit of conversation impact.
const HAPPINESS_PER_IMPACT: f64 = 10.0;
/// Stress removed per unit of absolute conversation impact.
const STRESS_PER_IMPACT: f64 = 5.0;
/// Energy a conversation costs.
const CONVERSATION_ENERGY: f64 = 2.0;

/// Errors that abort a conversation before anything is committed.
#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    /// An agent id does not belong to the city.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// An agent cannot talk to themselves.
    #[error("agent {0} cannot converse with themselves")]
    SelfConversation(AgentId),

    /// The venue does not exist.
    #[error("venue not found: {0}")]
    VenueNotFound(BuildingId),

    /// The conversation carries values that cannot be applied.
    #[error("unusable conversation: {reason}")]
    InvalidConversation {
        /// What was wrong with it.
        reason: String,
    },

    /// Applying the conversation would break an agent's state bounds.
    #[error("conversation would leave agent {agent} out of bounds")]
    OutOfBounds {
        /// The agent whose state would break.
        agent: AgentId,
    },
}

/// Why an agent would not take part in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Social need is below the floor.
    LowSocialNeed,
    /// Stress is above the ceiling.
    TooStressed,
    /// The hour is outside the permitted window.
    OutsideHours,
    /// The venue is closed or does not offer socializing.
    VenueUnsuitable,
}

/// A conversation that was held and committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    /// The agent who was approached.
    pub partner: AgentId,
    /// Where it happened.
    pub venue: BuildingId,
    /// What was said.
    pub conversation: Conversation,
    /// Relationship change applied to both sides.
    pub change: f64,
}

/// How a social attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SocialOutcome {
    /// Both agents talked and were updated.
    Interacted(Interaction),
    /// No open building offers socializing nearby.
    NoVenue,
    /// Nobody compatible is close enough.
    NoPartner,
    /// One side was unwilling.
    Declined {
        /// The unwilling agent.
        agent: AgentId,
        /// Why.
        reason: Precondition,
    },
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Step 1: pick where to talk.
///
/// `preferred` is used when it is open and offers socializing; otherwise
/// the nearest such building within walking range.
pub fn find_venue(state: &CityState, agent: &Agent, preferred: Option<BuildingId>) -> Option<BuildingId> {
    let usable = |b: &Building| b.is_open() && b.offers(ServiceKind::Socialize);
    if let Some(building) = preferred.and_then(|id| state.registry.get(id)) {
        if usable(building) {
            return Some(building.id);
        }
    }
    state
        .registry
        .nearby_buildings(agent.position, SEARCH_RANGE)
        .into_iter()
        .find(|b| usable(b))
        .map(|b| b.id)
}

/// Step 2: candidate partners, best first.
///
/// Agents within the search radius whose compatibility exceeds the
/// threshold, excluding anyone the initiator talked to within the partner
/// cooldown. Sorted by compatibility, then distance.
pub fn rank_partners(state: &CityState, initiator: &Agent, now_ms: u64) -> Vec<(AgentId, f64)> {
    let config = &state.social;
    let mut ranked: Vec<(AgentId, f64, f64)> = state
        .nearby_agents(initiator.position, config.search_radius)
        .into_iter()
        .filter(|other| other.id != initiator.id)
        .filter(|other| {
            initiator
                .memory()
                .relationships()
                .get(other.id)
                .is_none_or(|r| {
                    now_ms.saturating_sub(r.last_interaction_ms) >= config.partner_cooldown_ms
                })
        })
        .map(|other| {
            let score = compatibility(
                initiator.social_profile(),
                other.social_profile(),
                initiator.relationship_level(other.id),
            );
            (other.id, score, other.position.distance_to(initiator.position))
        })
        .filter(|(_, score, _)| *score > config.compatibility_threshold)
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.2.total_cmp(&b.2)));
    ranked.into_iter().map(|(id, score, _)| (id, score)).collect()
}

/// Step 3: whether one agent is willing to talk at `venue` now.
///
/// # Errors
///
/// Returns the first precondition that does not hold.
pub fn check_willing(
    agent: &Agent,
    venue: &Building,
    hour: u32,
    config: &SocialConfig,
) -> Result<(), Precondition> {
    if !config.hour_permitted(hour) {
        return Err(Precondition::OutsideHours);
    }
    if !venue.is_open() || !venue.offers(ServiceKind::Socialize) {
        return Err(Precondition::VenueUnsuitable);
    }
    let state = agent.state();
    if state.social_needs < config.social_need_floor {
        return Err(Precondition::LowSocialNeed);
    }
    if state.stress > config.stress_ceiling {
        return Err(Precondition::TooStressed);
    }
    Ok(())
}

/// State change one side of a conversation receives.
pub fn conversation_delta(conversation: &Conversation) -> StateDelta {
    StateDelta {
        social_needs: -SOCIAL_RELIEF,
        happiness: conversation.impact * HAPPINESS_PER_IMPACT,
        stress: -(conversation.impact.abs() * STRESS_PER_IMPACT),
        energy: -CONVERSATION_ENERGY,
        ..StateDelta::default()
    }
}

fn participant(agent: &Agent) -> Participant {
    Participant {
        agent_id: agent.id,
        name: agent.name.clone(),
        occupation: agent.occupation.clone(),
        personality: agent.personality.clone(),
        needs: agent.state().need_summary(),
    }
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Run the whole protocol for `initiator`.
///
/// # Errors
///
/// Returns a [`SocialError`] if the commit is refused. Nothing has been
/// changed in that case.
pub async fn interact<O: DecisionOracle>(
    state: &mut CityState,
    oracle: &mut O,
    initiator: AgentId,
    preferred: Option<BuildingId>,
) -> Result<SocialOutcome, SocialError> {
    let now_ms = state.clock.now_ms();
    let hour = state.clock.game_hour();
    let agent = state
        .agent(initiator)
        .ok_or(SocialError::AgentNotFound(initiator))?;

    let Some(venue_id) = find_venue(state, agent, preferred) else {
        return Ok(SocialOutcome::NoVenue);
    };
    let venue = state
        .registry
        .get(venue_id)
        .ok_or(SocialError::VenueNotFound(venue_id))?;

    let Some((partner_id, score)) = rank_partners(state, agent, now_ms).into_iter().next() else {
        return Ok(SocialOutcome::NoPartner);
    };
    let partner = state
        .agent(partner_id)
        .ok_or(SocialError::AgentNotFound(partner_id))?;

    for side in [agent, partner] {
        if let Err(reason) = check_willing(side, venue, hour, &state.social) {
            return Ok(SocialOutcome::Declined {
                agent: side.id,
                reason,
            });
        }
    }

    let context = ConversationContext {
        initiator: participant(agent),
        partner: participant(partner),
        location: venue.name.clone(),
        time_slot: state.clock.time_slot(),
        relationship_level: agent.relationship_level(partner_id),
    };
    debug!(agent_id = %initiator, partner = %partner_id, compatibility = score, "Starting conversation");

    let conversation = match with_deadline(state.oracle_timeout_ms, oracle.generate_conversation(&context))
        .await
        .map_err(|e| e.to_string())
        .and_then(|payload| validate_conversation(payload).map_err(|e| e.to_string()))
    {
        Ok(conversation) => conversation,
        Err(reason) => {
            debug!(agent_id = %initiator, reason = %reason, "Using small talk");
            Conversation::small_talk()
        }
    };

    let change = commit(state, initiator, partner_id, venue_id, &conversation)?;
    Ok(SocialOutcome::Interacted(Interaction {
        partner: partner_id,
        venue: venue_id,
        conversation,
        change,
    }))
}

/// Step 5: apply a conversation to both agents as one unit.
///
/// Both updated agents are built from copies and checked before either is
/// written back. Returns the relationship change applied to both sides.
///
/// # Errors
///
/// Returns a [`SocialError`] without touching either agent if an id is
/// unknown, the conversation carries non-finite values, or either state
/// would leave its bounds.
pub fn commit(
    state: &mut CityState,
    initiator: AgentId,
    partner: AgentId,
    venue: BuildingId,
    conversation: &Conversation,
) -> Result<f64, SocialError> {
    if initiator == partner {
        return Err(SocialError::SelfConversation(initiator));
    }
    if !conversation.impact.is_finite() || !conversation.quality.is_finite() {
        return Err(SocialError::InvalidConversation {
            reason: String::from("impact and quality must be finite"),
        });
    }
    let venue_name = state
        .registry
        .name_of(venue)
        .map(String::from)
        .ok_or(SocialError::VenueNotFound(venue))?;
    let first_index = state
        .index_of(initiator)
        .ok_or(SocialError::AgentNotFound(initiator))?;
    let second_index = state
        .index_of(partner)
        .ok_or(SocialError::AgentNotFound(partner))?;

    let mut first = state
        .agent(initiator)
        .cloned()
        .ok_or(SocialError::AgentNotFound(initiator))?;
    let mut second = state
        .agent(partner)
        .cloned()
        .ok_or(SocialError::AgentNotFound(partner))?;

    let now_ms = state.clock.now_ms();
    let change = relationship_change(conversation);
    let delta = conversation_delta(conversation);
    let (first_name, second_name) = (first.name.clone(), second.name.clone());

    first.apply(delta);
    second.apply(delta);
    first.record_conversation(now_ms, partner, &second_name, conversation, change, &venue_name);
    second.record_conversation(now_ms, initiator, &first_name, conversation, change, &venue_name);

    for side in [&first, &second] {
        if !side.state().in_bounds() {
            return Err(SocialError::OutOfBounds { agent: side.id });
        }
    }

    state.put_agent(first_index, first);
    state.put_agent(second_index, second);
    Ok(change)
}
