//! Resident seeding for a fresh city.
//!
//! Residents are created deterministically from the city seed: resident
//! `i` always gets the same id, name, home, workplace, and starting traits,
//! so snapshots from an earlier run line up with the new agents. The oracle
//! fleshes out each personality and daily schedule; when it cannot, the
//! local fallbacks are used.

use civitas_agents::{Agent, AgentSpawn};
use civitas_core::decision::{
    DecisionOracle, fallback_personality, fallback_schedule, with_deadline,
};
use civitas_core::tick::CityState;
use civitas_types::{
    AgentId, BuildingId, DailySchedule, Personality, PersonalitySeed, Position, ScheduleRequest,
};
use civitas_world::StartingBuildingIds;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;

// -----------------------------------------------------------------------
// Pools
// -----------------------------------------------------------------------

const NAME_POOL: &[&str] = &[
    "Ada", "Ben", "Cora", "Dev", "Elena", "Felix", "Grace", "Hiro", "Iris", "Jonah", "Kira",
    "Leo", "Maya", "Nico", "Olive", "Priya", "Quinn", "Rosa", "Sami", "Theo",
];

/// One occupation per entry of [`StartingBuildingIds::workplaces`].
const OCCUPATIONS: &[&str] = &[
    "accountant",
    "shopkeeper",
    "chef",
    "barista",
    "cook",
    "coach",
    "projectionist",
    "community organizer",
];

const TRAIT_POOL: &[&str] = &[
    "curious", "outgoing", "reserved", "patient", "ambitious", "cheerful", "thoughtful",
    "creative", "practical", "kind", "stubborn", "adventurous",
];

/// Traits drawn for each resident.
const TRAITS_PER_RESIDENT: usize = 3;

// -----------------------------------------------------------------------
// Plan
// -----------------------------------------------------------------------

/// Everything fixed about a resident before the oracle is asked.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidentPlan {
    /// Stable id derived from the city seed and the index.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Occupation.
    pub occupation: String,
    /// Home.
    pub residence: Option<BuildingId>,
    /// Place of work.
    pub workplace: Option<BuildingId>,
    /// Starting traits.
    pub traits: Vec<String>,
}

/// The stable id of resident `index` in a city with `seed`.
pub fn resident_id(seed: u64, index: u64) -> AgentId {
    AgentId::from(Uuid::from_u64_pair(seed, index))
}

fn pick<T: Copy>(items: &[T], index: usize) -> Option<T> {
    index
        .checked_rem(items.len())
        .and_then(|i| items.get(i))
        .copied()
}

/// Plan `count` residents for a starting city.
pub fn plan_residents(seed: u64, count: u32, buildings: &StartingBuildingIds) -> Vec<ResidentPlan> {
    let mut rng = StdRng::seed_from_u64(seed);
    let workplaces = buildings.workplaces();
    let mut plans = Vec::new();

    for index in 0..count {
        let i = usize::try_from(index).unwrap_or(usize::MAX);
        let base = pick(NAME_POOL, i).unwrap_or("Resident");
        let round = i.checked_div(NAME_POOL.len()).unwrap_or(0);
        let name = if round == 0 {
            base.to_owned()
        } else {
            format!("{base} {}", round.saturating_add(1))
        };

        let job = i.checked_rem(workplaces.len()).unwrap_or(0);
        let mut traits: Vec<&str> = TRAIT_POOL.to_vec();
        traits.shuffle(&mut rng);
        traits.truncate(TRAITS_PER_RESIDENT);

        plans.push(ResidentPlan {
            id: resident_id(seed, u64::from(index)),
            name,
            occupation: pick(OCCUPATIONS, job).unwrap_or("resident").to_owned(),
            residence: pick(&buildings.residences, i),
            workplace: workplaces.get(job).copied(),
            traits: traits.into_iter().map(ToOwned::to_owned).collect(),
        });
    }
    plans
}

// -----------------------------------------------------------------------
// Seeding
// -----------------------------------------------------------------------

async fn personality_for<O: DecisionOracle>(
    oracle: &mut O,
    plan: &ResidentPlan,
    timeout_ms: u64,
) -> Personality {
    let seed = PersonalitySeed {
        name: plan.name.clone(),
        occupation: plan.occupation.clone(),
        traits: plan.traits.clone(),
    };
    match with_deadline(timeout_ms, oracle.generate_personality(&seed)).await {
        Ok(personality) => personality,
        Err(e) => {
            warn!(name = %plan.name, error = %e, "Personality generation failed, using fallback");
            fallback_personality(&seed)
        }
    }
}

async fn schedule_for<O: DecisionOracle>(
    oracle: &mut O,
    plan: &ResidentPlan,
    personality: &Personality,
    timeout_ms: u64,
) -> DailySchedule {
    let request = ScheduleRequest {
        name: plan.name.clone(),
        occupation: plan.occupation.clone(),
        personality: personality.clone(),
    };
    match with_deadline(timeout_ms, oracle.generate_daily_schedule(&request)).await {
        Ok(schedule) => schedule,
        Err(e) => {
            warn!(name = %plan.name, error = %e, "Schedule generation failed, using fallback");
            fallback_schedule()
        }
    }
}

/// Create the planned residents and add them to the city.
///
/// # Errors
///
/// Returns [`EngineError::Agent`] if a resident cannot be added.
pub async fn seed_residents<O: DecisionOracle>(
    state: &mut CityState,
    oracle: &mut O,
    plans: &[ResidentPlan],
) -> Result<Vec<AgentId>, EngineError> {
    let timeout_ms = state.oracle_timeout_ms;
    let mut ids = Vec::with_capacity(plans.len());

    for plan in plans {
        let personality = personality_for(oracle, plan, timeout_ms).await;
        let schedule = schedule_for(oracle, plan, &personality, timeout_ms).await;
        let position = plan
            .residence
            .and_then(|home| state.registry.get(home))
            .map_or_else(|| Position::new(0.0, 0.0), |home| home.position);

        let mut agent = Agent::new(
            AgentSpawn {
                name: plan.name.clone(),
                occupation: plan.occupation.clone(),
                position,
                residence: plan.residence,
                workplace: plan.workplace,
                personality,
                schedule,
            },
            state.memory,
        );
        agent.id = plan.id;
        ids.push(state.add_agent(agent)?);
    }

    info!(residents = ids.len(), "Residents seeded");
    Ok(ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use civitas_core::config::SimulationConfig;
    use civitas_core::decision::OfflineOracle;
    use civitas_types::TimeSlot;
    use civitas_world::create_starting_city;

    use super::*;

    #[test]
    fn plans_are_deterministic() {
        let (_, buildings) = create_starting_city().unwrap();
        let first = plan_residents(42, 8, &buildings);
        let second = plan_residents(42, 8, &buildings);
        assert_eq!(first, second);
        assert_eq!(first[0].id, resident_id(42, 0));
        assert_eq!(first[0].traits.len(), TRAITS_PER_RESIDENT);
    }

    #[test]
    fn homes_and_jobs_rotate() {
        let (_, buildings) = create_starting_city().unwrap();
        let plans = plan_residents(7, 10, &buildings);
        let homes = buildings.residences.len();
        assert_eq!(plans[0].residence, plans[homes].residence);
        assert_eq!(plans[0].workplace, Some(buildings.office));
        assert_eq!(plans[0].occupation, "accountant");
        assert_eq!(plans[8].workplace, Some(buildings.office));
    }

    #[test]
    fn names_stay_unique_past_the_pool() {
        let (_, buildings) = create_starting_city().unwrap();
        let count = u32::try_from(NAME_POOL.len() + 2).unwrap();
        let plans = plan_residents(1, count, &buildings);
        let mut names: Vec<&str> = plans.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), plans.len());
        assert_eq!(plans[NAME_POOL.len()].name, "Ada 2");
    }

    #[tokio::test]
    async fn offline_seeding_uses_fallbacks() {
        let (registry, buildings) = create_starting_city().unwrap();
        let mut state = CityState::new(&SimulationConfig::default(), registry).unwrap();
        let plans = plan_residents(42, 3, &buildings);

        let ids = seed_residents(&mut state, &mut OfflineOracle::new(), &plans)
            .await
            .unwrap();
        assert_eq!(ids.len(), 3);

        let agent = state.agent(ids[0]).unwrap();
        assert_eq!(agent.id, resident_id(42, 0));
        assert_eq!(agent.residence, plans[0].residence);
        assert_eq!(agent.personality.traits, plans[0].traits);
        assert!(!agent.schedule.activities(TimeSlot::Morning).is_empty());
    }
}
