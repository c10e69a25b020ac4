//! The building registry: every building in the city, in insertion order.
//!
//! The [`BuildingRegistry`] owns all [`Building`]s and answers the spatial
//! and service queries the tick loop needs. Target selection lives in
//! [`BuildingRegistry::find_suitable`], which filters by kind, opening,
//! room, and range, then ranks the survivors by distance and suitability.

use std::collections::{BTreeMap, BTreeSet};

use civitas_types::{ActionKind, AgentId, BuildingId, BuildingKind, Position, ServiceKind};
use tracing::debug;

use crate::building::Building;
use crate::error::WorldError;
use crate::service;

/// Furthest distance an agent will travel for an action.
pub const SEARCH_RANGE: f64 = 500.0;
/// Weight of the distance score in ranking.
const DISTANCE_WEIGHT: f64 = 0.4;
/// Weight of the suitability score in ranking.
const SUITABILITY_WEIGHT: f64 = 0.6;
/// Suitability bonus for a place the agent recently acted at.
const FAMILIARITY_BONUS: f64 = 10.0;
/// Suitability points for an empty building.
const ROOM_WEIGHT: f64 = 30.0;

/// Whether `hour` counts as night for target selection.
pub const fn is_night(hour: u32) -> bool {
    hour < 6 || hour >= 22
}

/// One agent's presence inside a building, used to compute service load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    /// Building the agent occupies.
    pub building: BuildingId,
    /// Service the agent's current action uses, if any.
    pub service: Option<ServiceKind>,
}

/// A request for a building to perform an action at.
#[derive(Debug, Clone, Copy)]
pub struct TargetQuery<'a> {
    /// What the agent wants to do.
    pub action: ActionKind,
    /// Where the agent is.
    pub from: Position,
    /// Current game hour.
    pub hour: u32,
    /// Restrict to these kinds instead of the day/night table.
    pub kinds: Option<&'a [BuildingKind]>,
    /// Names of places the agent recently acted at.
    pub familiar: &'a BTreeSet<String>,
}

/// Every building in the city.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BuildingRegistry {
    /// Buildings indexed by id.
    buildings: BTreeMap<BuildingId, Building>,
    /// Insertion order.
    order: Vec<BuildingId>,
}

impl BuildingRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            buildings: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Add a building.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateBuilding`] if the id is already taken.
    pub fn insert(&mut self, building: Building) -> Result<BuildingId, WorldError> {
        let id = building.id;
        if self.buildings.contains_key(&id) {
            return Err(WorldError::DuplicateBuilding(id));
        }
        self.buildings.insert(id, building);
        self.order.push(id);
        Ok(id)
    }

    /// Look up a building.
    pub fn get(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// Look up a building mutably.
    pub fn get_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(&id)
    }

    /// Number of buildings.
    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    /// All buildings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Building> {
        self.order.iter().filter_map(|id| self.buildings.get(id))
    }

    /// Name of a building, if it exists.
    pub fn name_of(&self, id: BuildingId) -> Option<&str> {
        self.buildings.get(&id).map(|b| b.name.as_str())
    }

    // -------------------------------------------------------------------
    // Occupancy
    // -------------------------------------------------------------------

    /// Reserve a place in a building for `agent`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::BuildingNotFound`] for an unknown id, or the
    /// error from [`Building::try_enter`].
    pub fn try_enter(&mut self, building: BuildingId, agent: AgentId) -> Result<(), WorldError> {
        self.buildings
            .get_mut(&building)
            .ok_or(WorldError::BuildingNotFound(building))?
            .try_enter(agent)
    }

    /// Release `agent`'s place in a building.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::BuildingNotFound`] for an unknown id, or
    /// [`WorldError::AgentNotInBuilding`] if the agent was not inside.
    pub fn leave(&mut self, building: BuildingId, agent: AgentId) -> Result<(), WorldError> {
        self.buildings
            .get_mut(&building)
            .ok_or(WorldError::BuildingNotFound(building))?
            .leave(agent)
    }

    /// Move `agent` from one building to another.
    ///
    /// The new place is reserved before the old one is released, so a
    /// failed move leaves the agent where it was.
    ///
    /// # Errors
    ///
    /// Returns the error from entering `to`. Leaving `from` cannot fail the
    /// move.
    pub fn relocate(
        &mut self,
        agent: AgentId,
        from: Option<BuildingId>,
        to: BuildingId,
    ) -> Result<(), WorldError> {
        if from == Some(to) {
            return Ok(());
        }
        self.try_enter(to, agent)?;
        if let Some(old) = from {
            if let Err(e) = self.leave(old, agent) {
                debug!(
                    agent = %agent,
                    building = %old,
                    error = %e,
                    "Agent was not registered at previous building"
                );
            }
        }
        Ok(())
    }

    /// Move `agent` into the building recorded in a snapshot.
    ///
    /// Like [`relocate`](Self::relocate), but the destination is entered
    /// with [`Building::restore_occupant`], so it may be closed.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::BuildingNotFound`] for an unknown `to`, or
    /// [`WorldError::BuildingAtCapacity`] if it is full.
    pub fn restore_occupant(
        &mut self,
        agent: AgentId,
        from: Option<BuildingId>,
        to: BuildingId,
    ) -> Result<(), WorldError> {
        if from == Some(to) {
            return Ok(());
        }
        self.buildings
            .get_mut(&to)
            .ok_or(WorldError::BuildingNotFound(to))?
            .restore_occupant(agent)?;
        if let Some(old) = from {
            if let Err(e) = self.leave(old, agent) {
                debug!(
                    agent = %agent,
                    building = %old,
                    error = %e,
                    "Agent was not registered at previous building"
                );
            }
        }
        Ok(())
    }

    /// Recompute open state, condition, and services for every building.
    pub fn refresh(&mut self, hour: u32, presence: &[Presence]) {
        let mut loads: BTreeMap<BuildingId, BTreeMap<ServiceKind, u32>> = BTreeMap::new();
        for p in presence {
            if let Some(service) = p.service {
                let count = loads
                    .entry(p.building)
                    .or_default()
                    .entry(service)
                    .or_insert(0);
                *count = count.saturating_add(1);
            }
        }
        let empty = BTreeMap::new();
        for (id, building) in &mut self.buildings {
            building.refresh(hour, loads.get(id).unwrap_or(&empty));
        }
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Buildings within `radius` of `position`, nearest first.
    pub fn nearby_buildings(&self, position: Position, radius: f64) -> Vec<&Building> {
        let mut found: Vec<(f64, &Building)> = self
            .iter()
            .map(|b| (b.position.distance_to(position), b))
            .filter(|(d, _)| *d <= radius)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.into_iter().map(|(_, b)| b).collect()
    }

    /// Buildings offering a service, in insertion order.
    pub fn buildings_by_service(&self, service: ServiceKind) -> Vec<&Building> {
        self.iter().filter(|b| b.offers(service)).collect()
    }

    /// Buildings of a kind, in insertion order.
    pub fn buildings_of_kind(&self, kind: BuildingKind) -> Vec<&Building> {
        self.iter().filter(|b| b.kind == kind).collect()
    }

    /// Whether `building` can take `agent` right now.
    pub fn accepts(&self, building: BuildingId, agent: AgentId) -> bool {
        self.get(building)
            .is_some_and(|b| b.contains(agent) || (b.is_open() && b.has_capacity()))
    }

    /// Pick the best building for an action.
    ///
    /// Candidates must be of an allowed kind, open, not full, and within
    /// [`SEARCH_RANGE`]. The highest `distance × 0.4 + suitability × 0.6`
    /// wins; ties go to the kind earlier in [`BuildingKind::PRIORITY`].
    pub fn find_suitable(&self, query: &TargetQuery<'_>) -> Option<&Building> {
        let kinds = query
            .kinds
            .unwrap_or_else(|| service::candidate_kinds(query.action, is_night(query.hour)));
        let service = query.action.service();

        let best = self
            .iter()
            .filter(|b| kinds.contains(&b.kind) && b.is_open() && b.has_capacity())
            .filter_map(|b| {
                let distance = b.position.distance_to(query.from);
                (distance <= SEARCH_RANGE).then(|| {
                    let distance_score = 100.0 * (1.0 - distance / SEARCH_RANGE);
                    let score = distance_score.mul_add(
                        DISTANCE_WEIGHT,
                        suitability(b, service, query.familiar) * SUITABILITY_WEIGHT,
                    );
                    (score, b)
                })
            })
            .max_by(|(sa, a), (sb, b)| {
                sa.total_cmp(sb)
                    .then_with(|| b.kind.priority_rank().cmp(&a.kind.priority_rank()))
            })
            .map(|(_, b)| b);

        if best.is_none() {
            debug!(action = %query.action, hour = query.hour, "No suitable building in range");
        }
        best
    }
}

/// Suitability of a building for a service.
fn suitability(building: &Building, service: ServiceKind, familiar: &BTreeSet<String>) -> f64 {
    let room = if building.capacity > 0 {
        1.0 - f64::from(building.occupancy()) / f64::from(building.capacity)
    } else {
        0.0
    };
    let bonus = if familiar.contains(&building.name) {
        FAMILIARITY_BONUS
    } else {
        0.0
    };
    room.mul_add(ROOM_WEIGHT, building.service_quality(service)) + bonus
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_registry(buildings: Vec<Building>, hour: u32) -> BuildingRegistry {
        let mut registry = BuildingRegistry::new();
        for b in buildings {
            registry.insert(b).unwrap();
        }
        registry.refresh(hour, &[]);
        registry
    }

    fn make_building(name: &str, kind: BuildingKind, x: f64, capacity: u32) -> Building {
        Building::new(name, kind, Position::new(x, 0.0), capacity)
    }

    fn query<'a>(action: ActionKind, hour: u32, familiar: &'a BTreeSet<String>) -> TargetQuery<'a> {
        TargetQuery {
            action,
            from: Position::new(0.0, 0.0),
            hour,
            kinds: None,
            familiar,
        }
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut registry = BuildingRegistry::new();
        let b = make_building("Home", BuildingKind::Residential, 0.0, 4);
        let copy = b.clone();
        registry.insert(b).unwrap();
        assert!(matches!(
            registry.insert(copy),
            Err(WorldError::DuplicateBuilding(_))
        ));
    }

    #[test]
    fn iteration_keeps_insertion_order() {
        let registry = make_registry(
            vec![
                make_building("Zeta", BuildingKind::Office, 0.0, 5),
                make_building("Alpha", BuildingKind::Cafe, 0.0, 5),
            ],
            10,
        );
        let names: Vec<&str> = registry.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn prefers_the_closer_of_two_equal_buildings() {
        let registry = make_registry(
            vec![
                make_building("Far Cafe", BuildingKind::Cafe, 300.0, 10),
                make_building("Near Cafe", BuildingKind::Cafe, 50.0, 10),
            ],
            10,
        );
        let familiar = BTreeSet::new();
        let found = registry.find_suitable(&query(ActionKind::Eat, 10, &familiar)).unwrap();
        assert_eq!(found.name, "Near Cafe");
    }

    #[test]
    fn skips_out_of_range_closed_and_full() {
        let mut registry = make_registry(
            vec![
                make_building("Distant", BuildingKind::Cafe, 600.0, 10),
                make_building("Lunch Only", BuildingKind::Restaurant, 10.0, 10),
                make_building("Tiny", BuildingKind::Cafeteria, 20.0, 1),
            ],
            16,
        );
        let tiny = registry.iter().find(|b| b.name == "Tiny").unwrap().id;
        registry.try_enter(tiny, AgentId::new()).unwrap();

        let familiar = BTreeSet::new();
        assert!(registry.find_suitable(&query(ActionKind::Eat, 16, &familiar)).is_none());
    }

    #[test]
    fn eats_at_home_at_night() {
        let registry = make_registry(
            vec![
                make_building("Cafe", BuildingKind::Cafe, 10.0, 10),
                make_building("Home", BuildingKind::Residential, 100.0, 4),
            ],
            23,
        );
        let familiar = BTreeSet::new();
        let found = registry.find_suitable(&query(ActionKind::Eat, 23, &familiar)).unwrap();
        assert_eq!(found.kind, BuildingKind::Residential);
    }

    #[test]
    fn familiarity_can_outweigh_distance() {
        let registry = make_registry(
            vec![
                make_building("New Cafe", BuildingKind::Cafe, 40.0, 10),
                make_building("Usual Cafe", BuildingKind::Cafe, 60.0, 10),
            ],
            10,
        );
        let familiar = BTreeSet::from([String::from("Usual Cafe")]);
        let found = registry.find_suitable(&query(ActionKind::Eat, 10, &familiar)).unwrap();
        assert_eq!(found.name, "Usual Cafe");
    }

    #[test]
    fn ties_go_to_priority_order() {
        let registry = make_registry(
            vec![
                make_building("Park", BuildingKind::Park, 10.0, 10),
                make_building("Plaza", BuildingKind::Plaza, 10.0, 10),
            ],
            12,
        );
        let familiar = BTreeSet::new();
        let kinds = [BuildingKind::Plaza, BuildingKind::Park];
        let q = TargetQuery {
            kinds: Some(&kinds),
            ..query(ActionKind::Relax, 12, &familiar)
        };
        // Both offer relax in identical condition, so the park wins on priority.
        assert_eq!(registry.find_suitable(&q).unwrap().name, "Park");
    }

    #[test]
    fn relocate_reserves_before_release() {
        let mut registry = make_registry(
            vec![
                make_building("Home", BuildingKind::Residential, 0.0, 2),
                make_building("Full", BuildingKind::Cafe, 10.0, 1),
            ],
            10,
        );
        let home = registry.iter().find(|b| b.name == "Home").unwrap().id;
        let full = registry.iter().find(|b| b.name == "Full").unwrap().id;
        let agent = AgentId::new();
        registry.try_enter(home, agent).unwrap();
        registry.try_enter(full, AgentId::new()).unwrap();

        assert!(registry.relocate(agent, Some(home), full).is_err());
        assert!(registry.get(home).unwrap().contains(agent));
    }

    #[test]
    fn relocate_moves_the_agent() {
        let mut registry = make_registry(
            vec![
                make_building("Home", BuildingKind::Residential, 0.0, 2),
                make_building("Cafe", BuildingKind::Cafe, 10.0, 2),
            ],
            10,
        );
        let home = registry.iter().find(|b| b.name == "Home").unwrap().id;
        let cafe = registry.iter().find(|b| b.name == "Cafe").unwrap().id;
        let agent = AgentId::new();
        registry.try_enter(home, agent).unwrap();
        registry.relocate(agent, Some(home), cafe).unwrap();
        assert!(!registry.get(home).unwrap().contains(agent));
        assert!(registry.get(cafe).unwrap().contains(agent));
    }

    #[test]
    fn restore_enters_a_closed_building() {
        let mut registry = make_registry(
            vec![
                make_building("Home", BuildingKind::Residential, 0.0, 2),
                make_building("Tower", BuildingKind::Office, 10.0, 2),
            ],
            3,
        );
        let home = registry.iter().find(|b| b.name == "Home").unwrap().id;
        let tower = registry.iter().find(|b| b.name == "Tower").unwrap().id;
        let agent = AgentId::new();
        registry.try_enter(home, agent).unwrap();
        assert!(!registry.get(tower).unwrap().is_open());
        assert!(registry.relocate(agent, Some(home), tower).is_err());

        registry.restore_occupant(agent, Some(home), tower).unwrap();
        assert!(!registry.get(home).unwrap().contains(agent));
        assert!(registry.get(tower).unwrap().contains(agent));
    }

    #[test]
    fn refresh_counts_service_load() {
        let mut registry = make_registry(
            vec![make_building("Cafe", BuildingKind::Cafe, 0.0, 10)],
            10,
        );
        let cafe = registry.iter().next().unwrap().id;
        let presence = [
            Presence { building: cafe, service: Some(ServiceKind::Food) },
            Presence { building: cafe, service: Some(ServiceKind::Food) },
            Presence { building: cafe, service: None },
        ];
        registry.refresh(10, &presence);
        let food = registry.get(cafe).unwrap().service(ServiceKind::Food).unwrap();
        assert_eq!(food.load, 2);
    }

    #[test]
    fn nearby_is_sorted_by_distance() {
        let registry = make_registry(
            vec![
                make_building("B", BuildingKind::Office, 80.0, 5),
                make_building("A", BuildingKind::Office, 20.0, 5),
                make_building("C", BuildingKind::Office, 200.0, 5),
            ],
            10,
        );
        let names: Vec<&str> = registry
            .nearby_buildings(Position::new(0.0, 0.0), 100.0)
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn by_service_lists_offering_buildings() {
        let registry = make_registry(
            vec![
                make_building("Office", BuildingKind::Office, 0.0, 5),
                make_building("Plaza", BuildingKind::Plaza, 0.0, 50),
                make_building("Cafe", BuildingKind::Cafe, 0.0, 10),
            ],
            10,
        );
        let names: Vec<&str> = registry
            .buildings_by_service(ServiceKind::Socialize)
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(names, vec!["Plaza", "Cafe"]);
    }
}
