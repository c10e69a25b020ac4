//! Buildings with occupancy tracking and per-hour service state.
//!
//! A [`Building`] pairs its fixed identity (name, kind, position, capacity,
//! hours) with volatile state that is recomputed every tick: whether it is
//! open, its condition, and the status of each service it offers.
//! Occupancy is authoritative and only changes through
//! [`Building::try_enter`] and [`Building::leave`].

use std::collections::{BTreeMap, BTreeSet};

use civitas_types::{AgentId, BuildingId, BuildingKind, BuildingView, Position, ServiceKind};
use serde::{Deserialize, Serialize};

use crate::error::WorldError;
use crate::schedule::OpeningHours;
use crate::service::{self, ServiceStatus};

/// Condition lost per hour the building has been open today.
const WEAR_PER_HOUR: f64 = 0.1;
/// Condition lost per agent currently inside.
const WEAR_PER_VISITOR: f64 = 0.01;

/// A building in the city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    /// Unique id.
    pub id: BuildingId,
    /// Display name.
    pub name: String,
    /// Kind of building.
    pub kind: BuildingKind,
    /// Where it stands.
    pub position: Position,
    /// Maximum agents inside at once.
    pub capacity: u32,
    /// Opening schedule.
    pub hours: OpeningHours,
    occupants: BTreeSet<AgentId>,
    open: bool,
    condition: f64,
    services: BTreeMap<ServiceKind, ServiceStatus>,
}

impl Building {
    /// Create a building with the default hours and services for its kind.
    ///
    /// The building starts empty, in full condition, and closed until the
    /// first [`Building::refresh`].
    pub fn new(
        name: impl Into<String>,
        kind: BuildingKind,
        position: Position,
        capacity: u32,
    ) -> Self {
        let services = service::services_for(kind)
            .iter()
            .map(|s| (*s, ServiceStatus::initial(service::service_capacity(capacity, *s))))
            .collect();
        Self {
            id: BuildingId::new(),
            name: name.into(),
            kind,
            position,
            capacity,
            hours: OpeningHours::for_kind(kind),
            occupants: BTreeSet::new(),
            open: false,
            condition: 100.0,
            services,
        }
    }

    /// Replace the opening schedule.
    #[must_use]
    pub fn with_hours(mut self, hours: OpeningHours) -> Self {
        self.hours = hours;
        self
    }

    /// Whether the building was open at the last refresh.
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Physical condition (0-100) at the last refresh.
    pub const fn condition(&self) -> f64 {
        self.condition
    }

    /// Number of agents inside.
    pub fn occupancy(&self) -> u32 {
        u32::try_from(self.occupants.len()).unwrap_or(u32::MAX)
    }

    /// Agents inside.
    pub const fn occupants(&self) -> &BTreeSet<AgentId> {
        &self.occupants
    }

    /// Whether another agent fits.
    pub fn has_capacity(&self) -> bool {
        self.occupancy() < self.capacity
    }

    /// Check whether a specific agent is inside.
    pub fn contains(&self, agent: AgentId) -> bool {
        self.occupants.contains(&agent)
    }

    /// Status of every service this building offers.
    pub const fn services(&self) -> &BTreeMap<ServiceKind, ServiceStatus> {
        &self.services
    }

    /// Status of one service, if offered.
    pub fn service(&self, kind: ServiceKind) -> Option<&ServiceStatus> {
        self.services.get(&kind)
    }

    /// Whether this building offers a service at all.
    pub fn offers(&self, kind: ServiceKind) -> bool {
        self.services.contains_key(&kind)
    }

    /// Quality of a service, or 0 when it is not offered.
    pub fn service_quality(&self, kind: ServiceKind) -> f64 {
        self.service(kind).map_or(0.0, |s| s.quality)
    }

    /// Reserve a place for `agent`.
    ///
    /// Capacity and opening are checked and the occupant is added in the
    /// same call. Entering a building the agent is already inside is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::BuildingClosed`] if the building is closed, or
    /// [`WorldError::BuildingAtCapacity`] if it is full.
    pub fn try_enter(&mut self, agent: AgentId) -> Result<(), WorldError> {
        if self.occupants.contains(&agent) {
            return Ok(());
        }
        if !self.open {
            return Err(WorldError::BuildingClosed { building: self.id });
        }
        if !self.has_capacity() {
            return Err(WorldError::BuildingAtCapacity {
                building: self.id,
                capacity: self.capacity,
            });
        }
        self.occupants.insert(agent);
        Ok(())
    }

    /// Release the agent's place.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotInBuilding`] if the agent is not inside.
    pub fn leave(&mut self, agent: AgentId) -> Result<(), WorldError> {
        if !self.occupants.remove(&agent) {
            return Err(WorldError::AgentNotInBuilding {
                agent,
                building: self.id,
            });
        }
        Ok(())
    }

    /// Put an agent back inside when restoring a snapshot.
    ///
    /// Opening hours are ignored since the agent was already inside when
    /// the snapshot was taken. Capacity still applies.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::BuildingAtCapacity`] if the building is full.
    pub fn restore_occupant(&mut self, agent: AgentId) -> Result<(), WorldError> {
        if self.occupants.contains(&agent) {
            return Ok(());
        }
        if !self.has_capacity() {
            return Err(WorldError::BuildingAtCapacity {
                building: self.id,
                capacity: self.capacity,
            });
        }
        self.occupants.insert(agent);
        Ok(())
    }

    /// Recompute open state, condition, and service status for `hour`.
    ///
    /// `loads` holds, per service, the number of agents inside whose
    /// current action uses it.
    pub fn refresh(&mut self, hour: u32, loads: &BTreeMap<ServiceKind, u32>) {
        self.open = self.hours.is_open(hour);
        let hours_open = f64::from(self.hours.hours_open(hour));
        let visitors = f64::from(self.occupancy());
        self.condition = (100.0 - hours_open * WEAR_PER_HOUR - visitors * WEAR_PER_VISITOR)
            .clamp(0.0, 100.0);

        let condition = self.condition;
        let open = self.open;
        for (kind, status) in &mut self.services {
            let load = loads.get(kind).copied().unwrap_or(0);
            status.available = open;
            status.load = load;
            status.quality = service::service_quality(condition, load, status.capacity, *kind);
        }
    }

    /// Render view of this building.
    pub fn view(&self) -> BuildingView {
        BuildingView {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            position: self.position,
            open: self.open,
            occupancy: self.occupancy(),
            capacity: self.capacity,
            condition: self.condition,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_cafe(capacity: u32) -> Building {
        let mut b = Building::new(
            "Corner Cafe",
            BuildingKind::Cafe,
            Position::new(0.0, 0.0),
            capacity,
        );
        b.refresh(10, &BTreeMap::new());
        b
    }

    #[test]
    fn enter_and_leave() {
        let mut cafe = make_cafe(3);
        let agent = AgentId::new();
        cafe.try_enter(agent).unwrap();
        assert!(cafe.contains(agent));
        assert_eq!(cafe.occupancy(), 1);
        cafe.leave(agent).unwrap();
        assert_eq!(cafe.occupancy(), 0);
    }

    #[test]
    fn enter_rejects_when_full() {
        let mut cafe = make_cafe(1);
        cafe.try_enter(AgentId::new()).unwrap();
        let result = cafe.try_enter(AgentId::new());
        assert!(matches!(
            result,
            Err(WorldError::BuildingAtCapacity { capacity: 1, .. })
        ));
        assert_eq!(cafe.occupancy(), 1);
    }

    #[test]
    fn only_one_of_many_gets_the_last_place() {
        let mut cafe = make_cafe(1);
        let admitted = (0..8)
            .map(|_| cafe.try_enter(AgentId::new()))
            .filter(Result::is_ok)
            .count();
        assert_eq!(admitted, 1);
        assert!(cafe.occupancy() <= cafe.capacity);
    }

    #[test]
    fn reentering_is_idempotent() {
        let mut cafe = make_cafe(1);
        let agent = AgentId::new();
        cafe.try_enter(agent).unwrap();
        cafe.try_enter(agent).unwrap();
        assert_eq!(cafe.occupancy(), 1);
    }

    #[test]
    fn closed_building_rejects_entry() {
        let mut office =
            Building::new("Tower", BuildingKind::Office, Position::new(0.0, 0.0), 10);
        office.refresh(3, &BTreeMap::new());
        assert!(!office.is_open());
        assert!(matches!(
            office.try_enter(AgentId::new()),
            Err(WorldError::BuildingClosed { .. })
        ));
    }

    #[test]
    fn restore_ignores_hours_but_not_capacity() {
        let mut office =
            Building::new("Tower", BuildingKind::Office, Position::new(0.0, 0.0), 1);
        office.refresh(3, &BTreeMap::new());
        let agent = AgentId::new();
        office.restore_occupant(agent).unwrap();
        assert!(office.contains(agent));
        assert!(matches!(
            office.restore_occupant(AgentId::new()),
            Err(WorldError::BuildingAtCapacity { capacity: 1, .. })
        ));
        assert_eq!(office.occupancy(), 1);
    }

    #[test]
    fn leave_without_entering_errors() {
        let mut cafe = make_cafe(2);
        assert!(matches!(
            cafe.leave(AgentId::new()),
            Err(WorldError::AgentNotInBuilding { .. })
        ));
    }

    #[test]
    fn refresh_sets_condition_and_services() {
        let mut cafe = make_cafe(10);
        cafe.try_enter(AgentId::new()).unwrap();
        let loads = BTreeMap::from([(ServiceKind::Food, 1)]);
        // Open since 7, so 3 hours of wear plus one visitor.
        cafe.refresh(10, &loads);
        assert!((cafe.condition() - (100.0 - 0.3 - 0.01)).abs() < 1e-9);
        let food = cafe.service(ServiceKind::Food).unwrap();
        assert!(food.available);
        assert_eq!(food.load, 1);
        assert_eq!(food.capacity, 8);
    }

    #[test]
    fn services_unavailable_when_closed() {
        let mut cafe = make_cafe(10);
        cafe.refresh(2, &BTreeMap::new());
        assert!(cafe.services().values().all(|s| !s.available));
        assert!((cafe.condition() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn view_reflects_state() {
        let mut cafe = make_cafe(4);
        cafe.try_enter(AgentId::new()).unwrap();
        let view = cafe.view();
        assert_eq!(view.occupancy, 1);
        assert_eq!(view.capacity, 4);
        assert!(view.open);
        assert_eq!(view.kind, BuildingKind::Cafe);
    }
}
