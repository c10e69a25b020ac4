//! Default starting city.
//!
//! A compact district of 15 buildings laid out around a central plaza,
//! all within walking range of each other: four homes, places to work,
//! places to eat, and places to unwind.

use civitas_types::{BuildingId, BuildingKind, Position};

use crate::building::Building;
use crate::error::WorldError;
use crate::registry::BuildingRegistry;

/// Identifiers for the starting buildings, so callers can place residents.
#[derive(Debug, Clone)]
pub struct StartingBuildingIds {
    /// Homes, in the order residents should be assigned to them.
    pub residences: Vec<BuildingId>,
    /// Harbor Office Tower.
    pub office: BuildingId,
    /// Market Street Shops.
    pub shops: BuildingId,
    /// Golden Spoon restaurant.
    pub restaurant: BuildingId,
    /// Corner Cafe.
    pub cafe: BuildingId,
    /// Civic Canteen.
    pub canteen: BuildingId,
    /// Central Park.
    pub park: BuildingId,
    /// Town Plaza.
    pub plaza: BuildingId,
    /// Riverside Sports Hall.
    pub sports_hall: BuildingId,
    /// Starlight Cinema.
    pub cinema: BuildingId,
    /// Community Center.
    pub community_center: BuildingId,
}

impl StartingBuildingIds {
    /// Buildings residents can be employed at.
    pub fn workplaces(&self) -> Vec<BuildingId> {
        vec![
            self.office,
            self.shops,
            self.restaurant,
            self.cafe,
            self.canteen,
            self.sports_hall,
            self.cinema,
            self.community_center,
        ]
    }
}

fn add(
    registry: &mut BuildingRegistry,
    name: &str,
    kind: BuildingKind,
    x: f64,
    z: f64,
    capacity: u32,
) -> Result<BuildingId, WorldError> {
    registry.insert(Building::new(name, kind, Position::new(x, z), capacity))
}

/// Build the default city.
///
/// Buildings start closed; call [`BuildingRegistry::refresh`] with the
/// current hour before the first tick.
///
/// # Errors
///
/// Returns [`WorldError::DuplicateBuilding`] if id generation collides.
pub fn create_starting_city() -> Result<(BuildingRegistry, StartingBuildingIds), WorldError> {
    let mut registry = BuildingRegistry::new();

    let residences = vec![
        add(&mut registry, "Maple Residences", BuildingKind::Residential, -180.0, -120.0, 6)?,
        add(&mut registry, "Oak Apartments", BuildingKind::Residential, -180.0, 120.0, 8)?,
        add(&mut registry, "Birch Cottages", BuildingKind::Residential, 180.0, -120.0, 6)?,
        add(&mut registry, "Elm Lofts", BuildingKind::Residential, 180.0, 120.0, 8)?,
    ];

    let plaza = add(&mut registry, "Town Plaza", BuildingKind::Plaza, 0.0, 0.0, 80)?;
    let office = add(&mut registry, "Harbor Office Tower", BuildingKind::Office, 0.0, -200.0, 30)?;
    let shops = add(&mut registry, "Market Street Shops", BuildingKind::Commercial, 90.0, -60.0, 25)?;
    let restaurant = add(&mut registry, "Golden Spoon", BuildingKind::Restaurant, -90.0, -60.0, 20)?;
    let cafe = add(&mut registry, "Corner Cafe", BuildingKind::Cafe, 60.0, 60.0, 12)?;
    let canteen = add(&mut registry, "Civic Canteen", BuildingKind::Cafeteria, 40.0, -160.0, 30)?;
    let park = add(&mut registry, "Central Park", BuildingKind::Park, -80.0, 160.0, 60)?;
    let sports_hall = add(
        &mut registry,
        "Riverside Sports Hall",
        BuildingKind::Recreation,
        -220.0,
        0.0,
        30,
    )?;
    let cinema = add(&mut registry, "Starlight Cinema", BuildingKind::Entertainment, 220.0, 0.0, 40)?;
    let community_center = add(
        &mut registry,
        "Community Center",
        BuildingKind::CommunityCenter,
        80.0,
        170.0,
        40,
    )?;

    let ids = StartingBuildingIds {
        residences,
        office,
        shops,
        restaurant,
        cafe,
        canteen,
        park,
        plaza,
        sports_hall,
        cinema,
        community_center,
    };
    Ok((registry, ids))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use civitas_types::ActionKind;

    use super::*;

    #[test]
    fn has_every_kind() {
        let (registry, _) = create_starting_city().unwrap();
        assert_eq!(registry.len(), 15);
        for kind in BuildingKind::PRIORITY {
            assert!(
                !registry.buildings_of_kind(kind).is_empty(),
                "no {kind} in the starting city"
            );
        }
    }

    #[test]
    fn everything_is_within_walking_range() {
        let (registry, _) = create_starting_city().unwrap();
        for a in registry.iter() {
            for b in registry.iter() {
                assert!(
                    a.position.distance_to(b.position) <= crate::registry::SEARCH_RANGE,
                    "{} is too far from {}",
                    a.name,
                    b.name
                );
            }
        }
    }

    #[test]
    fn every_action_has_a_target_at_noon() {
        let (mut registry, ids) = create_starting_city().unwrap();
        registry.refresh(12, &[]);
        let home = registry
            .get(ids.residences.first().copied().unwrap())
            .unwrap()
            .position;
        let familiar = std::collections::BTreeSet::new();
        for action in ActionKind::ALL {
            let query = crate::registry::TargetQuery {
                action,
                from: home,
                hour: 12,
                kinds: None,
                familiar: &familiar,
            };
            assert!(
                registry.find_suitable(&query).is_some(),
                "nowhere to {action}"
            );
        }
    }
}
