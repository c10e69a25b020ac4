//! Building services: which kinds offer what, capacity, and quality.

use civitas_types::{ActionKind, BuildingKind, ServiceKind};
use serde::{Deserialize, Serialize};

/// Load ratio above which service quality starts to degrade.
const CROWDING_THRESHOLD: f64 = 0.8;

/// Live status of one service inside a building.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Whether the service can be used right now.
    pub available: bool,
    /// Quality score (0-100).
    pub quality: f64,
    /// How many agents the service can take at once.
    pub capacity: u32,
    /// Agents currently using the service.
    pub load: u32,
}

impl ServiceStatus {
    /// Status before the first refresh.
    pub const fn initial(capacity: u32) -> Self {
        Self {
            available: false,
            quality: 100.0,
            capacity,
            load: 0,
        }
    }
}

/// Services offered by a building kind.
pub const fn services_for(kind: BuildingKind) -> &'static [ServiceKind] {
    match kind {
        BuildingKind::Residential => &[ServiceKind::Rest, ServiceKind::Shelter],
        BuildingKind::Park => &[
            ServiceKind::Recreation,
            ServiceKind::Socialize,
            ServiceKind::Exercise,
            ServiceKind::Relax,
        ],
        BuildingKind::Plaza | BuildingKind::CommunityCenter => {
            &[ServiceKind::Socialize, ServiceKind::Relax]
        }
        BuildingKind::Recreation => &[
            ServiceKind::Entertainment,
            ServiceKind::Socialize,
            ServiceKind::Relax,
        ],
        BuildingKind::Restaurant => &[ServiceKind::Food, ServiceKind::Socialize],
        BuildingKind::Cafe => &[ServiceKind::Food, ServiceKind::Socialize, ServiceKind::Work],
        BuildingKind::Cafeteria => &[ServiceKind::Food],
        BuildingKind::Office => &[ServiceKind::Work],
        BuildingKind::Commercial => &[ServiceKind::Work, ServiceKind::Socialize],
        BuildingKind::Entertainment => &[ServiceKind::Entertainment, ServiceKind::Socialize],
    }
}

/// Share of building capacity a service can use.
pub const fn capacity_ratio(service: ServiceKind) -> f64 {
    match service {
        ServiceKind::Rest => 1.0,
        ServiceKind::Food => 0.8,
        ServiceKind::Socialize | ServiceKind::Entertainment => 0.6,
        ServiceKind::Work => 0.7,
        ServiceKind::Shelter
        | ServiceKind::Exercise
        | ServiceKind::Recreation
        | ServiceKind::Relax => 0.5,
    }
}

/// Per-service quality multiplier.
const fn quality_multiplier(service: ServiceKind) -> f64 {
    match service {
        ServiceKind::Socialize => 1.2,
        ServiceKind::Rest => 0.9,
        _ => 1.0,
    }
}

/// Service capacity for a building of the given size.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn service_capacity(building_capacity: u32, service: ServiceKind) -> u32 {
    let raw = (f64::from(building_capacity) * capacity_ratio(service)).floor();
    raw.clamp(0.0, f64::from(u32::MAX)) as u32
}

/// Quality of a service given building condition and current load.
///
/// A zero-capacity service counts as fully loaded.
pub fn service_quality(condition: f64, load: u32, capacity: u32, service: ServiceKind) -> f64 {
    let mut quality = condition;
    let ratio = if capacity > 0 {
        f64::from(load) / f64::from(capacity)
    } else {
        1.0
    };
    if ratio > CROWDING_THRESHOLD {
        quality *= 1.0 - (ratio - CROWDING_THRESHOLD);
    }
    quality *= quality_multiplier(service);
    quality.clamp(0.0, 100.0)
}

/// Building kinds considered for an action, by day or by night.
pub const fn candidate_kinds(action: ActionKind, night: bool) -> &'static [BuildingKind] {
    match (action, night) {
        (ActionKind::Rest, _) | (ActionKind::Eat, true) => &[BuildingKind::Residential],
        (ActionKind::Eat, false) => &[
            BuildingKind::Restaurant,
            BuildingKind::Cafeteria,
            BuildingKind::Cafe,
        ],
        (ActionKind::Socialize, false) => &[
            BuildingKind::Commercial,
            BuildingKind::Recreation,
            BuildingKind::Park,
            BuildingKind::Restaurant,
            BuildingKind::Cafe,
            BuildingKind::Plaza,
            BuildingKind::CommunityCenter,
        ],
        (ActionKind::Socialize | ActionKind::Relax, true) => {
            &[BuildingKind::Residential, BuildingKind::Recreation]
        }
        (ActionKind::Work, _) => &[BuildingKind::Office, BuildingKind::Commercial],
        (ActionKind::Relax, false) => &[
            BuildingKind::Park,
            BuildingKind::Recreation,
            BuildingKind::Entertainment,
        ],
        (ActionKind::Entertainment, _) => {
            &[BuildingKind::Entertainment, BuildingKind::Recreation]
        }
    }
}
