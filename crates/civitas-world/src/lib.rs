//! Buildings, opening hours, services, and weather for the Civitas city.
//!
//! This crate models the physical city: buildings with opening windows and
//! occupancy, the services they offer and how well, the registry that picks
//! targets for agents, and the weather.
//!
//! # Modules
//!
//! - [`building`] -- [`Building`] with check-then-reserve entry and
//!   per-hour condition and service state.
//! - [`environment`] -- Weather changes driven by deterministic randomness.
//! - [`error`] -- Error types for building and registry operations.
//! - [`registry`] -- [`BuildingRegistry`]: insertion-ordered buildings,
//!   spatial and service queries, and target ranking.
//! - [`schedule`] -- Opening windows, including ones that wrap midnight.
//! - [`service`] -- Services per building kind, capacity, and quality.
//! - [`starting_city`] -- Default 15-building district.

pub mod building;
pub mod environment;
pub mod error;
pub mod registry;
pub mod schedule;
pub mod service;
pub mod starting_city;

// Re-export primary types at crate root.
pub use building::Building;
pub use environment::WeatherSystem;
pub use error::WorldError;
pub use registry::{BuildingRegistry, Presence, SEARCH_RANGE, TargetQuery, is_night};
pub use schedule::{HourWindow, OpeningHours};
pub use service::{ServiceStatus, candidate_kinds, services_for};
pub use starting_city::{StartingBuildingIds, create_starting_city};
