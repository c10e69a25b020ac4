//! Error types for the `civitas-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`].

use civitas_types::{AgentId, BuildingId};

/// Errors that can occur during building and registry operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A building was not found in the registry.
    #[error("building not found: {0}")]
    BuildingNotFound(BuildingId),

    /// The building has reached its maximum occupancy.
    #[error("building {building} is at capacity ({capacity})")]
    BuildingAtCapacity {
        /// The full building.
        building: BuildingId,
        /// Maximum capacity.
        capacity: u32,
    },

    /// The building is closed at this hour.
    #[error("building {building} is closed")]
    BuildingClosed {
        /// The closed building.
        building: BuildingId,
    },

    /// The agent is not inside the specified building.
    #[error("agent {agent} is not in building {building}")]
    AgentNotInBuilding {
        /// The agent.
        agent: AgentId,
        /// The building.
        building: BuildingId,
    },

    /// A building with the same id is already registered.
    #[error("duplicate building id: {0}")]
    DuplicateBuilding(BuildingId),

    /// An opening window has hours outside `0..=24`.
    #[error("invalid opening window {open}-{close}")]
    InvalidWindow {
        /// Opening hour.
        open: u32,
        /// Closing hour.
        close: u32,
    },
}
