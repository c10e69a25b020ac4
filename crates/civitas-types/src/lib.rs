//! Shared type definitions for the Civitas city simulation.
//!
//! This crate is the single source of truth for the types that cross crate
//! boundaries. Render-facing types flow downstream to `TypeScript` via
//! `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for agents and buildings
//! - [`enums`] -- Actions, building kinds, services, weather, time slots, moods
//! - [`structs`] -- Positions, personalities, daily schedules
//! - [`decision`] -- Oracle contexts, untrusted payloads, validated decisions
//! - [`view`] -- Read-only render views

pub mod decision;
pub mod enums;
pub mod ids;
pub mod structs;
pub mod view;

// Re-export all public types at crate root for convenience.
pub use decision::{
    Conversation, ConversationContext, ConversationPayload, Decision, DecisionContext,
    DecisionOrigin, DecisionPayload, NeedSummary, Participant, PersonalitySeed, ScheduleRequest,
};
pub use enums::{ActionKind, ActionMode, BuildingKind, MemoryKind, Mood, ServiceKind, TimeSlot, Weather};
pub use ids::{AgentId, BuildingId};
pub use structs::{DailySchedule, Personality, Position};
pub use view::{ActivityLine, AgentView, BuildingView, CityView, StateBars};

#[cfg(test)]
mod tests {
    //! Binding generation for the render layer.

    #[test]
    fn export_bindings() {
        // ts-rs writes TypeScript bindings for every #[ts(export)] type
        // into `bindings/` relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::AgentId::export_all();
        let _ = crate::ids::BuildingId::export_all();

        // Enums
        let _ = crate::enums::ActionKind::export_all();
        let _ = crate::enums::ActionMode::export_all();
        let _ = crate::enums::BuildingKind::export_all();
        let _ = crate::enums::ServiceKind::export_all();
        let _ = crate::enums::Weather::export_all();
        let _ = crate::enums::TimeSlot::export_all();
        let _ = crate::enums::Mood::export_all();
        let _ = crate::enums::MemoryKind::export_all();

        // Structs
        let _ = crate::structs::Position::export_all();
        let _ = crate::structs::Personality::export_all();
        let _ = crate::structs::DailySchedule::export_all();
        let _ = crate::decision::Decision::export_all();
        let _ = crate::decision::DecisionOrigin::export_all();
        let _ = crate::decision::Conversation::export_all();

        // Views
        let _ = crate::view::StateBars::export_all();
        let _ = crate::view::ActivityLine::export_all();
        let _ = crate::view::AgentView::export_all();
        let _ = crate::view::BuildingView::export_all();
        let _ = crate::view::CityView::export_all();
    }
}
