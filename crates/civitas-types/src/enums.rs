//! Enumeration types for the Civitas simulation.
//!
//! Closed sets only: every action an agent can take, every kind of
//! building, every service a building can offer, and the small
//! environmental vocabularies (weather, time slots, conversation moods).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// A timed action an agent performs inside a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionKind {
    /// Work at an office or commercial building.
    Work,
    /// Sleep or rest at home.
    Rest,
    /// Eat a meal.
    Eat,
    /// Spend time with another resident.
    Socialize,
    /// Leisure that costs a little energy and lifts mood.
    Entertainment,
    /// Quiet downtime that lowers stress.
    Relax,
}

impl ActionKind {
    /// Every action kind, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Work,
        Self::Rest,
        Self::Eat,
        Self::Socialize,
        Self::Entertainment,
        Self::Relax,
    ];

    /// Lowercase label used in prompts, logs, and the render view.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Rest => "rest",
            Self::Eat => "eat",
            Self::Socialize => "socialize",
            Self::Entertainment => "entertainment",
            Self::Relax => "relax",
        }
    }

    /// Parse a label leniently (case-insensitive, a few common synonyms).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "work" | "working" => Some(Self::Work),
            "rest" | "sleep" | "resting" => Some(Self::Rest),
            "eat" | "eating" | "meal" => Some(Self::Eat),
            "socialize" | "socialise" | "social" | "chat" => Some(Self::Socialize),
            "entertainment" | "entertain" | "play" => Some(Self::Entertainment),
            "relax" | "relaxing" | "leisure" => Some(Self::Relax),
            _ => None,
        }
    }

    /// The building service this action consumes.
    pub const fn service(self) -> ServiceKind {
        match self {
            Self::Work => ServiceKind::Work,
            Self::Rest => ServiceKind::Rest,
            Self::Eat => ServiceKind::Food,
            Self::Socialize => ServiceKind::Socialize,
            Self::Entertainment => ServiceKind::Entertainment,
            Self::Relax => ServiceKind::Relax,
        }
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse behavior mode of an agent, as exposed to the render layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionMode {
    /// Waiting for the next decision.
    Idle,
    /// Walking towards a building.
    Moving,
    /// Performing a timed action.
    Acting,
}

// ---------------------------------------------------------------------------
// Buildings and services
// ---------------------------------------------------------------------------

/// The kind of a building, which determines its schedule and services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum BuildingKind {
    /// Homes.
    Residential,
    /// Shops and malls.
    Commercial,
    /// Office blocks.
    Office,
    /// Restaurants with lunch and dinner service.
    Restaurant,
    /// Cafes.
    Cafe,
    /// Canteens and cafeterias.
    Cafeteria,
    /// Parks and green space.
    Park,
    /// Open plazas.
    Plaza,
    /// Gyms, sports grounds, recreation halls.
    Recreation,
    /// Cinemas, theatres, arcades.
    Entertainment,
    /// Community centers.
    CommunityCenter,
}

impl BuildingKind {
    /// Declared priority order, used to break ranking ties.
    pub const PRIORITY: [Self; 11] = [
        Self::Residential,
        Self::Restaurant,
        Self::Cafe,
        Self::Cafeteria,
        Self::Park,
        Self::Plaza,
        Self::CommunityCenter,
        Self::Recreation,
        Self::Entertainment,
        Self::Office,
        Self::Commercial,
    ];

    /// Lowercase label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Commercial => "commercial",
            Self::Office => "office",
            Self::Restaurant => "restaurant",
            Self::Cafe => "cafe",
            Self::Cafeteria => "cafeteria",
            Self::Park => "park",
            Self::Plaza => "plaza",
            Self::Recreation => "recreation",
            Self::Entertainment => "entertainment",
            Self::CommunityCenter => "community_center",
        }
    }

    /// Position of this kind in [`BuildingKind::PRIORITY`] (lower wins).
    pub fn priority_rank(self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|k| *k == self)
            .unwrap_or(Self::PRIORITY.len())
    }

    /// Whether this kind counts as a public space for urgent socializing.
    pub const fn is_public_space(self) -> bool {
        matches!(self, Self::Plaza | Self::Park | Self::CommunityCenter)
    }
}

impl core::fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A service a building can provide to visiting agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ServiceKind {
    /// Beds and quiet.
    Rest,
    /// Shelter from the weather.
    Shelter,
    /// Meals.
    Food,
    /// Space to meet people.
    Socialize,
    /// Desks and jobs.
    Work,
    /// Sports and exercise.
    Exercise,
    /// Shows and games.
    Entertainment,
    /// General recreation.
    Recreation,
    /// Calm spaces.
    Relax,
}

impl ServiceKind {
    /// Lowercase label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Shelter => "shelter",
            Self::Food => "food",
            Self::Socialize => "socialize",
            Self::Work => "work",
            Self::Exercise => "exercise",
            Self::Entertainment => "entertainment",
            Self::Recreation => "recreation",
            Self::Relax => "relax",
        }
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// City-wide weather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Weather {
    /// Clear skies.
    #[default]
    Sunny,
    /// Overcast.
    Cloudy,
    /// Rain.
    Rainy,
    /// Storms.
    Stormy,
}

impl Weather {
    /// Every weather variant.
    pub const ALL: [Self; 4] = [Self::Sunny, Self::Cloudy, Self::Rainy, Self::Stormy];

    /// Lowercase label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sunny => "sunny",
            Self::Cloudy => "cloudy",
            Self::Rainy => "rainy",
            Self::Stormy => "stormy",
        }
    }
}

/// Part of the game day, used for schedules and prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TimeSlot {
    /// 06:00 to 12:00.
    Morning,
    /// 12:00 to 18:00.
    Afternoon,
    /// 18:00 to 22:00.
    Evening,
    /// 22:00 to 06:00.
    Night,
}

impl TimeSlot {
    /// Every slot, in day order.
    pub const ALL: [Self; 4] = [Self::Morning, Self::Afternoon, Self::Evening, Self::Night];

    /// Map a game hour (0-23) to its slot.
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            18..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// Lowercase label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

/// Emotional tone of a conversation between two residents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Mood {
    /// Warm and pleasant.
    Friendly,
    /// Uneventful.
    #[default]
    Neutral,
    /// Uncomfortable.
    Awkward,
    /// Hostile or upsetting.
    Negative,
}

impl Mood {
    /// Parse a mood label leniently. Unknown labels map to `Neutral`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "friendly" | "positive" | "warm" | "happy" => Self::Friendly,
            "awkward" | "uncomfortable" => Self::Awkward,
            "negative" | "hostile" | "angry" => Self::Negative,
            _ => Self::Neutral,
        }
    }

    /// Lowercase label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::Neutral => "neutral",
            Self::Awkward => "awkward",
            Self::Negative => "negative",
        }
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Category of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MemoryKind {
    /// An action was performed (or failed).
    Action,
    /// A decision was made.
    Decision,
    /// A conversation with another resident.
    Conversation,
    /// A relationship level changed.
    RelationshipUpdate,
    /// Something worth remembering was achieved.
    Achievement,
    /// An internal thought.
    Thought,
    /// Something seen in the city.
    Observation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_labels_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_label(kind.as_str()), Some(kind));
        }
        assert_eq!(ActionKind::from_label("  SLEEP "), Some(ActionKind::Rest));
        assert_eq!(ActionKind::from_label("dance"), None);
    }

    #[test]
    fn time_slots_cover_the_day() {
        assert_eq!(TimeSlot::from_hour(5), TimeSlot::Night);
        assert_eq!(TimeSlot::from_hour(6), TimeSlot::Morning);
        assert_eq!(TimeSlot::from_hour(12), TimeSlot::Afternoon);
        assert_eq!(TimeSlot::from_hour(18), TimeSlot::Evening);
        assert_eq!(TimeSlot::from_hour(22), TimeSlot::Night);
    }

    #[test]
    fn residential_has_top_priority() {
        assert_eq!(BuildingKind::Residential.priority_rank(), 0);
        assert!(BuildingKind::Restaurant.priority_rank() < BuildingKind::Office.priority_rank());
    }

    #[test]
    fn unknown_mood_is_neutral() {
        assert_eq!(Mood::from_label("ecstatic-ish"), Mood::Neutral);
        assert_eq!(Mood::from_label("Friendly"), Mood::Friendly);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&BuildingKind::CommunityCenter).ok();
        assert_eq!(json.as_deref(), Some("\"community_center\""));
    }
}
