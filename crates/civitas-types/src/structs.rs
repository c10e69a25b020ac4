//! Core value structs shared across the workspace.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::TimeSlot;

/// A point on the city ground plane.
///
/// The city is flat, so the vertical axis is fixed and only `x` and `z`
/// are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// East-west coordinate.
    pub x: f64,
    /// North-south coordinate.
    pub z: f64,
}

impl Position {
    /// Create a position from its two coordinates.
    pub const fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.z - other.z)
    }

    /// Move up to `max_step` units towards `target`.
    ///
    /// Lands exactly on the target when it is within reach.
    pub fn step_towards(self, target: Self, max_step: f64) -> Self {
        let distance = self.distance_to(target);
        if distance <= max_step || distance <= f64::EPSILON {
            return target;
        }
        let ratio = max_step / distance;
        Self {
            x: (target.x - self.x).mul_add(ratio, self.x),
            z: (target.z - self.z).mul_add(ratio, self.z),
        }
    }
}

/// Personality profile of a resident.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Personality {
    /// Character traits ("curious", "outgoing", ...).
    #[serde(default)]
    pub traits: Vec<String>,
    /// Hobbies and interests.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Things the resident values.
    #[serde(default)]
    pub values: Vec<String>,
    /// Longer-term goals.
    #[serde(default)]
    pub goals: Vec<String>,
}

/// Planned activities per part of the day.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DailySchedule {
    /// Activities planned for each slot, in order.
    #[serde(default)]
    pub slots: BTreeMap<TimeSlot, Vec<String>>,
}

impl DailySchedule {
    /// Activities planned for a slot (empty when nothing is planned).
    pub fn activities(&self, slot: TimeSlot) -> &[String] {
        self.slots.get(&slot).map_or(&[], Vec::as_slice)
    }

    /// Whether no slot has any activity.
    pub fn is_empty(&self) -> bool {
        self.slots.values().all(Vec::is_empty)
    }
}
