//! Opening hours.
//!
//! A building opens in one or more hour windows. A window whose closing
//! hour is before its opening hour wraps past midnight.

use civitas_types::BuildingKind;
use serde::{Deserialize, Serialize};

use crate::error::WorldError;

/// A single opening window, `[open, close)` in whole game hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    /// Opening hour (0-24).
    pub open: u32,
    /// Closing hour (0-24).
    pub close: u32,
}

impl HourWindow {
    /// Create a window, rejecting hours past 24.
    pub const fn new(open: u32, close: u32) -> Result<Self, WorldError> {
        if open > 24 || close > 24 {
            return Err(WorldError::InvalidWindow { open, close });
        }
        Ok(Self { open, close })
    }

    /// Whether this window covers the whole day.
    pub const fn is_all_day(self) -> bool {
        self.open == 0 && self.close == 24
    }

    /// Whether this window wraps past midnight.
    pub const fn wraps(self) -> bool {
        self.close < self.open
    }

    /// Whether `hour` falls inside the window.
    pub const fn contains(self, hour: u32) -> bool {
        if self.wraps() {
            hour >= self.open || hour < self.close
        } else {
            hour >= self.open && hour < self.close
        }
    }

    /// Hours elapsed since this window opened, or 0 when it is closed.
    pub const fn hours_open(self, hour: u32) -> u32 {
        if self.is_all_day() {
            return 24;
        }
        if !self.contains(hour) {
            return 0;
        }
        if hour >= self.open {
            hour.saturating_sub(self.open)
        } else {
            24u32.saturating_sub(self.open).saturating_add(hour)
        }
    }
}

/// The full opening schedule of a building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    windows: Vec<HourWindow>,
}

impl OpeningHours {
    /// Open around the clock.
    pub fn always() -> Self {
        Self {
            windows: vec![HourWindow { open: 0, close: 24 }],
        }
    }

    /// Build a schedule from explicit windows.
    pub const fn from_windows(windows: Vec<HourWindow>) -> Self {
        Self { windows }
    }

    /// Default schedule for a building kind.
    pub fn for_kind(kind: BuildingKind) -> Self {
        let window = |open, close| HourWindow { open, close };
        let windows = match kind {
            BuildingKind::Residential | BuildingKind::Park | BuildingKind::Plaza => {
                vec![window(0, 24)]
            }
            BuildingKind::Commercial => vec![window(9, 21)],
            BuildingKind::Restaurant => vec![window(11, 14), window(17, 22)],
            BuildingKind::Cafe => vec![window(7, 23)],
            BuildingKind::Recreation => vec![window(9, 22)],
            BuildingKind::Entertainment => vec![window(12, 24)],
            BuildingKind::Office => vec![window(9, 18)],
            BuildingKind::Cafeteria => vec![window(7, 19)],
            BuildingKind::CommunityCenter => vec![window(8, 22)],
        };
        Self { windows }
    }

    /// The configured windows.
    pub fn windows(&self) -> &[HourWindow] {
        &self.windows
    }

    /// Whether the building is open at `hour`.
    pub fn is_open(&self, hour: u32) -> bool {
        self.windows.iter().any(|w| w.contains(hour))
    }

    /// Hours since the window covering `hour` opened, 0 when closed.
    pub fn hours_open(&self, hour: u32) -> u32 {
        self.windows
            .iter()
            .find(|w| w.contains(hour))
            .map_or(0, |w| w.hours_open(hour))
    }
}

impl Default for OpeningHours {
    fn default() -> Self {
        Self::from_windows(vec![HourWindow { open: 9, close: 18 }])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn office_hours() {
        let hours = OpeningHours::for_kind(BuildingKind::Office);
        assert!(!hours.is_open(8));
        assert!(hours.is_open(9));
        assert!(hours.is_open(17));
        assert!(!hours.is_open(18));
    }

    #[test]
    fn restaurant_has_two_services() {
        let hours = OpeningHours::for_kind(BuildingKind::Restaurant);
        assert!(hours.is_open(12));
        assert!(!hours.is_open(15));
        assert!(hours.is_open(19));
        assert!(!hours.is_open(22));
        assert_eq!(hours.hours_open(19), 2);
    }

    #[test]
    fn overnight_window_wraps() {
        let window = HourWindow::new(20, 4).unwrap();
        assert!(window.wraps());
        assert!(window.contains(23));
        assert!(window.contains(2));
        assert!(!window.contains(4));
        assert!(!window.contains(12));
        assert_eq!(window.hours_open(22), 2);
        assert_eq!(window.hours_open(3), 7);
    }

    #[test]
    fn all_day_counts_as_twenty_four_hours() {
        let hours = OpeningHours::always();
        assert!(hours.is_open(0));
        assert!(hours.is_open(23));
        assert_eq!(hours.hours_open(5), 24);
    }

    #[test]
    fn closed_hours_are_zero() {
        let hours = OpeningHours::for_kind(BuildingKind::Cafe);
        assert_eq!(hours.hours_open(3), 0);
        assert_eq!(hours.hours_open(10), 3);
    }

    #[test]
    fn rejects_hours_past_midnight() {
        assert!(matches!(
            HourWindow::new(9, 25),
            Err(WorldError::InvalidWindow { open: 9, close: 25 })
        ));
    }
}
