//! Weather with deterministic randomness.
//!
//! The weather holds steady most of the time. Each tick rolls a small
//! chance of change; when it fires, the next weather is picked among the
//! other variants. Rolls come from a seeded `xorshift64`, so the same seed
//! always replays the same sequence.

use civitas_types::Weather;
use serde::{Deserialize, Serialize};

/// Resolution of the per-tick change roll.
const ROLL_SCALE: u64 = 1_000_000;

/// Salt separating the "which weather" roll from the "does it change" roll.
const PICK_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Deterministic weather generator for the city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSystem {
    /// Seed for per-tick randomness.
    seed: u64,
    /// Chance per tick that the weather changes, in `[0, 1]`.
    change_chance: f64,
    /// Weather right now.
    current: Weather,
}

impl WeatherSystem {
    /// Create a weather system starting out sunny.
    pub const fn new(seed: u64, change_chance: f64) -> Self {
        Self {
            seed,
            change_chance,
            current: Weather::Sunny,
        }
    }

    /// Weather right now.
    pub const fn current(&self) -> Weather {
        self.current
    }

    /// Override the current weather (for restoring state).
    pub const fn set_current(&mut self, weather: Weather) {
        self.current = weather;
    }

    /// Roll for a change on `tick`. Returns the new weather if it changed.
    pub fn update(&mut self, tick: u64) -> Option<Weather> {
        let roll = deterministic_random(self.seed, tick)
            .checked_rem(ROLL_SCALE)
            .unwrap_or(0);
        if roll >= chance_threshold(self.change_chance) {
            return None;
        }

        let others: Vec<Weather> = Weather::ALL
            .into_iter()
            .filter(|w| *w != self.current)
            .collect();
        let count = u64::try_from(others.len()).unwrap_or(1);
        let pick = deterministic_random(self.seed ^ PICK_SALT, tick)
            .checked_rem(count)
            .and_then(|i| usize::try_from(i).ok())
            .unwrap_or(0);
        let next = others.get(pick).copied()?;
        self.current = next;
        Some(next)
    }
}

/// Convert a probability into a threshold on `[0, ROLL_SCALE)`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn chance_threshold(chance: f64) -> u64 {
    (chance.clamp(0.0, 1.0) * ROLL_SCALE as f64).round() as u64
}

/// `xorshift64` keyed on seed and tick.
const fn deterministic_random(seed: u64, tick: u64) -> u64 {
    let mut state = seed.wrapping_add(tick.wrapping_mul(0x517c_c1b7_2722_0a95));
    if state == 0 {
        state = 0xdead_beef_cafe_babe;
    }
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_chance_never_changes() {
        let mut weather = WeatherSystem::new(42, 0.0);
        for tick in 0..10_000 {
            assert_eq!(weather.update(tick), None);
        }
        assert_eq!(weather.current(), Weather::Sunny);
    }

    #[test]
    fn certain_change_always_moves_to_another_variant() {
        let mut weather = WeatherSystem::new(7, 1.0);
        for tick in 0..100 {
            let before = weather.current();
            let after = weather.update(tick);
            assert!(after.is_some());
            assert_ne!(after, Some(before));
        }
    }

    #[test]
    fn same_seed_replays_the_same_sequence() {
        let mut a = WeatherSystem::new(99, 0.3);
        let mut b = WeatherSystem::new(99, 0.3);
        for tick in 0..500 {
            assert_eq!(a.update(tick), b.update(tick));
        }
    }

    #[test]
    fn default_chance_is_rare() {
        let mut weather = WeatherSystem::new(5, 0.001);
        let changes = (0..10_000).filter(|t| weather.update(*t).is_some()).count();
        assert!(changes < 100, "changed {changes} times");
    }

    #[test]
    fn random_handles_zero_state() {
        assert_ne!(deterministic_random(0, 0), 0);
    }
}
