//! City clock: scaled game time on top of real elapsed time.
//!
//! The clock is the single source of truth for time in the simulation. It
//! is driven by the runner with the real milliseconds elapsed since the
//! previous tick and derives two timelines from them:
//!
//! - **Sim time** (`now_ms`): unpaused real milliseconds. Every cooldown,
//!   duration, and timeout in the agent layer is measured on it.
//! - **Game time**: a time of day that runs 60x faster than real time,
//!   further multiplied by the time scale. One real minute is one game hour
//!   at scale 1.
//!
//! Pausing freezes both timelines.

use civitas_types::TimeSlot;
use serde::{Deserialize, Serialize};

/// Game milliseconds per real millisecond at scale 1.
const GAME_SPEEDUP: f64 = 60.0;
/// Milliseconds in a game hour.
const HOUR_MS: u64 = 3_600_000;
/// Milliseconds in a game minute.
const MINUTE_MS: u64 = 60_000;
/// Milliseconds in a game day.
const DAY_MS: u64 = 86_400_000;

/// Slowest allowed time scale.
pub const MIN_TIME_SCALE: f64 = 0.5;
/// Fastest allowed time scale.
pub const MAX_TIME_SCALE: f64 = 10.0;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Invalid clock configuration.
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// What one call to [`CityClock::advance`] produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockAdvance {
    /// The new tick number.
    pub tick: u64,
    /// Sim time after the advance.
    pub now_ms: u64,
    /// Game minutes that passed during the advance.
    pub game_minutes: f64,
}

/// Persistable clock state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    /// Tick number.
    pub tick: u64,
    /// Sim time.
    pub now_ms: u64,
    /// Game time since day 1 00:00.
    pub game_ms: u64,
    /// Time scale.
    pub time_scale: f64,
}

/// Scaled game clock.
#[derive(Debug, Clone, PartialEq)]
pub struct CityClock {
    /// Current tick number.
    tick: u64,
    /// Unpaused real milliseconds since the simulation started.
    now_ms: u64,
    /// Game milliseconds since day 1 00:00.
    game_ms: u64,
    /// Current time scale.
    time_scale: f64,
    /// Scale to restore on resume, set while paused.
    paused_scale: Option<f64>,
}

impl CityClock {
    /// Create a clock at `start_hour` on day 1.
    ///
    /// The scale is clamped to [`MIN_TIME_SCALE`]..=[`MAX_TIME_SCALE`].
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `start_hour` is not a valid
    /// hour of the day.
    pub fn new(start_hour: u32, time_scale: f64) -> Result<Self, ClockError> {
        if start_hour >= 24 {
            return Err(ClockError::InvalidConfig {
                reason: format!("start hour {start_hour} is not in 0..24"),
            });
        }
        Ok(Self {
            tick: 0,
            now_ms: 0,
            game_ms: u64::from(start_hour).saturating_mul(HOUR_MS),
            time_scale: clamp_scale(time_scale, 1.0),
            paused_scale: None,
        })
    }

    /// Restore a clock from a snapshot. The restored clock is running.
    pub fn from_snapshot(snapshot: ClockSnapshot) -> Self {
        Self {
            tick: snapshot.tick,
            now_ms: snapshot.now_ms,
            game_ms: snapshot.game_ms,
            time_scale: clamp_scale(snapshot.time_scale, 1.0),
            paused_scale: None,
        }
    }

    /// Capture the clock state.
    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            tick: self.tick,
            now_ms: self.now_ms,
            game_ms: self.game_ms,
            time_scale: self.paused_scale.unwrap_or(self.time_scale),
        }
    }

    /// Advance by `real_ms` of wall time and count one tick.
    ///
    /// While paused the tick still counts but neither timeline moves.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would
    /// exceed `u64::MAX`.
    pub fn advance(&mut self, real_ms: u64) -> Result<ClockAdvance, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        if self.is_paused() {
            return Ok(ClockAdvance {
                tick: self.tick,
                now_ms: self.now_ms,
                game_minutes: 0.0,
            });
        }

        let game_delta = game_delta_ms(real_ms, self.time_scale);
        self.now_ms = self.now_ms.saturating_add(real_ms);
        self.game_ms = self.game_ms.saturating_add(game_delta);

        Ok(ClockAdvance {
            tick: self.tick,
            now_ms: self.now_ms,
            game_minutes: minutes(game_delta),
        })
    }

    /// Current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Sim time in milliseconds.
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Game milliseconds since day 1 00:00.
    pub const fn game_ms(&self) -> u64 {
        self.game_ms
    }

    /// Current time scale (0 while paused).
    pub const fn time_scale(&self) -> f64 {
        if self.paused_scale.is_some() {
            0.0
        } else {
            self.time_scale
        }
    }

    /// Set the time scale, clamped into range. Returns the applied scale.
    ///
    /// While paused the new scale takes effect on resume. A non-finite
    /// value leaves the scale unchanged.
    pub fn set_time_scale(&mut self, scale: f64) -> f64 {
        match self.paused_scale {
            Some(saved) => {
                let applied = clamp_scale(scale, saved);
                self.paused_scale = Some(applied);
                applied
            }
            None => {
                self.time_scale = clamp_scale(scale, self.time_scale);
                self.time_scale
            }
        }
    }

    /// Freeze game time and sim time.
    pub const fn pause(&mut self) {
        if self.paused_scale.is_none() {
            self.paused_scale = Some(self.time_scale);
        }
    }

    /// Resume with the scale that was in effect before pausing.
    pub const fn resume(&mut self) {
        if let Some(scale) = self.paused_scale.take() {
            self.time_scale = scale;
        }
    }

    /// Whether the clock is paused.
    pub const fn is_paused(&self) -> bool {
        self.paused_scale.is_some()
    }

    /// Day number, starting at 1.
    pub const fn day(&self) -> u64 {
        (self.game_ms / DAY_MS).saturating_add(1)
    }

    /// Hour of the game day (0-23).
    #[allow(clippy::cast_possible_truncation)]
    pub const fn game_hour(&self) -> u32 {
        // Always below 24, so the cast is lossless.
        ((self.game_ms % DAY_MS) / HOUR_MS) as u32
    }

    /// Minute of the game hour (0-59).
    #[allow(clippy::cast_possible_truncation)]
    pub const fn game_minute(&self) -> u32 {
        ((self.game_ms % HOUR_MS) / MINUTE_MS) as u32
    }

    /// Time of day as `HH:MM`.
    pub fn time_string(&self) -> String {
        format!("{:02}:{:02}", self.game_hour(), self.game_minute())
    }

    /// Part of the day the current hour falls in.
    pub const fn time_slot(&self) -> TimeSlot {
        TimeSlot::from_hour(self.game_hour())
    }

    /// Whether it is night (before 06:00 or from 22:00).
    pub const fn is_night(&self) -> bool {
        civitas_world::is_night(self.game_hour())
    }
}

/// Clamp a requested scale, keeping `fallback` for non-finite input.
fn clamp_scale(scale: f64, fallback: f64) -> f64 {
    if scale.is_finite() {
        scale.clamp(MIN_TIME_SCALE, MAX_TIME_SCALE)
    } else {
        fallback
    }
}

/// Game milliseconds covered by `real_ms` at `scale`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn game_delta_ms(real_ms: u64, scale: f64) -> u64 {
    let raw = (real_ms as f64 * GAME_SPEEDUP * scale).round();
    if raw.is_finite() && raw > 0.0 {
        raw.min(u64::MAX as f64) as u64
    } else {
        0
    }
}

#[allow(clippy::cast_precision_loss)]
fn minutes(game_ms: u64) -> f64 {
    game_ms as f64 / MINUTE_MS as f64
}
