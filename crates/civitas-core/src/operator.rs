//! Operator control state for runtime simulation management.
//!
//! The render layer may only send three signals: pause, resume, and a new
//! time scale. They land here, together with the stop request and the run
//! bounds, and the runner applies them to the city clock between ticks.
//!
//! All mutable control fields use [`std::sync::atomic`] types so they can
//! be shared through an [`Arc`](std::sync::Arc) between the tick loop and
//! whatever front end drives it, without locks on the hot path.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::clock::{MAX_TIME_SCALE, MIN_TIME_SCALE};
use crate::config::SimulationBoundsConfig;

/// Sentinel meaning "no time scale change pending".
const NO_SCALE: u64 = u64::MAX;

/// Reason why the simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// Reached the configured `max_real_time_seconds` limit.
    MaxRealTimeReached,
    /// An operator issued a stop command.
    OperatorStop,
}

/// Shared operator control state.
#[derive(Debug)]
pub struct OperatorState {
    /// Whether the simulation should be paused.
    paused: AtomicBool,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Requested time scale as `f64` bits, or [`NO_SCALE`].
    pending_scale: AtomicU64,

    /// Tick interval in milliseconds, fixed by configuration.
    tick_interval_ms: u64,

    /// Wall-clock time when the simulation started.
    started_at: DateTime<Utc>,

    /// Maximum number of ticks (0 = unlimited).
    max_ticks: u64,

    /// Maximum wall-clock seconds (0 = unlimited).
    max_real_time_seconds: u64,

    /// Reason the simulation ended, if it has.
    end_reason: Mutex<Option<SimulationEndReason>>,
}

impl OperatorState {
    /// Create a new operator state from configuration.
    pub fn new(tick_interval_ms: u64, bounds: &SimulationBoundsConfig) -> Self {
        Self {
            paused: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            pending_scale: AtomicU64::new(NO_SCALE),
            tick_interval_ms,
            started_at: Utc::now(),
            max_ticks: bounds.max_ticks,
            max_real_time_seconds: bounds.max_real_time_seconds,
            end_reason: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Check whether the simulation should be paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause the simulation. Sim and game time stop on the next tick.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume the simulation.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    // -----------------------------------------------------------------------
    // Time scale
    // -----------------------------------------------------------------------

    /// Request a new time scale.
    ///
    /// Returns `false` for a non-finite value. Finite values are clamped
    /// into the clock's range when applied.
    pub fn set_time_scale(&self, scale: f64) -> bool {
        if !scale.is_finite() {
            return false;
        }
        let clamped = scale.clamp(MIN_TIME_SCALE, MAX_TIME_SCALE);
        self.pending_scale.store(clamped.to_bits(), Ordering::Release);
        true
    }

    /// Take the pending time scale request, if any.
    pub fn take_time_scale(&self) -> Option<f64> {
        let bits = self.pending_scale.swap(NO_SCALE, Ordering::AcqRel);
        (bits != NO_SCALE).then(|| f64::from_bits(bits))
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean simulation stop.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record the reason the simulation ended.
    pub async fn set_end_reason(&self, reason: SimulationEndReason) {
        let mut guard = self.end_reason.lock().await;
        *guard = Some(reason);
    }

    /// Get the reason the simulation ended, if it has.
    pub async fn end_reason(&self) -> Option<SimulationEndReason> {
        *self.end_reason.lock().await
    }

    // -----------------------------------------------------------------------
    // Tick Speed
    // -----------------------------------------------------------------------

    /// The configured tick interval in milliseconds.
    pub const fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    // -----------------------------------------------------------------------
    // Boundaries
    // -----------------------------------------------------------------------

    /// Check whether the tick limit has been reached.
    ///
    /// Returns `true` if `max_ticks > 0` and `current_tick >= max_ticks`.
    pub const fn tick_limit_reached(&self, current_tick: u64) -> bool {
        self.max_ticks > 0 && current_tick >= self.max_ticks
    }

    /// Check whether the wall-clock time limit has been reached.
    pub fn time_limit_reached(&self) -> bool {
        self.max_real_time_seconds > 0 && self.elapsed_seconds() >= self.max_real_time_seconds
    }

    /// Return the wall-clock start time.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Return elapsed seconds since simulation start.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        // `num_seconds` can be negative if the wall clock steps back.
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }

    /// Get the configured max ticks.
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Get the configured max real-time seconds.
    pub const fn max_real_time_seconds(&self) -> u64 {
        self.max_real_time_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_bounds() -> SimulationBoundsConfig {
        SimulationBoundsConfig {
            max_ticks: 0,
            max_real_time_seconds: 0,
        }
    }

    #[test]
    fn initial_state_is_running() {
        let state = OperatorState::new(100, &default_bounds());
        assert!(!state.is_paused());
        assert!(!state.is_stop_requested());
        assert_eq!(state.take_time_scale(), None);
    }

    #[test]
    fn pause_and_resume() {
        let state = OperatorState::new(100, &default_bounds());
        state.pause();
        assert!(state.is_paused());
        state.resume();
        assert!(!state.is_paused());
    }

    #[test]
    fn time_scale_is_taken_once() {
        let state = OperatorState::new(100, &default_bounds());
        assert!(state.set_time_scale(2.0));
        assert_eq!(state.take_time_scale(), Some(2.0));
        assert_eq!(state.take_time_scale(), None);
    }

    #[test]
    fn time_scale_is_clamped_and_nan_rejected() {
        let state = OperatorState::new(100, &default_bounds());
        assert!(state.set_time_scale(50.0));
        assert_eq!(state.take_time_scale(), Some(MAX_TIME_SCALE));
        assert!(!state.set_time_scale(f64::NAN));
        assert_eq!(state.take_time_scale(), None);
    }

    #[test]
    fn tick_interval_comes_from_config() {
        let state = OperatorState::new(250, &default_bounds());
        assert_eq!(state.tick_interval_ms(), 250);
    }

    #[test]
    fn tick_limit_zero_means_unlimited() {
        let state = OperatorState::new(100, &default_bounds());
        assert!(!state.tick_limit_reached(999_999));
        assert!(!state.time_limit_reached());
    }

    #[test]
    fn tick_limit_reached() {
        let bounds = SimulationBoundsConfig {
            max_ticks: 100,
            max_real_time_seconds: 0,
        };
        let state = OperatorState::new(100, &bounds);
        assert!(!state.tick_limit_reached(99));
        assert!(state.tick_limit_reached(100));
    }

    #[tokio::test]
    async fn end_reason_is_recorded() {
        let state = OperatorState::new(100, &default_bounds());
        assert_eq!(state.end_reason().await, None);
        state.set_end_reason(SimulationEndReason::OperatorStop).await;
        assert_eq!(
            state.end_reason().await,
            Some(SimulationEndReason::OperatorStop)
        );
    }
}
