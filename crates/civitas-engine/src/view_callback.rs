//! Tick callback that publishes the render view.
//!
//! After each tick the callback rebuilds the [`CityView`] and keeps the
//! latest one. Every `report_every` ticks it logs a one-line summary of the
//! city; the full view goes out at `trace` as JSON for anyone tailing logs.

use civitas_core::runner::TickCallback;
use civitas_core::snapshot::city_view;
use civitas_core::tick::{CityState, TickSummary};
use civitas_types::CityView;
use tracing::{debug, info, trace, warn};

/// Callback that keeps and periodically reports the city view.
pub struct ViewCallback {
    report_every: u64,
    latest: Option<CityView>,
}

impl ViewCallback {
    /// Report every `report_every` ticks; 0 never reports.
    pub const fn new(report_every: u64) -> Self {
        Self {
            report_every,
            latest: None,
        }
    }

    /// The view after the most recent tick.
    pub const fn latest(&self) -> Option<&CityView> {
        self.latest.as_ref()
    }
}

impl TickCallback for ViewCallback {
    fn on_tick(&mut self, summary: &TickSummary, state: &CityState) {
        debug!(
            tick = summary.tick,
            decisions = summary.decisions(),
            started = summary.actions_started,
            completed = summary.actions_completed,
            failed = summary.actions_failed,
            interactions = summary.interactions,
            "Tick complete"
        );

        let view = city_view(state);
        if matches!(summary.tick.checked_rem(self.report_every), Some(0)) {
            info!(
                tick = view.tick,
                day = view.day,
                game_time = %view.game_time,
                weather = ?view.weather,
                paused = view.paused,
                idle = summary.idle,
                moving = summary.moving,
                acting = summary.acting,
                "City status"
            );
            match serde_json::to_string(&view) {
                Ok(json) => trace!(view = %json, "City view"),
                Err(e) => warn!(error = %e, "Failed to serialize city view"),
            }
        }
        self.latest = Some(view);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use civitas_core::config::SimulationConfig;
    use civitas_world::create_starting_city;

    use super::*;

    #[test]
    fn keeps_the_latest_view() {
        let (registry, _) = create_starting_city().unwrap();
        let state = CityState::new(&SimulationConfig::default(), registry).unwrap();
        let mut callback = ViewCallback::new(10);
        assert!(callback.latest().is_none());

        let summary = TickSummary {
            tick: 3,
            ..TickSummary::default()
        };
        callback.on_tick(&summary, &state);
        let view = callback.latest().unwrap();
        assert_eq!(view.buildings.len(), state.registry.len());
    }
}
