//! Read-only render view of the city.
//!
//! The render layer gets a [`CityView`] after each tick and nothing else:
//! positions, current actions with progress, state bars, and the most
//! recent memories, decisions, and interactions of every agent. It can
//! send back only pause, resume, and time-scale signals through
//! [`OperatorState`](crate::operator::OperatorState).

use civitas_types::{AgentId, AgentView, CityView};

use crate::tick::CityState;

/// Build the render view of the whole city.
pub fn city_view(state: &CityState) -> CityView {
    let now_ms = state.clock.now_ms();
    CityView {
        tick: state.clock.tick(),
        day: state.clock.day(),
        game_time: state.clock.time_string(),
        time_scale: state.clock.snapshot().time_scale,
        paused: state.clock.is_paused(),
        weather: state.weather.current(),
        agents: state
            .agents()
            .iter()
            .map(|a| a.view(now_ms, state.render_recent))
            .collect(),
        buildings: state.registry.iter().map(|b| b.view()).collect(),
    }
}

/// Render view of a single agent.
pub fn agent_view(state: &CityState, id: AgentId) -> Option<AgentView> {
    state
        .agent(id)
        .map(|a| a.view(state.clock.now_ms(), state.render_recent))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use civitas_agents::{Agent, AgentSpawn};
    use civitas_types::{DailySchedule, Personality, Position};
    use civitas_world::create_starting_city;

    use super::*;
    use crate::config::SimulationConfig;

    fn make_state() -> (CityState, AgentId) {
        let (registry, _) = create_starting_city().unwrap();
        let mut state = CityState::new(&SimulationConfig::default(), registry).unwrap();
        let agent = Agent::new(
            AgentSpawn {
                name: String::from("Ada"),
                occupation: String::from("clerk"),
                position: Position::new(3.0, 4.0),
                residence: None,
                workplace: None,
                personality: Personality::default(),
                schedule: DailySchedule::default(),
            },
            state.memory,
        );
        let id = state.add_agent(agent).unwrap();
        (state, id)
    }

    #[test]
    fn view_lists_everything() {
        let (state, id) = make_state();
        let view = city_view(&state);
        assert_eq!(view.agents.len(), 1);
        assert_eq!(view.buildings.len(), state.registry.len());
        assert_eq!(view.game_time, "08:00");
        assert!(!view.paused);

        let agent = view.agents.first().unwrap();
        assert_eq!(agent.id, id);
        assert_eq!(agent.position, Position::new(3.0, 4.0));
        assert_eq!(agent.progress, 0);
    }

    #[test]
    fn paused_view_keeps_scale() {
        let (mut state, _) = make_state();
        state.clock.set_time_scale(2.0);
        state.clock.pause();
        let view = city_view(&state);
        assert!(view.paused);
        assert!((view.time_scale - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_agent_has_no_view() {
        let (state, _) = make_state();
        assert!(agent_view(&state, AgentId::new()).is_none());
    }

    #[test]
    fn view_serializes_for_the_render_layer() {
        let (state, _) = make_state();
        let json = serde_json::to_value(city_view(&state)).unwrap();
        assert!(json.get("agents").is_some());
        assert!(json.get("weather").is_some());
    }
}
