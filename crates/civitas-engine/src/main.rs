//! City engine binary for the Civitas simulation.
//!
//! Wires together the clock, the starting city, resident seeding, the
//! decision oracle, snapshot persistence, and operator controls, then
//! runs the tick loop until a termination condition is met.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `civitas-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the starting city (15 buildings)
//! 4. Initialize the LLM oracle from the environment
//! 5. Seed residents with stable ids
//! 6. Restore snapshots, if persistence is enabled
//! 7. Create operator state and hook Ctrl-C to a stop request
//! 8. Run the simulation loop
//! 9. Log the result

mod error;
mod seed;
mod view_callback;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use civitas_core::config::{LoggingConfig, SimulationConfig};
use civitas_core::operator::OperatorState;
use civitas_core::persistence::{
    FileSnapshotStore, MemorySnapshotStore, Persistence, SnapshotStore,
};
use civitas_core::runner::{self, SimulationResult, TickCallback};
use civitas_core::tick::CityState;
use civitas_oracle::LlmOracle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::view_callback::ViewCallback;

/// Ticks between city status lines.
const STATUS_EVERY_TICKS: u64 = 50;

/// Application entry point for the city engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config = load_config().context("loading civitas-config.yaml")?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("civitas-engine starting");
    info!(
        city = %config.city.name,
        seed = config.city.seed,
        tick_interval_ms = config.city.tick_interval_ms,
        start_hour = config.city.start_hour,
        time_scale = config.city.time_scale,
        "Configuration loaded"
    );

    // 3. Create the starting city.
    let (registry, buildings) = civitas_world::create_starting_city().map_err(EngineError::from)?;
    info!(buildings = registry.len(), "Starting city created");
    let mut state = CityState::new(&config, registry).map_err(EngineError::from)?;

    // 4. Initialize the oracle.
    let mut oracle = LlmOracle::init(&config.oracle).map_err(EngineError::from)?;

    // 5. Seed residents.
    let plans = seed::plan_residents(config.city.seed, config.city.residents, &buildings);
    seed::seed_residents(&mut state, &mut oracle, &plans).await?;

    // 7. Create operator state.
    let operator = Arc::new(OperatorState::new(
        config.city.tick_interval_ms,
        &config.simulation,
    ));
    info!(
        max_ticks = operator.max_ticks(),
        max_real_time_seconds = operator.max_real_time_seconds(),
        tick_interval_ms = operator.tick_interval_ms(),
        "Operator state initialized"
    );
    {
        let operator = Arc::clone(&operator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping after the current tick");
                operator.request_stop();
            }
        });
    }

    let mut callback = ViewCallback::new(STATUS_EVERY_TICKS);

    // 6 and 8. Restore snapshots, then run the simulation.
    let persistence = &config.persistence;
    let result = if persistence.enabled {
        let store = FileSnapshotStore::open(&persistence.directory)
            .await
            .map_err(EngineError::from)
            .with_context(|| format!("opening snapshot directory {}", persistence.directory))?;
        info!(directory = %persistence.directory, "File snapshots enabled");
        run_with_store(
            &mut state,
            &mut oracle,
            &operator,
            Persistence::new(store, persistence.interval_ticks),
            &mut callback,
        )
        .await?
    } else {
        info!("Snapshots disabled, keeping state in memory");
        run_with_store(
            &mut state,
            &mut oracle,
            &operator,
            Persistence::new(MemorySnapshotStore::new(), 0),
            &mut callback,
        )
        .await?
    };

    // 9. Log results.
    runner::log_simulation_end(&result);
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        oracle_requests = oracle.stats().requests,
        "civitas-engine shutdown complete"
    );

    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the config
/// level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load the simulation configuration from `civitas-config.yaml`.
///
/// Looks for the config file relative to the current working directory.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let config_path = Path::new("civitas-config.yaml");
    if config_path.exists() {
        Ok(SimulationConfig::from_file(config_path)?)
    } else {
        let mut config = SimulationConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

/// Restore from `persistence`, then run the tick loop.
async fn run_with_store<S: SnapshotStore>(
    state: &mut CityState,
    oracle: &mut LlmOracle,
    operator: &Arc<OperatorState>,
    mut persistence: Persistence<S>,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, EngineError> {
    let restored = persistence.restore(state).await;
    info!(
        city = restored.city,
        agents = restored.agents,
        failed = restored.failed,
        tick = state.clock.tick(),
        "Snapshots restored"
    );

    info!(residents = state.agents().len(), "City assembled, entering tick loop");
    Ok(runner::run_simulation(state, oracle, operator, &mut persistence, callback).await?)
}
