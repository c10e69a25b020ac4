//! Error types for the city engine binary.
//!
//! [`EngineError`] wraps every failure mode during engine startup and the
//! run itself, so `main` can propagate with `?`.

/// Top-level error for the city engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: civitas_core::config::ConfigError,
    },

    /// Clock initialization failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: civitas_core::clock::ClockError,
    },

    /// Starting city construction failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: civitas_world::WorldError,
    },

    /// A resident could not be added.
    #[error("agent error: {source}")]
    Agent {
        /// The underlying agent error.
        #[from]
        source: civitas_agents::AgentError,
    },

    /// The oracle could not be set up.
    #[error("oracle error: {source}")]
    Oracle {
        /// The underlying oracle error.
        #[from]
        source: civitas_oracle::LlmError,
    },

    /// The snapshot store could not be opened.
    #[error("persistence error: {source}")]
    Persist {
        /// The underlying persistence error.
        #[from]
        source: civitas_core::persistence::PersistError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: civitas_core::runner::RunnerError,
    },
}
