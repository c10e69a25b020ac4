//! Clock, tick loop, and orchestration for the Civitas city simulation.
//!
//! This crate owns the tick cycle that drives the city: the clock
//! advances, the world refreshes, and every agent drifts, progresses its
//! action, and decides what to do next.
//!
//! # Modules
//!
//! - [`clock`] -- Sim time, game time, time scale, and pause.
//! - [`config`] -- Configuration loading from `civitas-config.yaml` into
//!   strongly-typed structs.
//! - [`decision`] -- [`DecisionOracle`] trait, [`OfflineOracle`], and
//!   validation of oracle output.
//! - [`interaction`] -- The two-party social protocol.
//! - [`operator`] -- Pause, resume, time scale, and stop signals.
//! - [`persistence`] -- Key-value snapshots of the city and its agents.
//! - [`runner`] -- The bounded run loop around [`run_tick`].
//! - [`snapshot`] -- Read-only render view of the city.
//! - [`tick`] -- The per-tick engine loop.
//!
//! [`DecisionOracle`]: decision::DecisionOracle
//! [`OfflineOracle`]: decision::OfflineOracle
//! [`run_tick`]: tick::run_tick

pub mod clock;
pub mod config;
pub mod decision;
pub mod interaction;
pub mod operator;
pub mod persistence;
pub mod runner;
pub mod snapshot;
pub mod tick;
