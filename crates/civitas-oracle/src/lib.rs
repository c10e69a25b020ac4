//! LLM-backed decision oracle for the Civitas city simulation.
//!
//! Implements [`DecisionOracle`] on top of remote chat-completion APIs.
//! The tick loop never depends on this crate directly; it sees only the
//! trait, and falls back locally whenever a call fails.
//!
//! # Modules
//!
//! - [`config`] -- Provider kinds and credentials from the environment.
//! - [`llm`] -- HTTP backends for the two wire formats.
//! - [`prompt`] -- `minijinja` templates for every request kind.
//! - [`parse`] -- Lenient JSON extraction from model output.
//! - [`cache`] -- Short-lived decision cache.
//! - [`rate_limit`] -- Per-provider request windows.
//! - [`provider`] -- Failover across providers.
//! - [`oracle`] -- [`LlmOracle`], tying it all together.
//!
//! [`DecisionOracle`]: civitas_core::decision::DecisionOracle
//! [`LlmOracle`]: oracle::LlmOracle

pub mod cache;
pub mod config;
pub mod error;
pub mod llm;
pub mod oracle;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod rate_limit;

pub use error::LlmError;
pub use oracle::{LlmOracle, OracleStats};
