//! Error types for the civitas-agents crate.
//!
//! [`ActionError`] is the failure taxonomy of the action state machine. It
//! is recorded in an agent's failed-action history as well as returned to
//! callers. [`AgentError`] covers everything else that can go wrong while
//! operating on a single agent.

use serde::{Deserialize, Serialize};

use civitas_types::{ActionKind, AgentId};

/// Why an action request was rejected or an in-flight action failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionError {
    /// The agent is already moving or acting.
    #[error("busy with {current}")]
    Busy {
        /// The action currently in progress.
        current: ActionKind,
    },

    /// The post-action cooldown has not elapsed yet.
    #[error("cooling down for another {remaining_ms} ms")]
    Cooldown {
        /// Milliseconds until the agent may act again.
        remaining_ms: u64,
    },

    /// An action lock is active.
    #[error("locked ({reason}) until {until_ms}")]
    Locked {
        /// Why the lock was taken.
        reason: String,
        /// Sim time at which the lock expires.
        until_ms: u64,
    },

    /// No open building with room could serve the action.
    #[error("no suitable building for {action}")]
    NoSuitableTarget {
        /// The action that needed a building.
        action: ActionKind,
    },

    /// A move or action ran past its ceiling.
    #[error("{action} timed out after {elapsed_ms} ms (limit {limit_ms} ms)")]
    ExecutionTimeout {
        /// The action that timed out.
        action: ActionKind,
        /// How long it had been running.
        elapsed_ms: u64,
        /// The ceiling it exceeded.
        limit_ms: u64,
    },

    /// The action failed for any other reason.
    #[error("{action} failed: {reason}")]
    ExecutionError {
        /// The action that failed.
        action: ActionKind,
        /// What went wrong.
        reason: String,
    },
}

impl ActionError {
    /// Whether this is an expected rejection of a request rather than the
    /// failure of an in-flight action.
    ///
    /// Blocked requests leave the state machine untouched and are not
    /// recorded in the failure history.
    pub const fn is_blocked(&self) -> bool {
        matches!(
            self,
            Self::Busy { .. } | Self::Cooldown { .. } | Self::Locked { .. }
        )
    }
}

/// Errors that can occur during agent operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The action state machine rejected a request.
    #[error("action rejected: {source}")]
    Action {
        /// The underlying rejection.
        #[from]
        source: ActionError,
    },

    /// A decision was attempted before the think cooldown elapsed.
    #[error("think cooldown: {remaining_ms} ms remaining")]
    ThinkCooldown {
        /// Milliseconds until the agent may decide again.
        remaining_ms: u64,
    },

    /// Agent with the given ID was not found.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// Agent name already exists in the population.
    #[error("duplicate agent name: {0}")]
    DuplicateName(String),

    /// A snapshot belongs to a different agent.
    #[error("snapshot for {found} cannot restore agent {expected}")]
    SnapshotMismatch {
        /// The agent being restored.
        expected: AgentId,
        /// The agent the snapshot was taken from.
        found: AgentId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_variants_are_classified() {
        assert!(ActionError::Busy { current: ActionKind::Work }.is_blocked());
        assert!(ActionError::Cooldown { remaining_ms: 10 }.is_blocked());
        assert!(
            !ActionError::NoSuitableTarget {
                action: ActionKind::Eat
            }
            .is_blocked()
        );
    }

    #[test]
    fn action_error_converts_into_agent_error() {
        let err: AgentError = ActionError::Cooldown { remaining_ms: 5 }.into();
        assert!(err.to_string().contains("cooling down"));
    }
}
