//! Provider rotation.
//!
//! The pool keeps the configured providers in order and tracks consecutive
//! failures for each. After `max_failures` in a row the pool moves to the
//! next provider still below the limit. A provider that rejects its key is
//! disabled for the rest of the run.

use tracing::{info, warn};

use crate::config::{ProviderConfig, ProviderKind};
use crate::llm::{LlmBackend, create_backend};

struct Slot {
    backend: LlmBackend,
    failures: u32,
    disabled: bool,
}

/// Ordered set of providers with failover.
pub struct ProviderPool {
    slots: Vec<Slot>,
    current: usize,
    max_failures: u32,
}

impl ProviderPool {
    /// Build a pool from resolved provider configs, first one active.
    pub fn new(configs: &[ProviderConfig], max_failures: u32) -> Self {
        Self {
            slots: configs
                .iter()
                .map(|config| Slot {
                    backend: create_backend(config),
                    failures: 0,
                    disabled: false,
                })
                .collect(),
            current: 0,
            max_failures: max_failures.max(1),
        }
    }

    /// The active backend, or `None` if every provider is disabled.
    pub fn current(&self) -> Option<&LlmBackend> {
        self.slots
            .get(self.current)
            .filter(|slot| !slot.disabled)
            .map(|slot| &slot.backend)
    }

    /// Which provider is active.
    pub fn current_kind(&self) -> Option<ProviderKind> {
        self.current().map(LlmBackend::provider)
    }

    /// Number of providers not disabled.
    pub fn usable(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.disabled).count()
    }

    /// A call on the active provider succeeded.
    pub fn record_success(&mut self) {
        if let Some(slot) = self.slots.get_mut(self.current) {
            slot.failures = 0;
        }
    }

    /// A call on the active provider failed. Returns `true` if the pool
    /// moved to another provider.
    pub fn record_failure(&mut self) -> bool {
        let Some(slot) = self.slots.get_mut(self.current) else {
            return false;
        };
        slot.failures = slot.failures.saturating_add(1);
        if slot.failures < self.max_failures {
            return false;
        }
        self.switch()
    }

    /// The active provider rejected its key. Disable it and move on.
    pub fn disable_current(&mut self) -> bool {
        let Some(slot) = self.slots.get_mut(self.current) else {
            return false;
        };
        slot.disabled = true;
        warn!(provider = %slot.backend.provider(), "Provider disabled");
        self.switch()
    }

    /// Move to the next enabled provider below the failure limit. When
    /// every enabled provider is at the limit, their counts start over.
    fn switch(&mut self) -> bool {
        let len = self.slots.len();
        let max = self.max_failures;
        let next = (1..=len)
            .filter_map(|step| self.current.checked_add(step)?.checked_rem(len))
            .find(|&index| {
                self.slots
                    .get(index)
                    .is_some_and(|slot| !slot.disabled && slot.failures < max)
            });

        let next = match next {
            Some(index) => index,
            None => {
                for slot in self.slots.iter_mut().filter(|slot| !slot.disabled) {
                    slot.failures = 0;
                }
                let Some(index) = (1..=len)
                    .filter_map(|step| self.current.checked_add(step)?.checked_rem(len))
                    .find(|&index| self.slots.get(index).is_some_and(|slot| !slot.disabled))
                else {
                    return false;
                };
                warn!("Every provider failed repeatedly, starting over");
                index
            }
        };

        let changed = next != self.current;
        self.current = next;
        if changed {
            if let Some(kind) = self.current_kind() {
                info!(provider = %kind, "Switched oracle provider");
            }
        }
        changed
    }
}
