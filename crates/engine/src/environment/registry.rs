//! Environment registry for singleton management
//!
//! A registry holds at most one live environment. Building a second one
//! while the first is active fails fast; building while the first is being
//! torn down waits for teardown to finish.

use meld_core::{LifecycleState, MeldError, MeldResult};
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::Environment;

/// Periodic wake while waiting for a destroying environment to finish
pub const SLOT_WAIT_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// Global Environment Registry
// =============================================================================
//
// The native engine allows one environment per process, so the global
// registry is what every production caller shares. Tests build private
// registries with `EnvironmentRegistry::new()` so they can run in parallel.

static GLOBAL: Lazy<Arc<EnvironmentRegistry>> = Lazy::new(|| Arc::new(EnvironmentRegistry::new()));

/// Active environment of the global registry, if any.
///
/// Waits while the current environment is being destroyed.
pub fn active_environment() -> Option<Arc<Environment>> {
    EnvironmentRegistry::global().active()
}

type Slot = Option<Arc<Environment>>;

/// Single-occupant slot for an [`Environment`].
#[derive(Debug, Default)]
pub struct EnvironmentRegistry {
    slot: Mutex<Slot>,
    slot_changed: Condvar,
}

impl EnvironmentRegistry {
    /// Empty private registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry
    pub fn global() -> Arc<EnvironmentRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// The active environment, or `None`.
    ///
    /// Blocks while the occupant is destroying; a destroyed occupant is
    /// dropped from the slot.
    pub fn active(&self) -> Option<Arc<Environment>> {
        let mut slot = self.slot.lock();
        self.settle(&mut slot);
        slot.clone()
    }

    /// Claim the slot for a newly built environment.
    pub(crate) fn claim(
        &self,
        build: impl FnOnce() -> Arc<Environment>,
    ) -> MeldResult<Arc<Environment>> {
        let mut slot = self.slot.lock();
        self.settle(&mut slot);
        if let Some(existing) = slot.as_ref() {
            return Err(MeldError::usage(format!(
                "environment already initialized (instance '{}')",
                existing.instance_name()
            )));
        }
        let environment = build();
        *slot = Some(Arc::clone(&environment));
        Ok(environment)
    }

    /// Release the slot if `environment` occupies it and wake waiters.
    pub(crate) fn release(&self, environment: &Environment) {
        let mut slot = self.slot.lock();
        let occupied_by = slot
            .as_ref()
            .is_some_and(|occupant| std::ptr::eq(Arc::as_ptr(occupant), environment));
        if occupied_by {
            *slot = None;
        }
        self.slot_changed.notify_all();
    }

    fn settle(&self, slot: &mut MutexGuard<'_, Slot>) {
        loop {
            let state = match slot.as_ref() {
                Some(occupant) => occupant.state(),
                None => return,
            };
            match state {
                LifecycleState::Active => return,
                LifecycleState::Destroyed => {
                    **slot = None;
                    return;
                }
                LifecycleState::Destroying => {
                    debug!(target: "meld::lifecycle", "waiting for environment teardown");
                    self.slot_changed.wait_for(slot, SLOT_WAIT_INTERVAL);
                }
            }
        }
    }
}
