//! Facets: lazily opened native module handles
//!
//! Each facet wraps one native module handle and is owned by an
//! [`Environment`]. Facets are created on first access, run every native
//! call through [`Environment::execute`], and are torn down by
//! [`Environment::destroy`]. A facet keeps only a weak reference to its
//! environment, so a caller holding a facet does not keep a destroyed
//! environment alive.

mod config_manager;
mod diagnostic;
mod engine;
mod product;

pub use config_manager::ConfigManagerFacet;
pub use diagnostic::DiagnosticFacet;
pub use engine::EngineFacet;
pub use product::ProductFacet;

use crate::environment::Environment;
use crate::translate;
use meld_core::{FacetKind, FlagGroup, Flags, MeldError, MeldResult};
use meld_native::{NativeConfigured, NativeLifecycle};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tracing::{info, warn};

// =============================================================================
// Slots
// =============================================================================

/// Holder for at most one facet of a kind.
pub(crate) struct FacetSlot<F> {
    inner: RwLock<Option<Arc<F>>>,
}

impl<F> FacetSlot<F> {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub(crate) fn get(&self) -> Option<Arc<F>> {
        self.inner.read().clone()
    }

    pub(crate) fn is_set(&self) -> bool {
        self.inner.read().is_some()
    }

    pub(crate) fn set(&self, facet: Arc<F>) {
        *self.inner.write() = Some(facet);
    }

    pub(crate) fn take(&self) -> Option<Arc<F>> {
        self.inner.write().take()
    }
}

// =============================================================================
// Shared facet state
// =============================================================================

/// Owning environment and destroyed flag, common to every facet.
struct FacetCore {
    kind: FacetKind,
    environment: Weak<Environment>,
    destroyed: Mutex<bool>,
}

impl FacetCore {
    fn new(kind: FacetKind, environment: &Environment) -> Self {
        Self {
            kind,
            environment: environment.downgrade(),
            destroyed: Mutex::new(false),
        }
    }

    fn environment(&self) -> MeldResult<Arc<Environment>> {
        self.environment
            .upgrade()
            .ok_or_else(|| MeldError::usage("environment destroyed"))
    }

    /// Run a native call under the environment's guard
    fn execute<T>(&self, task: impl FnOnce() -> MeldResult<T>) -> MeldResult<T> {
        if *self.destroyed.lock() {
            return Err(MeldError::usage(format!("{} facet destroyed", self.kind)));
        }
        self.environment()?.execute(task)
    }

    /// Caller's flags, else the environment's default for the family
    fn flags(&self, group: FlagGroup, flags: Option<Flags>) -> Flags {
        match flags {
            Some(flags) => flags,
            None => self
                .environment
                .upgrade()
                .map(|environment| environment.default_flags(group))
                .unwrap_or_else(|| group.default_flags()),
        }
    }

    /// Destroy the native handle once; later calls are no-ops
    fn teardown<N>(&self, environment: &Environment, native: &N) -> MeldResult<()>
    where
        N: NativeLifecycle + ?Sized,
    {
        let mut destroyed = self.destroyed.lock();
        if *destroyed {
            return Ok(());
        }
        *destroyed = true;

        let result = environment.execute_teardown(|| translate::check(native, native.destroy()));
        match &result {
            Ok(()) => info!(target: "meld::facet", facet = %self.kind, "facet destroyed"),
            Err(e) => warn!(
                target: "meld::facet",
                facet = %self.kind,
                error = %e,
                "native teardown failed"
            ),
        }
        result
    }
}

// =============================================================================
// Native initialization
// =============================================================================

/// Initialize a configuration-bound module, pinned to the environment's
/// explicit configuration id when one is set.
fn open_configured<N>(environment: &Environment, kind: FacetKind, native: &N) -> MeldResult<()>
where
    N: NativeConfigured + ?Sized,
{
    let config_id = environment.config_id();
    let result = environment.execute(|| {
        let rc = match config_id {
            Some(id) => native.init_with_config_id(
                environment.instance_name(),
                environment.settings(),
                id,
                environment.is_verbose(),
            ),
            None => native.init(
                environment.instance_name(),
                environment.settings(),
                environment.is_verbose(),
            ),
        };
        translate::check(native, rc)
    });
    log_open(kind, &result);
    result
}

/// Initialize a module with the ambient settings only
fn open_plain<N>(environment: &Environment, kind: FacetKind, native: &N) -> MeldResult<()>
where
    N: NativeLifecycle + ?Sized,
{
    let result = environment.execute(|| {
        let rc = native.init(
            environment.instance_name(),
            environment.settings(),
            environment.is_verbose(),
        );
        translate::check(native, rc)
    });
    log_open(kind, &result);
    result
}

fn log_open(kind: FacetKind, result: &MeldResult<()>) {
    match result {
        Ok(()) => info!(target: "meld::facet", facet = %kind, "facet initialized"),
        Err(e) => warn!(
            target: "meld::facet",
            facet = %kind,
            error = %e,
            "facet initialization failed"
        ),
    }
}
