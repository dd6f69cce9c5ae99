//! The native environment: lifecycle, call guard and facets
//!
//! An [`Environment`] is the single live connection to the native engine.
//! It moves through `Active → Destroying → Destroyed` and never back.
//!
//! # Guarded calls
//!
//! Every native call runs through [`Environment::execute`], which holds the
//! call gate in shared mode and counts the call as in flight. Teardown
//! flips the state to `Destroying` first, so no new call can start, then
//! takes the gate exclusively, which it only gets once every earlier call
//! has finished.
//!
//! # Lock order
//!
//! gate token → facet construction lock → monitor. The registry lock may
//! be held while reading the monitor; the monitor is never held while
//! taking the registry lock.

mod builder;
mod config;
mod registry;

pub use builder::{EnvironmentBuilder, DEFAULT_INSTANCE_NAME, DEFAULT_SETTINGS};
pub use config::{EnvironmentConfig, NativeSettings, CONFIG_FILE_NAME};
pub use registry::{active_environment, EnvironmentRegistry, SLOT_WAIT_INTERVAL};

use crate::facets::{ConfigManagerFacet, DiagnosticFacet, EngineFacet, FacetSlot, ProductFacet};
use crate::gate::CallGate;
use meld_core::{
    BoxError, ConfigId, FacetKind, FlagGroup, Flags, LifecycleState, MeldError, MeldResult,
};
use meld_native::NativeLayer;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// State guarded by the monitor
#[derive(Debug)]
struct Monitor {
    state: LifecycleState,
    in_flight: usize,
    config_id: Option<ConfigId>,
}

/// Live connection to the native engine.
///
/// Built with [`EnvironmentBuilder`] and always handled as
/// `Arc<Environment>`.
pub struct Environment {
    instance_name: String,
    settings: String,
    verbose: bool,
    flag_overrides: HashMap<FlagGroup, Flags>,

    /// Lifecycle state, in-flight count and configuration id
    monitor: Mutex<Monitor>,
    /// Notified on every state change and in-flight decrement
    state_changed: Condvar,

    gate: CallGate,
    construction: Mutex<()>,

    engine: FacetSlot<EngineFacet>,
    diagnostic: FacetSlot<DiagnosticFacet>,
    config_manager: FacetSlot<ConfigManagerFacet>,
    product: FacetSlot<ProductFacet>,

    native: Arc<dyn NativeLayer>,
    registry: Arc<EnvironmentRegistry>,
    this: Weak<Environment>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("instance_name", &self.instance_name)
            .field("verbose", &self.verbose)
            .field("monitor", &*self.monitor.lock())
            .finish_non_exhaustive()
    }
}

impl Environment {
    /// Builder for a new environment
    pub fn builder(native: Arc<dyn NativeLayer>) -> EnvironmentBuilder {
        EnvironmentBuilder::new(native)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Instance name handed to the native layer
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Settings document handed to the native layer
    pub fn settings(&self) -> &str {
        &self.settings
    }

    /// Whether per-call debug events are emitted
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.monitor.lock().state
    }

    /// True while the environment accepts guarded calls
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Number of guarded calls currently running
    pub fn in_flight(&self) -> usize {
        self.monitor.lock().in_flight
    }

    /// Explicit configuration id, if one was given or set by
    /// [`Environment::reinitialize`]
    pub fn config_id(&self) -> Option<ConfigId> {
        self.monitor.lock().config_id
    }

    /// Flags used by operations of `group` when called without flags
    pub fn default_flags(&self, group: FlagGroup) -> Flags {
        self.flag_overrides
            .get(&group)
            .copied()
            .unwrap_or_else(|| group.default_flags())
    }

    pub(crate) fn native_layer(&self) -> &Arc<dyn NativeLayer> {
        &self.native
    }

    pub(crate) fn downgrade(&self) -> Weak<Environment> {
        self.this.clone()
    }

    fn ensure_active(&self) -> MeldResult<()> {
        let state = self.state();
        if state.is_active() {
            Ok(())
        } else {
            debug!(
                target: "meld::guard",
                instance = %self.instance_name,
                state = %state,
                "rejected: environment not active"
            );
            Err(MeldError::usage("environment destroyed"))
        }
    }

    // ========================================================================
    // Guarded execution
    // ========================================================================

    /// Run `task` as a guarded native call.
    ///
    /// The call holds the gate in shared mode (re-entering if this thread
    /// already holds it) and counts as in flight until it returns. Errors
    /// that are already a [`MeldError`] propagate unchanged; any other
    /// error becomes [`MeldError::Generic`] with the original as source. A
    /// panic becomes [`MeldError::Generic`] carrying the panic message.
    ///
    /// # Errors
    ///
    /// `MeldError::Usage` when the environment is no longer active; the
    /// task is not run.
    pub fn execute<T, E, F>(&self, task: F) -> MeldResult<T>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<BoxError>,
    {
        let _token = self.gate.shared();
        {
            let mut monitor = self.monitor.lock();
            if !monitor.state.is_active() {
                debug!(
                    target: "meld::guard",
                    instance = %self.instance_name,
                    state = %monitor.state,
                    "rejected guarded call"
                );
                return Err(MeldError::usage("environment destroyed"));
            }
            monitor.in_flight += 1;
        }
        // Declared after the token so the count drops before the gate is released
        let _in_flight = InFlight { environment: self };

        if self.verbose {
            debug!(target: "meld::guard", instance = %self.instance_name, "guarded call started");
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(task));

        if self.verbose {
            debug!(target: "meld::guard", instance = %self.instance_name, "guarded call finished");
        }

        typed_outcome(outcome)
    }

    /// Guarded call for native teardown.
    ///
    /// Runs while the environment is `Destroying`, under the exclusive
    /// token held by [`Environment::destroy`], so it skips the Active
    /// check. Errors and panics are typed the same way as in
    /// [`Environment::execute`].
    pub(crate) fn execute_teardown<T, E, F>(&self, task: F) -> MeldResult<T>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<BoxError>,
    {
        debug_assert_eq!(self.state(), LifecycleState::Destroying);
        self.monitor.lock().in_flight += 1;
        let _in_flight = InFlight { environment: self };

        typed_outcome(panic::catch_unwind(AssertUnwindSafe(task)))
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Destroy the environment.
    ///
    /// Waits for every in-flight guarded call, tears down the created
    /// facets in [`FacetKind::TEARDOWN_ORDER`] and releases the registry
    /// slot. Calling it again, or concurrently, is a no-op returning
    /// `Ok(())`.
    ///
    /// # Errors
    ///
    /// - `MeldError::Usage` when called from inside a guarded call.
    /// - The first native teardown failure. Teardown still completes and
    ///   the environment still ends `Destroyed`.
    ///
    /// # Panics
    ///
    /// If guarded calls are still counted as in flight once exclusive
    /// access has been acquired.
    pub fn destroy(&self) -> MeldResult<()> {
        if self.gate.held_by_current_thread() {
            return Err(MeldError::usage(
                "cannot destroy the environment from inside a guarded call",
            ));
        }

        {
            let mut monitor = self.monitor.lock();
            if !monitor.state.is_active() {
                debug!(
                    target: "meld::lifecycle",
                    instance = %self.instance_name,
                    state = %monitor.state,
                    "destroy ignored"
                );
                return Ok(());
            }
            monitor.state = LifecycleState::Destroying;
            self.state_changed.notify_all();
        }
        info!(target: "meld::lifecycle", instance = %self.instance_name, "destroying environment");

        let _exclusive = self.gate.exclusive()?;
        let in_flight = self.in_flight();
        assert_eq!(
            in_flight, 0,
            "guarded calls still in flight after teardown acquired exclusive access"
        );

        let mut first_error = None;
        for kind in FacetKind::TEARDOWN_ORDER {
            if let Err(e) = self.teardown_facet(kind) {
                first_error.get_or_insert(e);
            }
        }

        {
            let mut monitor = self.monitor.lock();
            monitor.state = LifecycleState::Destroyed;
            self.state_changed.notify_all();
        }
        self.registry.release(self);

        match first_error {
            None => {
                info!(target: "meld::lifecycle", instance = %self.instance_name, "environment destroyed");
                Ok(())
            }
            Some(e) => {
                warn!(
                    target: "meld::lifecycle",
                    instance = %self.instance_name,
                    error = %e,
                    "environment destroyed with teardown failures"
                );
                Err(e)
            }
        }
    }

    /// Block until the environment is `Destroyed` or `timeout` elapses.
    ///
    /// Useful after a `destroy` that returned early because another thread
    /// is already tearing down. Returns whether the environment is
    /// destroyed.
    pub fn wait_destroyed(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut monitor = self.monitor.lock();
        while monitor.state != LifecycleState::Destroyed {
            if self
                .state_changed
                .wait_until(&mut monitor, deadline)
                .timed_out()
            {
                return monitor.state == LifecycleState::Destroyed;
            }
        }
        true
    }

    fn teardown_facet(&self, kind: FacetKind) -> MeldResult<()> {
        let result = match kind {
            FacetKind::Engine => self.engine.take().map(|f| f.teardown(self)),
            FacetKind::Diagnostic => self.diagnostic.take().map(|f| f.teardown(self)),
            FacetKind::ConfigManager => self.config_manager.take().map(|f| f.teardown(self)),
            FacetKind::Product => self.product.take().map(|f| f.teardown(self)),
        };
        result.unwrap_or(Ok(()))
    }

    // ========================================================================
    // Facets
    // ========================================================================

    /// Resolution engine facet, created on first access
    pub fn engine(&self) -> MeldResult<Arc<EngineFacet>> {
        self.facet(&self.engine, FacetKind::Engine, EngineFacet::open)
    }

    /// Diagnostics facet, created on first access
    pub fn diagnostic(&self) -> MeldResult<Arc<DiagnosticFacet>> {
        self.facet(&self.diagnostic, FacetKind::Diagnostic, DiagnosticFacet::open)
    }

    /// Configuration registry facet, created on first access
    pub fn config_manager(&self) -> MeldResult<Arc<ConfigManagerFacet>> {
        self.facet(
            &self.config_manager,
            FacetKind::ConfigManager,
            ConfigManagerFacet::open,
        )
    }

    /// Product information facet, created on first access
    pub fn product(&self) -> MeldResult<Arc<ProductFacet>> {
        self.facet(&self.product, FacetKind::Product, ProductFacet::open)
    }

    /// Whether the facet of `kind` has been created and not torn down
    pub fn facet_created(&self, kind: FacetKind) -> MeldResult<bool> {
        self.ensure_active()?;
        Ok(match kind {
            FacetKind::Engine => self.engine.is_set(),
            FacetKind::Diagnostic => self.diagnostic.is_set(),
            FacetKind::ConfigManager => self.config_manager.is_set(),
            FacetKind::Product => self.product.is_set(),
        })
    }

    fn facet<F>(
        &self,
        slot: &FacetSlot<F>,
        kind: FacetKind,
        open: impl FnOnce(&Environment) -> MeldResult<Arc<F>>,
    ) -> MeldResult<Arc<F>> {
        self.ensure_active()?;
        if let Some(facet) = slot.get() {
            return Ok(facet);
        }

        let _token = self.gate.shared();
        let _construction = self.construction.lock();
        self.ensure_active()?;
        if let Some(facet) = slot.get() {
            return Ok(facet);
        }

        debug!(target: "meld::facet", facet = %kind, "creating facet");
        let facet = open(self)?;
        slot.set(Arc::clone(&facet));
        Ok(facet)
    }

    // ========================================================================
    // Reconfiguration
    // ========================================================================

    /// Switch the environment to another configuration id.
    ///
    /// The id is recorded first, so facets created later initialize with
    /// it. Then the engine facet is reinitialized if it exists, else the
    /// diagnostic facet if it exists, else the engine facet is created so
    /// the id is validated right away. Only one facet is touched.
    ///
    /// # Errors
    ///
    /// - `MeldError::Usage` when the environment is not active or the
    ///   calling thread is inside a guarded call.
    /// - The native failure, typically `MeldError::Configuration` for an
    ///   unknown id. The id stays recorded.
    pub fn reinitialize(&self, config_id: ConfigId) -> MeldResult<()> {
        let _exclusive = self.gate.exclusive()?;
        {
            let mut monitor = self.monitor.lock();
            if !monitor.state.is_active() {
                return Err(MeldError::usage("environment destroyed"));
            }
            monitor.config_id = Some(config_id);
        }
        info!(
            target: "meld::facet",
            instance = %self.instance_name,
            config_id,
            "reinitializing environment"
        );

        let result = if let Some(engine) = self.engine.get() {
            engine.reinit(config_id)
        } else if let Some(diagnostic) = self.diagnostic.get() {
            diagnostic.reinit(config_id)
        } else {
            self.engine().map(|_| ())
        };

        if let Err(e) = &result {
            warn!(target: "meld::facet", config_id, error = %e, "reinitialize failed");
        }
        result
    }
}

/// Decrements the in-flight count on every exit path of a guarded call
struct InFlight<'a> {
    environment: &'a Environment,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut monitor = self.environment.monitor.lock();
        monitor.in_flight = monitor.in_flight.saturating_sub(1);
        self.environment.state_changed.notify_all();
    }
}

fn typed_outcome<T, E>(outcome: std::thread::Result<Result<T, E>>) -> MeldResult<T>
where
    E: Into<BoxError>,
{
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(MeldError::from_boxed(error.into())),
        Err(payload) => Err(MeldError::generic(format!(
            "guarded call panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
