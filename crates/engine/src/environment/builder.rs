//! Environment builder
//!
//! ```ignore
//! use meld_engine::EnvironmentBuilder;
//! use meld_native::MockNative;
//!
//! let env = EnvironmentBuilder::new(Arc::new(MockNative::new()))
//!     .instance_name("loader")
//!     .settings(r#"{"PIPELINE":{"CONFIGPATH":"/etc/opt/engine"}}"#)
//!     .verbose_logging(true)
//!     .build()?;
//! ```

use meld_core::{ConfigId, FlagGroup, Flags, LifecycleState, MeldError, MeldResult};
use meld_native::NativeLayer;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::{Environment, EnvironmentConfig, EnvironmentRegistry, Monitor};
use crate::facets::FacetSlot;
use crate::gate::CallGate;

/// Default instance name
pub const DEFAULT_INSTANCE_NAME: &str = "meld";

/// Default native settings: an empty JSON document
pub const DEFAULT_SETTINGS: &str = "{}";

/// Builder for an [`Environment`].
///
/// Builds into the global registry unless [`registry`](Self::registry)
/// names another one.
#[derive(Clone)]
pub struct EnvironmentBuilder {
    native: Arc<dyn NativeLayer>,
    instance_name: String,
    settings: String,
    verbose: bool,
    config_id: Option<ConfigId>,
    flag_overrides: HashMap<FlagGroup, Flags>,
    registry: Option<Arc<EnvironmentRegistry>>,
}

impl fmt::Debug for EnvironmentBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentBuilder")
            .field("instance_name", &self.instance_name)
            .field("settings", &self.settings)
            .field("verbose", &self.verbose)
            .field("config_id", &self.config_id)
            .field("flag_overrides", &self.flag_overrides)
            .finish_non_exhaustive()
    }
}

impl EnvironmentBuilder {
    /// Builder with default settings over the given native layer
    pub fn new(native: Arc<dyn NativeLayer>) -> Self {
        Self {
            native,
            instance_name: DEFAULT_INSTANCE_NAME.to_string(),
            settings: DEFAULT_SETTINGS.to_string(),
            verbose: false,
            config_id: None,
            flag_overrides: HashMap::new(),
            registry: None,
        }
    }

    /// Builder initialized from a parsed `meld.toml`.
    ///
    /// # Errors
    ///
    /// `MeldError::Usage` when the settings table cannot be serialized or
    /// the default flags name an unknown family or flag.
    pub fn from_config(native: Arc<dyn NativeLayer>, config: &EnvironmentConfig) -> MeldResult<Self> {
        let mut builder = Self::new(native)
            .instance_name(config.instance_name.clone())
            .settings(config.settings.to_native_string()?)
            .verbose_logging(config.verbose_logging);
        builder.config_id = config.config_id;
        builder.flag_overrides = config.flag_overrides()?;
        Ok(builder)
    }

    /// Name the native layer reports this instance under
    pub fn instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = name.into();
        self
    }

    /// Native settings document, passed through unmodified
    pub fn settings(mut self, settings: impl Into<String>) -> Self {
        self.settings = settings.into();
        self
    }

    /// Emit a debug event for every guarded call
    pub fn verbose_logging(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Initialize the engine and diagnostic facets with this configuration
    /// id instead of the registry default
    pub fn config_id(mut self, config_id: ConfigId) -> Self {
        self.config_id = Some(config_id);
        self
    }

    /// Flags used by operations of `group` when called without flags
    pub fn default_flags(mut self, group: FlagGroup, flags: Flags) -> Self {
        self.flag_overrides.insert(group, flags);
        self
    }

    /// Build into `registry` instead of the global one
    pub fn registry(mut self, registry: Arc<EnvironmentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Create the environment and claim the registry slot.
    ///
    /// Waits while a previous environment in the same registry is being
    /// destroyed. No native module is opened until a facet is requested.
    ///
    /// # Errors
    ///
    /// `MeldError::Usage` when the instance name is empty or the registry
    /// already holds an active environment.
    pub fn build(self) -> MeldResult<Arc<Environment>> {
        if self.instance_name.trim().is_empty() {
            return Err(MeldError::usage("instance name must not be empty"));
        }

        let EnvironmentBuilder {
            native,
            instance_name,
            settings,
            verbose,
            config_id,
            flag_overrides,
            registry,
        } = self;
        let registry = registry.unwrap_or_else(EnvironmentRegistry::global);
        let slot_owner = Arc::clone(&registry);

        let environment = slot_owner.claim(move || {
            Arc::new_cyclic(|this| Environment {
                instance_name,
                settings,
                verbose,
                flag_overrides,
                monitor: Mutex::new(Monitor {
                    state: LifecycleState::Active,
                    in_flight: 0,
                    config_id,
                }),
                state_changed: Condvar::new(),
                gate: CallGate::new(),
                construction: Mutex::new(()),
                engine: FacetSlot::new(),
                diagnostic: FacetSlot::new(),
                config_manager: FacetSlot::new(),
                product: FacetSlot::new(),
                native,
                registry,
                this: this.clone(),
            })
        })?;

        info!(
            target: "meld::lifecycle",
            instance = %environment.instance_name(),
            config_id = ?environment.config_id(),
            verbose = environment.is_verbose(),
            "environment created"
        );
        Ok(environment)
    }
}
