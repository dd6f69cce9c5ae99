//! Configuration registry facet

use super::{open_plain, FacetCore};
use crate::environment::Environment;
use crate::translate::{check, check_reply};
use meld_core::{ConfigId, FacetKind, MeldResult};
use meld_native::NativeConfigManager;
use std::fmt;
use std::sync::Arc;

/// Registration and selection of engine configurations.
pub struct ConfigManagerFacet {
    core: FacetCore,
    native: Arc<dyn NativeConfigManager>,
}

impl fmt::Debug for ConfigManagerFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigManagerFacet").finish_non_exhaustive()
    }
}

impl ConfigManagerFacet {
    pub(crate) fn open(environment: &Environment) -> MeldResult<Arc<Self>> {
        let native = environment.native_layer().config_manager();
        open_plain(environment, FacetKind::ConfigManager, &*native)?;
        Ok(Arc::new(Self {
            core: FacetCore::new(FacetKind::ConfigManager, environment),
            native,
        }))
    }

    pub(crate) fn teardown(&self, environment: &Environment) -> MeldResult<()> {
        self.core.teardown(environment, &*self.native)
    }

    /// Store a configuration document and return its new id
    pub fn register_config(&self, config: &str, comment: &str) -> MeldResult<ConfigId> {
        self.core.execute(|| {
            let reply = self.native.register_config(config, comment);
            check_reply(&*self.native, reply)
        })
    }

    /// Registered configuration document
    pub fn get_config(&self, config_id: ConfigId) -> MeldResult<String> {
        self.core
            .execute(|| check_reply(&*self.native, self.native.get_config(config_id)))
    }

    /// List of registered configurations
    pub fn get_config_registry(&self) -> MeldResult<String> {
        self.core
            .execute(|| check_reply(&*self.native, self.native.get_config_registry()))
    }

    /// Current default configuration id; zero when none is set
    pub fn get_default_config_id(&self) -> MeldResult<ConfigId> {
        self.core
            .execute(|| check_reply(&*self.native, self.native.get_default_config_id()))
    }

    /// Unconditionally make `config_id` the default
    pub fn set_default_config_id(&self, config_id: ConfigId) -> MeldResult<()> {
        self.core.execute(|| {
            check(
                &*self.native,
                self.native.set_default_config_id(config_id),
            )
        })
    }

    /// Make `new` the default only if the default is still `current`.
    ///
    /// Fails with `MeldError::ReplaceConflict` when another writer changed
    /// the default in the meantime. Nothing is retried here; callers that
    /// want the swap to win re-read the default and try again:
    ///
    /// ```ignore
    /// loop {
    ///     let current = manager.get_default_config_id()?;
    ///     match manager.replace_default_config_id(current, new_id) {
    ///         Err(MeldError::ReplaceConflict { .. }) => continue,
    ///         other => break other,
    ///     }
    /// }
    /// ```
    pub fn replace_default_config_id(&self, current: ConfigId, new: ConfigId) -> MeldResult<()> {
        self.core.execute(|| {
            check(
                &*self.native,
                self.native.replace_default_config_id(current, new),
            )
        })
    }

    /// Register a configuration and make it the default, returning its id
    pub fn set_default_config(&self, config: &str, comment: &str) -> MeldResult<ConfigId> {
        self.core.execute(|| {
            let config_id = check_reply(&*self.native, self.native.register_config(config, comment))?;
            check(
                &*self.native,
                self.native.set_default_config_id(config_id),
            )?;
            Ok(config_id)
        })
    }
}
