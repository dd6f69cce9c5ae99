//! Repository diagnostics facet

use super::{open_configured, FacetCore};
use crate::environment::Environment;
use crate::translate::{check, check_reply};
use meld_core::{ConfigId, FacetKind, MeldResult};
use meld_native::{NativeConfigured, NativeDiagnostic};
use std::fmt;
use std::sync::Arc;

/// Repository inspection and maintenance
pub struct DiagnosticFacet {
    core: FacetCore,
    native: Arc<dyn NativeDiagnostic>,
}

impl fmt::Debug for DiagnosticFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticFacet").finish_non_exhaustive()
    }
}

impl DiagnosticFacet {
    pub(crate) fn open(environment: &Environment) -> MeldResult<Arc<Self>> {
        let native = environment.native_layer().diagnostic();
        open_configured(environment, FacetKind::Diagnostic, &*native)?;
        Ok(Arc::new(Self {
            core: FacetCore::new(FacetKind::Diagnostic, environment),
            native,
        }))
    }

    pub(crate) fn teardown(&self, environment: &Environment) -> MeldResult<()> {
        self.core.teardown(environment, &*self.native)
    }

    pub(crate) fn reinit(&self, config_id: ConfigId) -> MeldResult<()> {
        self.core
            .execute(|| check(&*self.native, self.native.reinit(config_id)))
    }

    /// Data store description
    pub fn get_repository_info(&self) -> MeldResult<String> {
        self.core
            .execute(|| check_reply(&*self.native, self.native.get_repository_info()))
    }

    /// Run an insert benchmark against the repository for `seconds`
    pub fn check_repository_performance(&self, seconds: i64) -> MeldResult<String> {
        self.core.execute(|| {
            let reply = self.native.check_repository_performance(seconds);
            check_reply(&*self.native, reply)
        })
    }

    /// Feature description by id
    pub fn get_feature(&self, feature_id: i64) -> MeldResult<String> {
        self.core
            .execute(|| check_reply(&*self.native, self.native.get_feature(feature_id)))
    }

    /// Remove every record. Irreversible.
    pub fn purge_repository(&self) -> MeldResult<()> {
        self.core
            .execute(|| check(&*self.native, self.native.purge_repository()))
    }

    /// Switch the environment to another configuration.
    ///
    /// Same as [`Environment::reinitialize`] on the owning environment.
    pub fn reinitialize(&self, config_id: ConfigId) -> MeldResult<()> {
        self.core.environment()?.reinitialize(config_id)
    }
}
