//! Product information facet

use super::{open_plain, FacetCore};
use crate::environment::Environment;
use crate::translate::check_reply;
use meld_core::{FacetKind, MeldResult};
use meld_native::NativeProduct;
use std::fmt;
use std::sync::Arc;

/// Version and license of the native engine
pub struct ProductFacet {
    core: FacetCore,
    native: Arc<dyn NativeProduct>,
}

impl fmt::Debug for ProductFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductFacet").finish_non_exhaustive()
    }
}

impl ProductFacet {
    pub(crate) fn open(environment: &Environment) -> MeldResult<Arc<Self>> {
        let native = environment.native_layer().product();
        open_plain(environment, FacetKind::Product, &*native)?;
        Ok(Arc::new(Self {
            core: FacetCore::new(FacetKind::Product, environment),
            native,
        }))
    }

    pub(crate) fn teardown(&self, environment: &Environment) -> MeldResult<()> {
        self.core.teardown(environment, &*self.native)
    }

    /// Version document
    pub fn get_version(&self) -> MeldResult<String> {
        self.core
            .execute(|| check_reply(&*self.native, self.native.get_version()))
    }

    /// License document
    pub fn get_license(&self) -> MeldResult<String> {
        self.core
            .execute(|| check_reply(&*self.native, self.native.get_license()))
    }
}
