//! Resolution engine facet

use super::{open_configured, FacetCore};
use crate::environment::Environment;
use crate::translate::{check, check_reply};
use meld_core::{ConfigId, FacetKind, FlagGroup, Flags, MeldResult};
use meld_native::{NativeConfigured, NativeEngine};
use std::fmt;
use std::sync::Arc;

/// Records, entities and analysis.
///
/// Mutating operations return the change-summary document only when the
/// flags include [`Flags::WITH_INFO`]; otherwise they return `None`.
pub struct EngineFacet {
    core: FacetCore,
    native: Arc<dyn NativeEngine>,
}

impl fmt::Debug for EngineFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineFacet").finish_non_exhaustive()
    }
}

impl EngineFacet {
    pub(crate) fn open(environment: &Environment) -> MeldResult<Arc<Self>> {
        let native = environment.native_layer().engine();
        open_configured(environment, FacetKind::Engine, &*native)?;
        Ok(Arc::new(Self {
            core: FacetCore::new(FacetKind::Engine, environment),
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

    // ========================================================================
    // Record operations
    // ========================================================================

    /// Load a record, replacing any record with the same id.
    pub fn add_record(
        &self,
        data_source: &str,
        record_id: &str,
        record: &str,
        flags: Option<Flags>,
    ) -> MeldResult<Option<String>> {
        let flags = self.core.flags(FlagGroup::RecordModify, flags);
        self.core.execute(|| {
            if flags.wants_info() {
                let reply = self.native.add_record_with_info(
                    data_source,
                    record_id,
                    record,
                    flags.downstream(),
                );
                check_reply(&*self.native, reply).map(Some)
            } else {
                let rc = self
                    .native
                    .add_record(data_source, record_id, record, flags.downstream());
                check(&*self.native, rc).map(|_| None)
            }
        })
    }

    /// Delete a record. Deleting an absent record is not an error.
    pub fn delete_record(
        &self,
        data_source: &str,
        record_id: &str,
        flags: Option<Flags>,
    ) -> MeldResult<Option<String>> {
        let flags = self.core.flags(FlagGroup::RecordModify, flags);
        self.core.execute(|| {
            if flags.wants_info() {
                let reply =
                    self.native
                        .delete_record_with_info(data_source, record_id, flags.downstream());
                check_reply(&*self.native, reply).map(Some)
            } else {
                let rc = self
                    .native
                    .delete_record(data_source, record_id, flags.downstream());
                check(&*self.native, rc).map(|_| None)
            }
        })
    }

    /// Re-resolve an entity against the current configuration.
    pub fn reevaluate_entity(
        &self,
        entity_id: i64,
        flags: Option<Flags>,
    ) -> MeldResult<Option<String>> {
        let flags = self.core.flags(FlagGroup::RecordModify, flags);
        self.core.execute(|| {
            if flags.wants_info() {
                let reply = self
                    .native
                    .reevaluate_entity_with_info(entity_id, flags.downstream());
                check_reply(&*self.native, reply).map(Some)
            } else {
                let rc = self.native.reevaluate_entity(entity_id, flags.downstream());
                check(&*self.native, rc).map(|_| None)
            }
        })
    }

    // ========================================================================
    // Retrieval
    // ========================================================================

    /// Resolved entity by entity id
    pub fn get_entity_by_entity_id(
        &self,
        entity_id: i64,
        flags: Option<Flags>,
    ) -> MeldResult<String> {
        let flags = self.core.flags(FlagGroup::EntityGet, flags);
        self.core.execute(|| {
            let reply = self
                .native
                .get_entity_by_entity_id(entity_id, flags.downstream());
            check_reply(&*self.native, reply)
        })
    }

    /// Resolved entity containing the given record
    pub fn get_entity_by_record_id(
        &self,
        data_source: &str,
        record_id: &str,
        flags: Option<Flags>,
    ) -> MeldResult<String> {
        let flags = self.core.flags(FlagGroup::EntityGet, flags);
        self.core.execute(|| {
            let reply =
                self.native
                    .get_entity_by_record_id(data_source, record_id, flags.downstream());
            check_reply(&*self.native, reply)
        })
    }

    /// A single record as loaded
    pub fn get_record(
        &self,
        data_source: &str,
        record_id: &str,
        flags: Option<Flags>,
    ) -> MeldResult<String> {
        let flags = self.core.flags(FlagGroup::RecordGet, flags);
        self.core.execute(|| {
            let reply = self
                .native
                .get_record(data_source, record_id, flags.downstream());
            check_reply(&*self.native, reply)
        })
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    /// Explain why two entities did or did not resolve together
    pub fn why_entities(
        &self,
        entity_id_1: i64,
        entity_id_2: i64,
        flags: Option<Flags>,
    ) -> MeldResult<String> {
        let flags = self.core.flags(FlagGroup::WhyEntities, flags);
        self.core.execute(|| {
            let reply = self
                .native
                .why_entities(entity_id_1, entity_id_2, flags.downstream());
            check_reply(&*self.native, reply)
        })
    }

    /// Entities matching an attribute document
    pub fn search_by_attributes(
        &self,
        attributes: &str,
        flags: Option<Flags>,
    ) -> MeldResult<String> {
        let flags = self.core.flags(FlagGroup::Search, flags);
        self.core.execute(|| {
            let reply = self
                .native
                .search_by_attributes(attributes, flags.downstream());
            check_reply(&*self.native, reply)
        })
    }

    // ========================================================================
    // Engine management
    // ========================================================================

    /// Number of redo records waiting to be processed
    pub fn count_redo_records(&self) -> MeldResult<i64> {
        self.core
            .execute(|| check_reply(&*self.native, self.native.count_redo_records()))
    }

    /// Warm up the engine's caches
    pub fn prime_engine(&self) -> MeldResult<()> {
        self.core
            .execute(|| check(&*self.native, self.native.prime_engine()))
    }

    /// Workload statistics
    pub fn get_stats(&self) -> MeldResult<String> {
        self.core
            .execute(|| check_reply(&*self.native, self.native.get_stats()))
    }

    /// Configuration id the engine currently runs with
    pub fn get_active_config_id(&self) -> MeldResult<ConfigId> {
        self.core
            .execute(|| check_reply(&*self.native, self.native.get_active_config_id()))
    }

    /// Switch the environment to another configuration.
    ///
    /// Same as [`Environment::reinitialize`] on the owning environment.
    pub fn reinitialize(&self, config_id: ConfigId) -> MeldResult<()> {
        self.core.environment()?.reinitialize(config_id)
    }
}
