//! Native layer seam for meld
//!
//! The resolution engine is a closed-source native library. This crate
//! describes what meld needs from it as a set of traits, one per native
//! module, mirroring the foreign-function surface:
//!
//! - Every call returns a numeric return code (zero on success), either
//!   bare or inside a [`NativeReply`] together with the response payload.
//! - After a non-zero return code, the failing module's
//!   `last_exception` / `last_exception_code` describe the failure until
//!   `clear_last_exception` is called.
//! - Flags arrive as the raw `u64` the native library understands; the
//!   SDK-internal bits have already been stripped.
//!
//! A [`NativeLayer`] hands out one handle per module kind. [`mock::MockNative`]
//! implements every trait in-process for tests and local development.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod mock;

pub use mock::{InitArgs, MockNative};

use meld_core::ConfigId;
use std::sync::Arc;

/// Numeric result of a native call; zero means success
pub type ReturnCode = i64;

/// Return code used by native calls that failed
pub const NATIVE_FAILURE: ReturnCode = -2;

/// Return code of a native call plus its response payload.
///
/// The payload is meaningful only when `return_code` is zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeReply<T> {
    /// Zero on success
    pub return_code: ReturnCode,
    /// Response payload
    pub response: T,
}

impl<T> NativeReply<T> {
    /// Successful reply
    pub fn ok(response: T) -> Self {
        Self {
            return_code: 0,
            response,
        }
    }

    /// True when the return code is zero
    pub fn is_success(&self) -> bool {
        self.return_code == 0
    }
}

impl<T: Default> NativeReply<T> {
    /// Failed reply with an empty payload
    pub fn failed(return_code: ReturnCode) -> Self {
        Self {
            return_code,
            response: T::default(),
        }
    }
}

// =============================================================================
// Module traits
// =============================================================================

/// Lifecycle and error reporting shared by every native module.
pub trait NativeLifecycle: Send + Sync {
    /// Open the module with the ambient settings
    fn init(&self, instance_name: &str, settings: &str, verbose: bool) -> ReturnCode;

    /// Release the module's native resources
    fn destroy(&self) -> ReturnCode;

    /// Message of the most recent failure on this module
    fn last_exception(&self) -> String;

    /// Error code of the most recent failure, zero when none is recorded
    fn last_exception_code(&self) -> i64;

    /// Forget the most recent failure
    fn clear_last_exception(&self);
}

/// Modules that bind to a specific engine configuration.
pub trait NativeConfigured: NativeLifecycle {
    /// Open the module against an explicit configuration id
    fn init_with_config_id(
        &self,
        instance_name: &str,
        settings: &str,
        config_id: ConfigId,
        verbose: bool,
    ) -> ReturnCode;

    /// Switch an open module to another configuration id
    fn reinit(&self, config_id: ConfigId) -> ReturnCode;
}

/// Resolution engine module.
///
/// Mutating calls come in two variants; the `_with_info` one also returns
/// the change-summary document.
pub trait NativeEngine: NativeConfigured {
    /// Load or replace a record
    fn add_record(&self, data_source: &str, record_id: &str, record: &str, flags: u64)
        -> ReturnCode;

    /// Load or replace a record, returning the info document
    fn add_record_with_info(
        &self,
        data_source: &str,
        record_id: &str,
        record: &str,
        flags: u64,
    ) -> NativeReply<String>;

    /// Delete a record
    fn delete_record(&self, data_source: &str, record_id: &str, flags: u64) -> ReturnCode;

    /// Delete a record, returning the info document
    fn delete_record_with_info(
        &self,
        data_source: &str,
        record_id: &str,
        flags: u64,
    ) -> NativeReply<String>;

    /// Re-resolve an entity
    fn reevaluate_entity(&self, entity_id: i64, flags: u64) -> ReturnCode;

    /// Re-resolve an entity, returning the info document
    fn reevaluate_entity_with_info(&self, entity_id: i64, flags: u64) -> NativeReply<String>;

    /// Fetch a resolved entity by id
    fn get_entity_by_entity_id(&self, entity_id: i64, flags: u64) -> NativeReply<String>;

    /// Fetch the entity containing a record
    fn get_entity_by_record_id(
        &self,
        data_source: &str,
        record_id: &str,
        flags: u64,
    ) -> NativeReply<String>;

    /// Fetch a single record
    fn get_record(&self, data_source: &str, record_id: &str, flags: u64) -> NativeReply<String>;

    /// Explain how two entities relate
    fn why_entities(&self, entity_id_1: i64, entity_id_2: i64, flags: u64) -> NativeReply<String>;

    /// Search entities by attribute document
    fn search_by_attributes(&self, attributes: &str, flags: u64) -> NativeReply<String>;

    /// Number of pending redo records
    fn count_redo_records(&self) -> NativeReply<i64>;

    /// Warm up engine caches
    fn prime_engine(&self) -> ReturnCode;

    /// Workload statistics document
    fn get_stats(&self) -> NativeReply<String>;

    /// Configuration id the engine currently runs with
    fn get_active_config_id(&self) -> NativeReply<ConfigId>;
}

/// Repository diagnostics module.
pub trait NativeDiagnostic: NativeConfigured {
    /// Describe the repository data stores
    fn get_repository_info(&self) -> NativeReply<String>;

    /// Run an insert benchmark for the given number of seconds
    fn check_repository_performance(&self, seconds: i64) -> NativeReply<String>;

    /// Describe a feature by id
    fn get_feature(&self, feature_id: i64) -> NativeReply<String>;

    /// Remove every record from the repository
    fn purge_repository(&self) -> ReturnCode;
}

/// Configuration registry module.
pub trait NativeConfigManager: NativeLifecycle {
    /// Store a configuration document and return its id
    fn register_config(&self, config: &str, comment: &str) -> NativeReply<ConfigId>;

    /// Fetch a registered configuration document
    fn get_config(&self, config_id: ConfigId) -> NativeReply<String>;

    /// List registered configurations
    fn get_config_registry(&self) -> NativeReply<String>;

    /// Current default configuration id, zero when unset
    fn get_default_config_id(&self) -> NativeReply<ConfigId>;

    /// Unconditionally set the default configuration id
    fn set_default_config_id(&self, config_id: ConfigId) -> ReturnCode;

    /// Set the default configuration id only if it still equals `current`
    fn replace_default_config_id(&self, current: ConfigId, new: ConfigId) -> ReturnCode;
}

/// Product information module.
pub trait NativeProduct: NativeLifecycle {
    /// Version document
    fn get_version(&self) -> NativeReply<String>;

    /// License document
    fn get_license(&self) -> NativeReply<String>;
}

/// Factory for native module handles.
///
/// Each call returns a handle the caller owns until it calls `destroy`.
pub trait NativeLayer: Send + Sync {
    /// Handle to the resolution engine module
    fn engine(&self) -> Arc<dyn NativeEngine>;

    /// Handle to the diagnostics module
    fn diagnostic(&self) -> Arc<dyn NativeDiagnostic>;

    /// Handle to the configuration registry module
    fn config_manager(&self) -> Arc<dyn NativeConfigManager>;

    /// Handle to the product information module
    fn product(&self) -> Arc<dyn NativeProduct>;
}
