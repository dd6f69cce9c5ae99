//! meld - Thread-safe lifecycle SDK for a native entity-resolution engine
//!
//! The native engine is a process-wide singleton reached through a
//! foreign-function boundary. meld makes it safe to share across threads:
//! at most one live environment per process, no native call after teardown
//! has begun, teardown that waits for in-flight calls, and a typed error
//! for every native failure code.
//!
//! # Quick Start
//!
//! ```ignore
//! use meld::{Environment, Flags, MockNative};
//! use std::sync::Arc;
//!
//! let env = Environment::builder(Arc::new(MockNative::new()))
//!     .instance_name("loader")
//!     .build()?;
//!
//! let engine = env.engine()?;
//! let info = engine.add_record("CUSTOMERS", "1001", r#"{"NAME":"Ann"}"#, Some(Flags::WITH_INFO))?;
//!
//! env.destroy()?;
//! ```
//!
//! # Architecture
//!
//! - `meld-core`: flags, error taxonomy, lifecycle vocabulary
//! - `meld-native`: traits for the native modules, plus an in-memory mock
//! - `meld-engine`: environment, call gate, guarded execution, facets

pub use meld_core::{
    codes, error_for_code, kind_for_code, BoxError, ConfigId, ErrorKind, FacetKind, FlagGroup,
    Flags, LifecycleState, MeldError, MeldResult,
};
pub use meld_engine::{
    active_environment, ConfigManagerFacet, DiagnosticFacet, EngineFacet, Environment,
    EnvironmentBuilder, EnvironmentConfig, EnvironmentRegistry, NativeSettings, ProductFacet,
    CONFIG_FILE_NAME,
};
pub use meld_native::{MockNative, NativeLayer};
