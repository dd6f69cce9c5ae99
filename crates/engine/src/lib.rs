//! Environment lifecycle and call guard for meld
//!
//! This crate owns everything between the caller and the native layer:
//! - Environment: singleton lifecycle (build, destroy, reinitialize)
//! - CallGate: reentrant reader/writer gate behind every native call
//! - Environment::execute: the guarded call wrapper
//! - translate: native return codes to typed errors
//! - Facets: engine, diagnostic, config manager and product handles
//!
//! The engine is the only component that knows about:
//! - The registry slot and its Destroying handshake
//! - In-flight accounting and teardown ordering
//! - Which facet a reconfiguration touches

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod environment;
pub mod facets;
pub mod gate;
pub mod translate;

pub use environment::{
    active_environment, Environment, EnvironmentBuilder, EnvironmentConfig, EnvironmentRegistry,
    NativeSettings, CONFIG_FILE_NAME, SLOT_WAIT_INTERVAL,
};
pub use facets::{ConfigManagerFacet, DiagnosticFacet, EngineFacet, ProductFacet};
pub use gate::{CallGate, ExclusiveToken, GateMode, SharedToken};
