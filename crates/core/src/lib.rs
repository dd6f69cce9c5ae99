//! Core types for meld
//!
//! This crate defines the foundational pieces shared by every layer:
//! - Flags: Capability bits and per-operation recipes
//! - FlagGroup: Operation families and their default flags
//! - MeldError: Typed error taxonomy and the native code table
//! - LifecycleState, FacetKind, ConfigId: Environment vocabulary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flags;
pub mod types;

pub use error::{codes, error_for_code, kind_for_code, BoxError, ErrorKind, MeldError, MeldResult};
pub use flags::{FlagGroup, Flags};
pub use types::{ConfigId, FacetKind, LifecycleState};
