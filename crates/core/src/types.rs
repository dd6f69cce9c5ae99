//! Core types for meld
//!
//! This module defines the foundational types:
//! - ConfigId: Identifier of a registered engine configuration
//! - LifecycleState: Environment state machine
//! - FacetKind: The native sub-modules an environment can open

use std::fmt;

/// Identifier of a configuration registered with the native layer
pub type ConfigId = i64;

/// Lifecycle state of an environment
///
/// Transitions are monotonic: `Active → Destroying → Destroyed`. A state
/// never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifecycleState {
    /// Accepting guarded calls
    Active,
    /// Teardown started; no new guarded call may begin
    Destroying,
    /// All facets released; the environment is inert
    Destroyed,
}

impl LifecycleState {
    /// Check whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        matches!(
            (self, next),
            (LifecycleState::Active, LifecycleState::Destroying)
                | (LifecycleState::Destroying, LifecycleState::Destroyed)
        )
    }

    /// True only for `Active`
    pub fn is_active(self) -> bool {
        self == LifecycleState::Active
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Active => write!(f, "active"),
            LifecycleState::Destroying => write!(f, "destroying"),
            LifecycleState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Functional facet of the native engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetKind {
    /// Resolution engine (records, entities, analysis)
    Engine,
    /// Repository diagnostics
    Diagnostic,
    /// Configuration registry management
    ConfigManager,
    /// Product version and license information
    Product,
}

impl FacetKind {
    /// Dependency order: each facet may rely on those before it.
    pub const DEPENDENCY_ORDER: [FacetKind; 4] = [
        FacetKind::Product,
        FacetKind::ConfigManager,
        FacetKind::Diagnostic,
        FacetKind::Engine,
    ];

    /// Teardown order, the reverse of [`FacetKind::DEPENDENCY_ORDER`].
    pub const TEARDOWN_ORDER: [FacetKind; 4] = [
        FacetKind::Engine,
        FacetKind::Diagnostic,
        FacetKind::ConfigManager,
        FacetKind::Product,
    ];

    /// Whether the facet initializes against the active configuration id
    pub fn is_config_sensitive(self) -> bool {
        matches!(self, FacetKind::Engine | FacetKind::Diagnostic)
    }

    /// Short name used in logs
    pub fn name(self) -> &'static str {
        match self {
            FacetKind::Engine => "engine",
            FacetKind::Diagnostic => "diagnostic",
            FacetKind::ConfigManager => "config_manager",
            FacetKind::Product => "product",
        }
    }
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
