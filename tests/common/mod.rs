//! Shared test utilities for the facade integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use meld::{Environment, EnvironmentBuilder, EnvironmentRegistry, MockNative};
use std::sync::{Arc, Once};
use tracing_subscriber::filter::LevelFilter;

static TRACING: Once = Once::new();

/// Route tracing output through the test harness writer
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(LevelFilter::DEBUG)
            .try_init();
    });
}

/// A mock native layer with its own registry
pub struct Harness {
    pub mock: MockNative,
    pub registry: Arc<EnvironmentRegistry>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            mock: MockNative::new(),
            registry: Arc::new(EnvironmentRegistry::new()),
        }
    }

    pub fn builder(&self, instance_name: &str) -> EnvironmentBuilder {
        Environment::builder(Arc::new(self.mock.clone()))
            .instance_name(instance_name)
            .registry(Arc::clone(&self.registry))
    }

    pub fn build(&self, instance_name: &str) -> Arc<Environment> {
        self.builder(instance_name).build().unwrap()
    }
}
