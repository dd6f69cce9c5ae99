//! Shared helpers for engine integration tests.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use meld_engine::{Environment, EnvironmentBuilder, EnvironmentRegistry};
use meld_native::MockNative;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
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

/// Mock native layer plus a private registry
pub struct Fixture {
    pub mock: MockNative,
    pub registry: Arc<EnvironmentRegistry>,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();
        Self {
            mock: MockNative::new(),
            registry: Arc::new(EnvironmentRegistry::new()),
        }
    }

    /// Builder wired to this fixture's mock and registry
    pub fn builder(&self) -> EnvironmentBuilder {
        EnvironmentBuilder::new(Arc::new(self.mock.clone()))
            .instance_name("engine-tests")
            .registry(Arc::clone(&self.registry))
    }

    pub fn build(&self) -> Arc<Environment> {
        self.builder().build().unwrap()
    }

    /// Calls to `<module>.destroy`, in order
    pub fn destroy_calls(&self) -> Vec<String> {
        self.mock
            .history()
            .into_iter()
            .filter(|call| call.ends_with(".destroy"))
            .collect()
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
