//! Reconfiguration tests

mod common;

use common::Fixture;
use meld_core::{ErrorKind, FacetKind, MeldError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_engine_reinitialized_when_present() {
    let fx = Fixture::new();
    let env = fx.build();
    env.engine().unwrap();
    env.diagnostic().unwrap();
    let next = fx.mock.register_config_document(&["TEST", "WATCHLIST"], "next");

    env.reinitialize(next).unwrap();

    assert_eq!(fx.mock.reinit_calls(), vec![next]);
    assert_eq!(fx.mock.calls_to("engine.reinit"), 1);
    assert_eq!(fx.mock.calls_to("diagnostic.reinit"), 0);
    assert_eq!(env.config_id(), Some(next));

    // The new configuration is live
    let engine = env.engine().unwrap();
    engine.add_record("WATCHLIST", "W1", "{}", None).unwrap();
    assert_eq!(engine.get_active_config_id().unwrap(), next);
}

#[test]
fn test_diagnostic_reinitialized_without_engine() {
    let fx = Fixture::new();
    let env = fx.build();
    env.diagnostic().unwrap();
    let next = fx.mock.register_config_document(&["TEST"], "next");

    env.reinitialize(next).unwrap();

    assert_eq!(fx.mock.calls_to("diagnostic.reinit"), 1);
    assert_eq!(fx.mock.calls_to("engine.reinit"), 0);
    assert!(!env.facet_created(FacetKind::Engine).unwrap());
}

#[test]
fn test_engine_created_when_no_configured_facet_exists() {
    let fx = Fixture::new();
    let env = fx.build();
    env.product().unwrap();
    let next = fx.mock.register_config_document(&["TEST"], "next");

    env.reinitialize(next).unwrap();

    assert!(env.facet_created(FacetKind::Engine).unwrap());
    assert_eq!(fx.mock.init_config_ids(), vec![next]);
    assert!(fx.mock.reinit_calls().is_empty());
}

#[test]
fn test_unknown_id_fails_and_stays_recorded() {
    let fx = Fixture::new();
    let env = fx.build();
    env.engine().unwrap();

    let err = env.reinitialize(424_242).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(env.config_id(), Some(424_242));
    assert!(env.is_active());
}

#[test]
fn test_unknown_id_without_facets_leaves_engine_slot_empty() {
    let fx = Fixture::new();
    let env = fx.build();

    let err = env.reinitialize(424_242).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!env.facet_created(FacetKind::Engine).unwrap());
}

#[test]
fn test_facets_created_later_use_new_id() {
    let fx = Fixture::new();
    let env = fx.build();
    env.engine().unwrap();
    let next = fx.mock.register_config_document(&["TEST"], "next");

    env.reinitialize(next).unwrap();
    env.diagnostic().unwrap();

    assert_eq!(fx.mock.init_config_ids(), vec![next]);
}

#[test]
fn test_reinitialize_through_facets() {
    let fx = Fixture::new();
    let env = fx.build();
    let engine = env.engine().unwrap();
    let diagnostic = env.diagnostic().unwrap();
    let first = fx.mock.register_config_document(&["TEST"], "first");
    let second = fx.mock.register_config_document(&["TEST"], "second");

    engine.reinitialize(first).unwrap();
    diagnostic.reinitialize(second).unwrap();

    // Both route through the environment, which prefers the engine
    assert_eq!(fx.mock.reinit_calls(), vec![first, second]);
    assert_eq!(fx.mock.calls_to("diagnostic.reinit"), 0);
    assert_eq!(env.config_id(), Some(second));
}

#[test]
fn test_reinitialize_after_destroy_is_usage() {
    let fx = Fixture::new();
    let env = fx.build();
    env.destroy().unwrap();
    assert!(env.reinitialize(1).unwrap_err().is_usage());
}

#[test]
fn test_reinitialize_waits_for_in_flight_calls() {
    let fx = Fixture::new();
    let env = fx.build();
    env.engine().unwrap();
    let next = fx.mock.register_config_document(&["TEST"], "next");
    let started = Arc::new(Barrier::new(2));
    let call_done = Arc::new(AtomicBool::new(false));

    let worker_env = Arc::clone(&env);
    let worker_started = Arc::clone(&started);
    let worker_done = Arc::clone(&call_done);
    let worker = thread::spawn(move || {
        worker_env.execute(|| {
            worker_started.wait();
            thread::sleep(Duration::from_millis(100));
            worker_done.store(true, Ordering::SeqCst);
            Ok::<_, MeldError>(())
        })
    });

    started.wait();
    env.reinitialize(next).unwrap();
    assert!(call_done.load(Ordering::SeqCst));
    worker.join().unwrap().unwrap();
}
