//! Guarded call tests
//!
//! Error normalization, reentrancy and teardown draining for
//! `Environment::execute`.

mod common;

use common::{wait_until, Fixture};
use meld_core::{ErrorKind, LifecycleState, MeldError};
use std::error::Error as _;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

// ============================================================================
// Results and errors
// ============================================================================

#[test]
fn test_execute_returns_task_value() {
    let fx = Fixture::new();
    let env = fx.build();
    let value = env.execute(|| Ok::<_, MeldError>(41 + 1)).unwrap();
    assert_eq!(value, 42);
    assert_eq!(env.in_flight(), 0);
}

#[test]
fn test_typed_error_passes_through_unchanged() {
    let fx = Fixture::new();
    let env = fx.build();
    let err = env
        .execute(|| Err::<(), _>(meld_core::error_for_code(33, "Unknown record")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.code(), Some(33));
    assert_eq!(err.message(), "Unknown record");
}

#[test]
fn test_foreign_error_is_wrapped_as_generic() {
    let fx = Fixture::new();
    let env = fx.build();
    let err = env
        .execute(|| Err::<(), _>(io::Error::new(io::ErrorKind::Other, "pipe closed")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generic);
    assert_eq!(err.code(), None);
    assert!(err.message().contains("pipe closed"));
    let source = err.source().unwrap();
    assert!(source.downcast_ref::<io::Error>().is_some());
}

#[test]
fn test_panic_becomes_generic_error() {
    let fx = Fixture::new();
    let env = fx.build();
    let err = env
        .execute(|| -> Result<(), MeldError> { panic!("native layer exploded") })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generic);
    assert!(err.message().contains("native layer exploded"));

    // The environment is still usable and nothing is left in flight
    assert_eq!(env.in_flight(), 0);
    assert!(env.execute(|| Ok::<_, MeldError>(())).is_ok());
    env.destroy().unwrap();
}

#[test]
fn test_in_flight_returns_to_zero_on_every_path() {
    let fx = Fixture::new();
    let env = fx.build();
    let _ = env.execute(|| Ok::<_, MeldError>(()));
    let _ = env.execute(|| Err::<(), _>(MeldError::generic("failed")));
    let _ = env.execute(|| -> Result<(), MeldError> { panic!("boom") });
    assert_eq!(env.in_flight(), 0);
}

// ============================================================================
// Reentrancy
// ============================================================================

#[test]
fn test_nested_execute_is_reentrant() {
    let fx = Fixture::new();
    let env = fx.build();
    let depth = env
        .execute(|| {
            assert_eq!(env.in_flight(), 1);
            env.execute(|| {
                assert_eq!(env.in_flight(), 2);
                Ok::<_, MeldError>(2)
            })
        })
        .unwrap();
    assert_eq!(depth, 2);
    assert_eq!(env.in_flight(), 0);
}

#[test]
fn test_facet_use_from_inside_a_task() {
    let fx = Fixture::new();
    let env = fx.build();
    let stats = env
        .execute(|| {
            let engine = env.engine()?;
            engine.get_stats()
        })
        .unwrap();
    assert!(stats.contains("workload"));
}

#[test]
fn test_destroy_inside_task_is_rejected() {
    let fx = Fixture::new();
    let env = fx.build();
    let err = env.execute(|| env.destroy()).unwrap_err();
    assert!(err.is_usage());
    assert!(env.is_active());
    env.destroy().unwrap();
}

#[test]
fn test_reinitialize_inside_task_is_rejected() {
    let fx = Fixture::new();
    let env = fx.build();
    let default_id = fx.mock.default_config_id().unwrap();
    let err = env.execute(|| env.reinitialize(default_id)).unwrap_err();
    assert!(err.is_usage());
    assert_eq!(env.config_id(), None);
}

#[test]
fn test_verbose_environment_executes_normally() {
    let fx = Fixture::new();
    let env = fx.builder().verbose_logging(true).build().unwrap();
    assert!(env.is_verbose());
    let product = env.product().unwrap();
    assert!(product.get_version().unwrap().contains("VERSION"));
    assert!(fx.mock.init_args(meld_core::FacetKind::Product).unwrap().verbose);
}

// ============================================================================
// Teardown draining
// ============================================================================

#[test]
fn test_destroy_waits_for_in_flight_calls() {
    const WORKERS: usize = 6;
    let fx = Fixture::new();
    let env = fx.build();
    let finished = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(WORKERS + 1));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let env = Arc::clone(&env);
            let finished = Arc::clone(&finished);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                env.execute(|| {
                    barrier.wait();
                    thread::sleep(Duration::from_millis(100));
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, MeldError>(())
                })
            })
        })
        .collect();

    barrier.wait();
    assert_eq!(env.in_flight(), WORKERS);
    env.destroy().unwrap();

    // Every call that started before teardown finished before it completed
    assert_eq!(finished.load(Ordering::SeqCst), WORKERS);
    assert_eq!(env.in_flight(), 0);
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
}

#[test]
fn test_no_task_starts_after_destroy_began() {
    let fx = Fixture::new();
    let env = fx.build();
    let release = Arc::new(Barrier::new(2));
    let late_task_ran = Arc::new(AtomicBool::new(false));

    // Holds the environment in flight until released
    let long_env = Arc::clone(&env);
    let long_release = Arc::clone(&release);
    let long_call = thread::spawn(move || {
        long_env.execute(|| {
            long_release.wait();
            thread::sleep(Duration::from_millis(100));
            Ok::<_, MeldError>(())
        })
    });
    assert!(wait_until(Duration::from_secs(2), || env.in_flight() == 1));

    let destroying = Arc::clone(&env);
    let destroyer = thread::spawn(move || destroying.destroy());
    assert!(wait_until(Duration::from_secs(2), || {
        env.state() == LifecycleState::Destroying
    }));

    let late_env = Arc::clone(&env);
    let ran = Arc::clone(&late_task_ran);
    let late_call = thread::spawn(move || {
        late_env.execute(|| {
            ran.store(true, Ordering::SeqCst);
            Ok::<_, MeldError>(())
        })
    });

    release.wait();
    long_call.join().unwrap().unwrap();
    destroyer.join().unwrap().unwrap();

    let late = late_call.join().unwrap();
    assert!(late.unwrap_err().is_usage());
    assert!(!late_task_ran.load(Ordering::SeqCst));
    assert_eq!(env.state(), LifecycleState::Destroyed);
}

#[test]
fn test_concurrent_guarded_calls_share_the_gate() {
    const WORKERS: usize = 4;
    let fx = Fixture::new();
    let env = fx.build();
    let barrier = Arc::new(Barrier::new(WORKERS));

    // All workers must be inside `execute` at once to pass the barrier
    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let env = Arc::clone(&env);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                env.execute(|| {
                    barrier.wait();
                    Ok::<_, MeldError>(())
                })
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert_eq!(env.in_flight(), 0);
}
