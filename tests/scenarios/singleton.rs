//! Singleton handoff between environments

use crate::common::Harness;
use meld::{ErrorKind, LifecycleState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

#[test]
fn test_engine_unusable_after_destroy() {
    let h = Harness::new();
    let env = h.build("scenario-a");
    let engine = env.engine().unwrap();
    engine
        .add_record("TEST", "1", r#"{"NAME":"Ann"}"#, None)
        .unwrap();

    env.destroy().unwrap();

    let err = env.engine().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    let err = engine.get_record("TEST", "1", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn test_second_environment_waits_its_turn() {
    let h = Harness::new();
    let a = h.build("scenario-a");

    let err = h.builder("scenario-b").build().unwrap_err();
    assert!(err.is_usage());

    a.destroy().unwrap();
    let b = h.build("scenario-b");
    assert_eq!(a.state(), LifecycleState::Destroyed);
    assert!(b.is_active());
    assert_eq!(h.registry.active().unwrap().instance_name(), "scenario-b");
}

#[test]
fn test_racing_builders_yield_one_winner() {
    const BUILDERS: usize = 8;
    let h = Arc::new(Harness::new());
    let winners = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..BUILDERS)
        .map(|i| {
            let h = Arc::clone(&h);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                if let Ok(env) = h.builder(&format!("racer-{i}")).build() {
                    winners.lock().push(env);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let winners = winners.lock();
    assert_eq!(winners.len(), 1);
    assert!(Arc::ptr_eq(&winners[0], &h.registry.active().unwrap()));
}
