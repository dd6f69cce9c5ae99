//! Teardown while callers are still loading records

use crate::common::Harness;
use meld::{ErrorKind, LifecycleState, MeldError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_destroy_under_load() {
    const LOADERS: usize = 4;
    let h = Harness::new();
    let env = h.build("loader");
    let engine = env.engine().unwrap();
    let loaded = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..LOADERS)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            let loaded = Arc::clone(&loaded);
            thread::spawn(move || {
                let mut n = 0;
                loop {
                    let record_id = format!("{worker}-{n}");
                    match engine.add_record("CUSTOMERS", &record_id, "{}", None) {
                        Ok(_) => {
                            loaded.fetch_add(1, Ordering::SeqCst);
                            n += 1;
                        }
                        Err(e) => return e,
                    }
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    env.destroy().unwrap();
    let records_at_destroy = h.mock.record_count();

    // Every loader stops with a usage error; none slipped past teardown
    for handle in handles {
        let err: MeldError = handle.join().unwrap();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
    assert_eq!(h.mock.record_count(), records_at_destroy);
    assert_eq!(loaded.load(Ordering::SeqCst), records_at_destroy);
    assert_eq!(env.state(), LifecycleState::Destroyed);
    assert_eq!(env.in_flight(), 0);
}

#[test]
fn test_full_teardown_order_through_facade() {
    let h = Harness::new();
    let env = h.build("ordered");
    env.engine().unwrap();
    env.product().unwrap();
    env.diagnostic().unwrap();
    env.config_manager().unwrap();

    env.destroy().unwrap();

    let destroys: Vec<String> = h
        .mock
        .history()
        .into_iter()
        .filter(|call| call.ends_with(".destroy"))
        .collect();
    assert_eq!(
        destroys,
        vec![
            "engine.destroy",
            "diagnostic.destroy",
            "config_manager.destroy",
            "product.destroy",
        ]
    );
}
