//! Native failures as callers see them

use crate::common::Harness;
use meld::{codes, error_for_code, ErrorKind, Flags, MeldError};

#[test]
fn test_every_registered_code_surfaces_typed() {
    let h = Harness::new();
    let env = h.build("errors");
    let engine = env.engine().unwrap();

    for &(code, kind) in codes::REGISTERED {
        h.mock.fail_next("engine.get_stats", code, "injected");
        let err = engine.get_stats().unwrap_err();
        assert_eq!(err.kind(), kind, "code {code}");
        assert_eq!(err.code(), Some(code));
        assert_eq!(err.message(), "injected");
    }
}

#[test]
fn test_unmapped_code_surfaces_generic() {
    let h = Harness::new();
    let env = h.build("errors");
    let engine = env.engine().unwrap();

    h.mock.fail_next("engine.prime_engine", -1, "mystery");
    let err = engine.prime_engine().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generic);
    assert_eq!(err.code(), Some(-1));
    assert!(matches!(err, MeldError::Generic { .. }));
}

#[test]
fn test_families_guide_caller_handling() {
    let h = Harness::new();
    let env = h.build("errors");
    let engine = env.engine().unwrap();

    let err = engine.add_record("UNKNOWN", "1", "{}", None).unwrap_err();
    assert!(err.is_bad_input());
    assert!(!err.is_retryable());

    h.mock.fail_next("engine.add_record_with_info", 8000, "timed out");
    let err = engine
        .add_record("TEST", "1", "{}", Some(Flags::WITH_INFO))
        .unwrap_err();
    assert!(err.is_retryable());

    h.mock.fail_next("engine.get_stats", 9000, "license expired");
    let err = engine.get_stats().unwrap_err();
    assert!(err.is_unrecoverable());
    assert_eq!(
        err.to_string(),
        error_for_code(9000, "license expired").to_string()
    );
}
