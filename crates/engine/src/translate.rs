//! Native return code to typed error translation
//!
//! Every native return code passes through [`check`]. A non-zero code is
//! resolved against the failing module's last exception, which is cleared
//! afterwards so the next failure on that module starts clean.

use meld_core::{error_for_code, MeldError, MeldResult};
use meld_native::{NativeLifecycle, NativeReply, ReturnCode};
use tracing::debug;

/// Turn a native return code into a result.
///
/// Zero is success. Otherwise the module's last exception code and message
/// select the typed error; when the module reports no code or no message,
/// the result is `MeldError::Generic` carrying the raw return code.
pub fn check<N>(native: &N, return_code: ReturnCode) -> MeldResult<()>
where
    N: NativeLifecycle + ?Sized,
{
    if return_code == 0 {
        return Ok(());
    }

    let message = native.last_exception();
    let code = native.last_exception_code();
    native.clear_last_exception();

    debug!(
        target: "meld::native",
        return_code,
        code,
        message = %message,
        "native call failed"
    );

    if code == 0 || message.is_empty() {
        return Err(MeldError::Generic {
            code: Some(return_code),
            message: format!(
                "native call failed with return code {} and no exception detail",
                return_code
            ),
            source: None,
        });
    }
    Err(error_for_code(code, message))
}

/// [`check`] a reply and unwrap its payload.
pub fn check_reply<N, T>(native: &N, reply: NativeReply<T>) -> MeldResult<T>
where
    N: NativeLifecycle + ?Sized,
{
    check(native, reply.return_code)?;
    Ok(reply.response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meld_core::{codes, ErrorKind};
    use meld_native::{MockNative, NativeEngine, NativeLayer, NativeProduct, NATIVE_FAILURE};

    #[test]
    fn test_zero_is_success() {
        let mock = MockNative::new();
        let engine = mock.engine();
        assert!(check(&*engine, 0).is_ok());
    }

    #[test]
    fn test_failure_maps_and_clears() {
        let mock = MockNative::new();
        let engine = mock.engine();
        // Not initialized yet
        let rc = engine.prime_engine();

        let err = check(&*engine, rc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotInitialized);
        assert_eq!(err.code(), Some(codes::MODULE_NOT_INITIALIZED));
        assert_eq!(engine.last_exception_code(), 0);
    }

    #[test]
    fn test_missing_detail_falls_back_to_generic() {
        let mock = MockNative::new();
        let engine = mock.engine();
        assert_eq!(engine.init("test", "{}", false), 0);
        mock.fail_next("engine.get_stats", 0, "");

        let reply = engine.get_stats();
        let err = check_reply(&*engine, reply).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert_eq!(err.code(), Some(NATIVE_FAILURE));
    }

    #[test]
    fn test_reply_payload_on_success() {
        let mock = MockNative::new();
        let product = mock.product();
        assert_eq!(product.init("test", "{}", false), 0);
        let version = check_reply(&*product, product.get_version()).unwrap();
        assert!(version.contains("VERSION"));
    }
}
