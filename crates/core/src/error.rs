//! Error types for meld
//!
//! Every failure surfaced by the SDK is a [`MeldError`]. Lifecycle misuse
//! (calling into a destroyed environment, building a second active one) is
//! reported as [`MeldError::Usage`] and never reaches the native layer.
//! Everything else originates from a native return code and is mapped
//! through the closed code table in [`codes`] by [`error_for_code`].
//!
//! # Families
//!
//! | Family | Variants |
//! |--------|----------|
//! | Bad input | `BadInput`, `NotFound`, `UnknownDataSource` |
//! | Configuration | `Configuration`, `ReplaceConflict` |
//! | Retryable | `Retryable`, `DatabaseConnectionLost`, `RetryTimeoutExceeded` |
//! | Unrecoverable | `Unrecoverable`, `Database`, `License`, `NotInitialized`, `Unhandled` |
//! | Fallback | `Generic` |
//!
//! Codes missing from the table fall back to [`MeldError::Generic`].

use std::fmt;
use thiserror::Error;

/// Boxed error accepted as the inner cause of a [`MeldError::Generic`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for meld operations
pub type MeldResult<T> = std::result::Result<T, MeldError>;

// =============================================================================
// Error Kinds
// =============================================================================

/// Flat discriminant of a [`MeldError`].
///
/// Kinds form a shallow hierarchy: [`ErrorKind::parent`] walks from a
/// specific kind towards [`ErrorKind::Generic`], so callers can match on
/// whole families (`kind.is_a(ErrorKind::BadInput)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// SDK misuse detected before any native call
    Usage,
    /// Native failure without a more specific mapping
    Generic,
    /// The request was malformed or referenced invalid input
    BadInput,
    /// The referenced entity or record does not exist
    NotFound,
    /// The request referenced a data source the configuration does not know
    UnknownDataSource,
    /// The configuration is invalid or could not be applied
    Configuration,
    /// A conditional default-configuration swap lost a race
    ReplaceConflict,
    /// A transient failure; the operation may succeed when retried
    Retryable,
    /// The connection to the repository database was lost
    DatabaseConnectionLost,
    /// The native layer gave up retrying internally
    RetryTimeoutExceeded,
    /// A failure the environment cannot recover from
    Unrecoverable,
    /// The repository database reported a failure
    Database,
    /// The product license is missing, invalid or exhausted
    License,
    /// The native module was used before initialization
    NotInitialized,
    /// The native layer hit an internal fault it did not handle
    Unhandled,
}

impl ErrorKind {
    /// The family this kind belongs to, `None` for roots.
    pub fn parent(self) -> Option<ErrorKind> {
        use ErrorKind::*;
        match self {
            Usage | Generic => None,
            NotFound | UnknownDataSource => Some(BadInput),
            DatabaseConnectionLost | RetryTimeoutExceeded => Some(Retryable),
            Database | License | NotInitialized | Unhandled => Some(Unrecoverable),
            BadInput | Configuration | ReplaceConflict | Retryable | Unrecoverable => {
                Some(Generic)
            }
        }
    }

    /// True when `self` equals `ancestor` or descends from it.
    pub fn is_a(self, ancestor: ErrorKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == ancestor {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    /// Member of the bad-input family
    pub fn is_bad_input(self) -> bool {
        self.is_a(ErrorKind::BadInput)
    }

    /// Member of the retryable family
    pub fn is_retryable(self) -> bool {
        self.is_a(ErrorKind::Retryable)
    }

    /// Member of the unrecoverable family
    pub fn is_unrecoverable(self) -> bool {
        self.is_a(ErrorKind::Unrecoverable)
    }

    /// Stable name used in logs
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Usage => "Usage",
            ErrorKind::Generic => "Generic",
            ErrorKind::BadInput => "BadInput",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::UnknownDataSource => "UnknownDataSource",
            ErrorKind::Configuration => "Configuration",
            ErrorKind::ReplaceConflict => "ReplaceConflict",
            ErrorKind::Retryable => "Retryable",
            ErrorKind::DatabaseConnectionLost => "DatabaseConnectionLost",
            ErrorKind::RetryTimeoutExceeded => "RetryTimeoutExceeded",
            ErrorKind::Unrecoverable => "Unrecoverable",
            ErrorKind::Database => "Database",
            ErrorKind::License => "License",
            ErrorKind::NotInitialized => "NotInitialized",
            ErrorKind::Unhandled => "Unhandled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// MeldError
// =============================================================================

/// Errors returned by every meld operation.
#[derive(Debug, Error)]
pub enum MeldError {
    // ==================== SDK ====================
    /// The SDK was used incorrectly (destroyed environment, second active
    /// environment, destroy from inside a guarded call)
    #[error("usage error: {message}")]
    Usage {
        /// What was wrong
        message: String,
    },

    /// Native failure with no specific mapping, or a foreign error raised
    /// inside a guarded task
    #[error("native failure{}: {message}", code_suffix(.code))]
    Generic {
        /// Native error code, `None` when the failure did not come from
        /// the native layer
        code: Option<i64>,
        /// Failure description
        message: String,
        /// Original error when a foreign failure was wrapped
        #[source]
        source: Option<BoxError>,
    },

    // ==================== Bad Input ====================
    /// Malformed request
    #[error("bad input ({code}): {message}")]
    BadInput {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    /// Entity or record not found
    #[error("not found ({code}): {message}")]
    NotFound {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    /// Data source not present in the active configuration
    #[error("unknown data source ({code}): {message}")]
    UnknownDataSource {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    // ==================== Configuration ====================
    /// Configuration invalid or not applicable
    #[error("configuration error ({code}): {message}")]
    Configuration {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    /// The default configuration changed between read and conditional swap
    #[error("replace conflict ({code}): {message}")]
    ReplaceConflict {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    // ==================== Retryable ====================
    /// Transient failure
    #[error("retryable failure ({code}): {message}")]
    Retryable {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    /// Repository connection lost
    #[error("database connection lost ({code}): {message}")]
    DatabaseConnectionLost {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    /// Native retry budget exhausted
    #[error("retry timeout exceeded ({code}): {message}")]
    RetryTimeoutExceeded {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    // ==================== Unrecoverable ====================
    /// Environment cannot continue
    #[error("unrecoverable failure ({code}): {message}")]
    Unrecoverable {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    /// Repository database failure
    #[error("database error ({code}): {message}")]
    Database {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    /// License failure
    #[error("license error ({code}): {message}")]
    License {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    /// Native module not initialized
    #[error("not initialized ({code}): {message}")]
    NotInitialized {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },

    /// Unhandled native fault
    #[error("unhandled native fault ({code}): {message}")]
    Unhandled {
        /// Native error code
        code: i64,
        /// Native error message
        message: String,
    },
}

fn code_suffix(code: &Option<i64>) -> String {
    match code {
        Some(code) => format!(" ({code})"),
        None => String::new(),
    }
}

impl MeldError {
    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        MeldError::Usage {
            message: message.into(),
        }
    }

    /// Create a generic error that did not come from a native code
    pub fn generic(message: impl Into<String>) -> Self {
        MeldError::Generic {
            code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Build the variant for `kind` carrying a native code and message.
    ///
    /// `Usage` is never produced from a native code; it and `Generic` both
    /// yield [`MeldError::Generic`].
    pub fn native(kind: ErrorKind, code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Usage | ErrorKind::Generic => MeldError::Generic {
                code: Some(code),
                message,
                source: None,
            },
            ErrorKind::BadInput => MeldError::BadInput { code, message },
            ErrorKind::NotFound => MeldError::NotFound { code, message },
            ErrorKind::UnknownDataSource => MeldError::UnknownDataSource { code, message },
            ErrorKind::Configuration => MeldError::Configuration { code, message },
            ErrorKind::ReplaceConflict => MeldError::ReplaceConflict { code, message },
            ErrorKind::Retryable => MeldError::Retryable { code, message },
            ErrorKind::DatabaseConnectionLost => {
                MeldError::DatabaseConnectionLost { code, message }
            }
            ErrorKind::RetryTimeoutExceeded => MeldError::RetryTimeoutExceeded { code, message },
            ErrorKind::Unrecoverable => MeldError::Unrecoverable { code, message },
            ErrorKind::Database => MeldError::Database { code, message },
            ErrorKind::License => MeldError::License { code, message },
            ErrorKind::NotInitialized => MeldError::NotInitialized { code, message },
            ErrorKind::Unhandled => MeldError::Unhandled { code, message },
        }
    }

    /// Wrap a foreign error as [`MeldError::Generic`], keeping it as source.
    pub fn wrap(source: BoxError) -> Self {
        MeldError::Generic {
            code: None,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Recover a typed error from a boxed one.
    ///
    /// A boxed `MeldError` is unboxed unchanged; anything else is wrapped.
    pub fn from_boxed(error: BoxError) -> Self {
        match error.downcast::<MeldError>() {
            Ok(typed) => *typed,
            Err(other) => MeldError::wrap(other),
        }
    }

    /// Discriminant of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeldError::Usage { .. } => ErrorKind::Usage,
            MeldError::Generic { .. } => ErrorKind::Generic,
            MeldError::BadInput { .. } => ErrorKind::BadInput,
            MeldError::NotFound { .. } => ErrorKind::NotFound,
            MeldError::UnknownDataSource { .. } => ErrorKind::UnknownDataSource,
            MeldError::Configuration { .. } => ErrorKind::Configuration,
            MeldError::ReplaceConflict { .. } => ErrorKind::ReplaceConflict,
            MeldError::Retryable { .. } => ErrorKind::Retryable,
            MeldError::DatabaseConnectionLost { .. } => ErrorKind::DatabaseConnectionLost,
            MeldError::RetryTimeoutExceeded { .. } => ErrorKind::RetryTimeoutExceeded,
            MeldError::Unrecoverable { .. } => ErrorKind::Unrecoverable,
            MeldError::Database { .. } => ErrorKind::Database,
            MeldError::License { .. } => ErrorKind::License,
            MeldError::NotInitialized { .. } => ErrorKind::NotInitialized,
            MeldError::Unhandled { .. } => ErrorKind::Unhandled,
        }
    }

    /// Native error code, when the error came from the native layer
    pub fn code(&self) -> Option<i64> {
        match self {
            MeldError::Usage { .. } => None,
            MeldError::Generic { code, .. } => *code,
            MeldError::BadInput { code, .. }
            | MeldError::NotFound { code, .. }
            | MeldError::UnknownDataSource { code, .. }
            | MeldError::Configuration { code, .. }
            | MeldError::ReplaceConflict { code, .. }
            | MeldError::Retryable { code, .. }
            | MeldError::DatabaseConnectionLost { code, .. }
            | MeldError::RetryTimeoutExceeded { code, .. }
            | MeldError::Unrecoverable { code, .. }
            | MeldError::Database { code, .. }
            | MeldError::License { code, .. }
            | MeldError::NotInitialized { code, .. }
            | MeldError::Unhandled { code, .. } => Some(*code),
        }
    }

    /// Message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            MeldError::Usage { message }
            | MeldError::Generic { message, .. }
            | MeldError::BadInput { message, .. }
            | MeldError::NotFound { message, .. }
            | MeldError::UnknownDataSource { message, .. }
            | MeldError::Configuration { message, .. }
            | MeldError::ReplaceConflict { message, .. }
            | MeldError::Retryable { message, .. }
            | MeldError::DatabaseConnectionLost { message, .. }
            | MeldError::RetryTimeoutExceeded { message, .. }
            | MeldError::Unrecoverable { message, .. }
            | MeldError::Database { message, .. }
            | MeldError::License { message, .. }
            | MeldError::NotInitialized { message, .. }
            | MeldError::Unhandled { message, .. } => message,
        }
    }

    /// True for [`MeldError::Usage`]
    pub fn is_usage(&self) -> bool {
        matches!(self, MeldError::Usage { .. })
    }

    /// Member of the bad-input family
    pub fn is_bad_input(&self) -> bool {
        self.kind().is_bad_input()
    }

    /// Member of the retryable family
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Member of the unrecoverable family
    pub fn is_unrecoverable(&self) -> bool {
        self.kind().is_unrecoverable()
    }
}

// =============================================================================
// Native Code Table
// =============================================================================

/// Native error codes with a dedicated [`ErrorKind`].
///
/// This is the engine's numeric contract. Codes not listed here map to
/// [`ErrorKind::Generic`].
pub mod codes {
    use super::ErrorKind;

    /// Invalid request JSON
    pub const INVALID_JSON: i64 = 7;
    /// Record id missing from the request
    pub const MISSING_RECORD_ID: i64 = 22;
    /// Record references an unknown record
    pub const UNKNOWN_RECORD: i64 = 33;
    /// Unknown resolved entity id
    pub const UNKNOWN_ENTITY: i64 = 37;
    /// Native module used before init
    pub const MODULE_NOT_INITIALIZED: i64 = 48;
    /// Unhandled native exception
    pub const UNHANDLED: i64 = 999;
    /// Generic repository failure
    pub const DATABASE_FAILURE: i64 = 1000;
    /// Repository connection dropped
    pub const DATABASE_CONNECTION_LOST: i64 = 1006;
    /// Data source missing from the configuration
    pub const UNKNOWN_DATA_SOURCE: i64 = 2207;
    /// Configuration id not registered
    pub const UNKNOWN_CONFIG_ID: i64 = 7221;
    /// Conditional default-config swap saw a different current id
    pub const REPLACE_CONFLICT: i64 = 7245;
    /// Internal retry budget exhausted
    pub const RETRY_TIMEOUT: i64 = 8000;
    /// License invalid
    pub const LICENSE_INVALID: i64 = 9000;

    /// Every registered code with the kind it maps to.
    pub const REGISTERED: &[(i64, ErrorKind)] = &[
        (2, ErrorKind::BadInput),
        (INVALID_JSON, ErrorKind::BadInput),
        (MISSING_RECORD_ID, ErrorKind::BadInput),
        (23, ErrorKind::BadInput),
        (24, ErrorKind::BadInput),
        (25, ErrorKind::BadInput),
        (26, ErrorKind::BadInput),
        (27, ErrorKind::BadInput),
        (87, ErrorKind::BadInput),
        (88, ErrorKind::BadInput),
        (UNKNOWN_RECORD, ErrorKind::NotFound),
        (UNKNOWN_ENTITY, ErrorKind::NotFound),
        (63, ErrorKind::NotFound),
        (UNKNOWN_DATA_SOURCE, ErrorKind::UnknownDataSource),
        (2131, ErrorKind::Configuration),
        (2134, ErrorKind::Configuration),
        (7220, ErrorKind::Configuration),
        (UNKNOWN_CONFIG_ID, ErrorKind::Configuration),
        (7223, ErrorKind::Configuration),
        (7224, ErrorKind::Configuration),
        (7226, ErrorKind::Configuration),
        (REPLACE_CONFLICT, ErrorKind::ReplaceConflict),
        (10, ErrorKind::Retryable),
        (DATABASE_CONNECTION_LOST, ErrorKind::DatabaseConnectionLost),
        (1007, ErrorKind::DatabaseConnectionLost),
        (1008, ErrorKind::DatabaseConnectionLost),
        (RETRY_TIMEOUT, ErrorKind::RetryTimeoutExceeded),
        (14, ErrorKind::Unrecoverable),
        (19, ErrorKind::Unrecoverable),
        (20, ErrorKind::Unrecoverable),
        (DATABASE_FAILURE, ErrorKind::Database),
        (1001, ErrorKind::Database),
        (1002, ErrorKind::Database),
        (1003, ErrorKind::Database),
        (1004, ErrorKind::Database),
        (1005, ErrorKind::Database),
        (1009, ErrorKind::Database),
        (LICENSE_INVALID, ErrorKind::License),
        (9001, ErrorKind::License),
        (MODULE_NOT_INITIALIZED, ErrorKind::NotInitialized),
        (49, ErrorKind::NotInitialized),
        (50, ErrorKind::NotInitialized),
        (53, ErrorKind::NotInitialized),
        (UNHANDLED, ErrorKind::Unhandled),
    ];
}

/// Map a native error code to its kind.
pub fn kind_for_code(code: i64) -> ErrorKind {
    match code {
        2 | 7 | 22..=27 | 87 | 88 => ErrorKind::BadInput,
        33 | 37 | 63 => ErrorKind::NotFound,
        2207 => ErrorKind::UnknownDataSource,
        2131 | 2134 | 7220 | 7221 | 7223 | 7224 | 7226 => ErrorKind::Configuration,
        7245 => ErrorKind::ReplaceConflict,
        10 => ErrorKind::Retryable,
        1006..=1008 => ErrorKind::DatabaseConnectionLost,
        8000 => ErrorKind::RetryTimeoutExceeded,
        14 | 19 | 20 => ErrorKind::Unrecoverable,
        1000..=1005 | 1009 => ErrorKind::Database,
        9000 | 9001 => ErrorKind::License,
        48..=50 | 53 => ErrorKind::NotInitialized,
        999 => ErrorKind::Unhandled,
        _ => ErrorKind::Generic,
    }
}

/// Construct the typed error for a native code and message.
pub fn error_for_code(code: i64, message: impl Into<String>) -> MeldError {
    MeldError::native(kind_for_code(code), code, message)
}
