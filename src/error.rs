//! Error taxonomy for the service runtime.
//!
//! Grounded on `DebuggingServiceAuthError` (cloud-debugging-service/src/auth.rs)
//! and `AuthServiceError` (cloud-common/src/clients/auth.rs): a flat
//! `thiserror`-derived enum with one variant per failure kind, each carrying
//! enough context to be logged directly without a wrapping `anyhow::Error`.

use std::fmt;

/// The kinds of failure the runtime's public surface can produce.
///
/// See spec section 7 ("Error Handling Design") for the taxonomy this
/// mirrors one-to-one.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("service name already registered: {0}")]
    NameConflict(String),

    #[error("programmer error: {0}")]
    ProgrammerError(String),

    #[error("resource exhausted: pool '{pool}' rejected task ({reason})")]
    ResourceExhausted { pool: String, reason: String },

    #[error("shutdown already in progress for service '{service}'")]
    ShutdownInProgress { service: String },

    #[error("io failure: {0}")]
    IoFailure(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn bad_argument(msg: impl Into<String>) -> Self {
        RuntimeError::BadArgument(msg.into())
    }

    pub fn programmer_error(msg: impl Into<String>) -> Self {
        RuntimeError::ProgrammerError(msg.into())
    }
}

/// Parse failures raised while assembling an [`crate::http::HttpPackage`].
///
/// Per spec section 4.6/7, the parser itself never throws these: `addData`
/// records them on the package and the connection owner decides whether to
/// abort. The type still implements `std::error::Error` so it composes
/// normally with `?` in code that *does* want to fail fast (tests, strict
/// callers).
#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    #[error("malformed header line: {0:?}")]
    MalformedHeaderLine(String),

    #[error("header line missing ':' separator: {0:?}")]
    MissingColon(String),
}

impl fmt::Display for RuntimeErrorKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Lightweight discriminant for tests/logging that want to match on the
/// error *kind* without destructuring the full enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKindTag {
    BadArgument,
    NameConflict,
    ProgrammerError,
    ResourceExhausted,
    ShutdownInProgress,
    IoFailure,
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKindTag {
        match self {
            RuntimeError::BadArgument(_) => RuntimeErrorKindTag::BadArgument,
            RuntimeError::NameConflict(_) => RuntimeErrorKindTag::NameConflict,
            RuntimeError::ProgrammerError(_) => RuntimeErrorKindTag::ProgrammerError,
            RuntimeError::ResourceExhausted { .. } => RuntimeErrorKindTag::ResourceExhausted,
            RuntimeError::ShutdownInProgress { .. } => RuntimeErrorKindTag::ShutdownInProgress,
            RuntimeError::IoFailure(_) => RuntimeErrorKindTag::IoFailure,
        }
    }
}
