//! Core error types for Plexus.

use thiserror::Error;

/// Result type alias using `PlexusError`.
pub type PlexusResult<T> = std::result::Result<T, PlexusError>;

/// Generic boxed error for external error sources.
pub type GenericError = Box<dyn std::error::Error + Send + Sync>;

/// Core error type for Plexus operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlexusError {
    /// An expression could not be compiled into a calculation.
    #[error("CompileError: {0}")]
    CompileError(String),

    /// An index definition or accessor request was rejected.
    #[error("InvalidIndex: {0}")]
    InvalidIndex(String),

    /// Configuration is malformed or names an unknown rule.
    #[error("ConfigError: {0}")]
    ConfigError(String),

    /// Internal error (bug in Plexus).
    #[error("InternalError: {0}")]
    InternalError(String),

    /// IO error.
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// External error from third-party libraries.
    #[error("ExternalError: {0}")]
    ExternalError(GenericError),
}

impl PlexusError {
    /// Create a new `CompileError`.
    pub fn compile<S: Into<String>>(msg: S) -> Self {
        Self::CompileError(msg.into())
    }

    /// Create a new `InvalidIndex` error.
    pub fn invalid_index<S: Into<String>>(msg: S) -> Self {
        Self::InvalidIndex(msg.into())
    }

    /// Create a new `ConfigError`.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new `InternalError`.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }

    /// Wrap an error coming from outside the workspace.
    pub fn external<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ExternalError(Box::new(err))
    }
}

/// Ensure a condition holds, returning an error of the given variant if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::PlexusError::InternalError($msg.to_string()));
        }
    };
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::PlexusError::$variant(format!($($msg)*)));
        }
    };
}

/// Return early with a `CompileError`.
#[macro_export]
macro_rules! compile_err {
    ($($arg:tt)*) => {
        return Err($crate::PlexusError::CompileError(format!($($arg)*)))
    };
}
