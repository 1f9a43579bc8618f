//! Error types and error code constants for demystify.
//!
//! Errors never escape the public rendering entry points: every component
//! recovers locally and renders a fallback. [`DemystifyError`] exists so that
//! internal steps can use `?` and so that recoveries are logged with a
//! meaningful cause. The CLI is the only place an error becomes a process
//! exit code.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments or an invalid trace document
//! - `3`: Resolution errors (unknown token, unknown exception)
//! - `4`: IO errors
//! - `10`: Internal errors (bugs, unexpected state)

use std::fmt;

use thiserror::Error;

use crate::metadata::{MethodToken, TypeToken};

// ============================================================================
// Error Codes
// ============================================================================

/// Stable numeric error codes, used as CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Invalid arguments or malformed input.
    InvalidArguments = 2,
    /// A token or exception id did not resolve.
    ResolutionError = 3,
    /// Reading input or writing output failed.
    IoError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl ErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the engine and its front doors.
#[derive(Debug, Error)]
pub enum DemystifyError {
    /// A type token did not resolve.
    #[error("unknown type token {token}")]
    UnknownType { token: TypeToken },

    /// A method token did not resolve.
    #[error("unknown method token {token}")]
    UnknownMethod { token: MethodToken },

    /// A name looked generated but matched no known convention.
    #[error("unrecognized generated name '{name}'")]
    UnrecognizedGeneratedName { name: String },

    /// A fixed recursion or iteration cap was reached.
    #[error("depth limit {limit} exceeded while {context}")]
    DepthExceeded { limit: usize, context: &'static str },

    /// An exception id is not part of the graph.
    #[error("unknown exception #{id}")]
    UnknownException { id: usize },

    /// The trace document is malformed.
    #[error("invalid trace document: {message}")]
    InvalidDocument { message: String },

    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// IO failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&DemystifyError> for ErrorCode {
    fn from(err: &DemystifyError) -> Self {
        match err {
            DemystifyError::UnknownType { .. } => ErrorCode::ResolutionError,
            DemystifyError::UnknownMethod { .. } => ErrorCode::ResolutionError,
            DemystifyError::UnrecognizedGeneratedName { .. } => ErrorCode::ResolutionError,
            DemystifyError::UnknownException { .. } => ErrorCode::ResolutionError,
            DemystifyError::DepthExceeded { .. } => ErrorCode::InternalError,
            DemystifyError::InvalidDocument { .. } => ErrorCode::InvalidArguments,
            DemystifyError::InvalidArguments { .. } => ErrorCode::InvalidArguments,
            DemystifyError::Io(_) => ErrorCode::IoError,
            DemystifyError::Internal { .. } => ErrorCode::InternalError,
        }
    }
}

impl From<serde_json::Error> for DemystifyError {
    fn from(err: serde_json::Error) -> Self {
        DemystifyError::InvalidDocument {
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl DemystifyError {
    /// Create an invalid document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        DemystifyError::InvalidDocument {
            message: message.into(),
        }
    }

    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        DemystifyError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        DemystifyError::Internal {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from(self)
    }
}

/// Result alias used throughout the engine.
pub type DemystifyResult<T> = Result<T, DemystifyError>;

// ============================================================================
// Tests
// ============================================================================
