//! Error types for declaration resolution and payload validation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors during a resolution run.
///
/// Every variant is fatal to the run that produced it.
#[derive(Debug, Error)]
pub enum ResolveError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    // Schema errors (exit code 2)
    #[error("invalid directive for {field:?}: {message}")]
    Configuration { field: String, message: String },

    #[error("unknown directive for {field:?}: {directive:?}")]
    UnknownDirective { field: String, directive: String },

    #[error("cannot resolve {ident:?} from package {package:?}")]
    UnresolvedType { ident: String, package: String },

    #[error("unsupported type for {ident:?}: {shape}")]
    UnsupportedTypeShape { ident: String, shape: String },

    #[error("unsupported schema file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("resolution run aborted by an earlier error: {message}")]
    Aborted { message: String },
}

/// Errors during validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl ResolveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolveError::FileNotFound { .. } | ResolveError::ReadError { .. } => 3,
            _ => 2,
        }
    }

    pub(crate) fn configuration(field: &str, message: impl Into<String>) -> Self {
        ResolveError::Configuration {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Resolve(e) => e.exit_code(),
            ValidateError::InvalidSchema { .. } => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }
}
