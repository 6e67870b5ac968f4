//! Error taxonomy for a compilation.
//!
//! Every variant aborts the whole compile: an incomplete package is not a
//! valid H5P file, so there is no degraded output.

use thiserror::Error;

/// Result type for compile operations
pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    /// Malformed or missing top-level book fields
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown content type '{type_tag}' (chapter {chapter}, item {index})")]
    UnknownType {
        chapter: usize,
        index: usize,
        type_tag: String,
    },

    /// Schema or handler validation failed
    #[error("Validation failed for {item} at '{path}': {message}")]
    Validation {
        item: String,
        path: String,
        message: String,
    },

    #[error("Could not resolve dependency {identity}: {reason}")]
    DependencyResolution { identity: String, reason: String },

    /// Serialization or archive writing failed
    #[error("Assembly failed: {0}")]
    Assembly(String),

    /// A handler's `process()` failed
    #[error("Handler failed for {item}: {source}")]
    Handler {
        item: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    pub fn resolution(identity: impl ToString, reason: impl ToString) -> Self {
        Self::DependencyResolution {
            identity: identity.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn assembly(reason: impl ToString) -> Self {
        Self::Assembly(reason.to_string())
    }
}

impl From<zip::result::ZipError> for CompileError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Assembly(err.to_string())
    }
}

/// Errors raised while parsing a raw schema definition
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Schema must be a JSON array of fields")]
    NotAnArray,

    #[error("Field at '{path}' is not an object")]
    NotAnObject { path: String },

    #[error("Field at '{path}' has no name")]
    MissingName { path: String },

    #[error("Field '{path}' has unknown type '{kind}'")]
    UnknownType { path: String, kind: String },

    #[error("Field '{path}' is missing its '{key}' definition")]
    MissingDefinition { path: String, key: String },

    #[error("Field '{path}' lists an invalid library option '{option}'")]
    InvalidOption { path: String, option: String },
}
