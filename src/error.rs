//! Error handling for pipeline compilation and evaluation.
//!
//! A single error enum covers every failure the engine can report. Errors are
//! `Clone` because iterators cache their terminal error and hand the same value
//! to every later caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type for compiling and running pipelines.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// Argument binding failed while compiling a transform
    #[error("Compile error in '{transform}': {message}")]
    CompileError { transform: String, message: String },

    /// A value could not be coerced to the type an accessor requires
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// An upstream source or iterator failed
    #[error("Iterator error: {message}")]
    IteratorError { message: String },

    /// A transform descriptor could not be registered
    #[error("Transform registration failed: {message}")]
    RegistrationError { message: String },

    /// A transform name is not in the registry
    #[error("Transform not found: {name}")]
    NotFoundError { name: String },

    /// A payload did not conform to its schema
    #[error("Schema validation failed: {message}")]
    SchemaValidationError {
        message: String,
        field: Option<String>,
    },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Reading or writing datapoint files failed
    #[error("IO error: {message}")]
    IoError { message: String },
}

impl PipelineError {
    /// Creates a compile error for the named transform.
    pub fn compile(transform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CompileError {
            transform: transform.into(),
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an iterator error.
    pub fn iterator(message: impl Into<String>) -> Self {
        Self::IteratorError {
            message: message.into(),
        }
    }

    /// Creates a registration error.
    pub fn registration(message: impl Into<String>) -> Self {
        Self::RegistrationError {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFoundError { name: name.into() }
    }

    /// Creates a schema validation error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaValidationError {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a schema validation error tied to a property.
    pub fn schema_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::SchemaValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::IoError {
            message: message.into(),
        }
    }

    /// Gets the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::CompileError { .. } => ErrorCategory::Compile,
            PipelineError::TypeMismatch { .. } => ErrorCategory::Type,
            PipelineError::IteratorError { .. } => ErrorCategory::Iterator,
            PipelineError::RegistrationError { .. } => ErrorCategory::Registration,
            PipelineError::NotFoundError { .. } => ErrorCategory::NotFound,
            PipelineError::SchemaValidationError { .. } => ErrorCategory::Schema,
            PipelineError::ConfigurationError { .. } => ErrorCategory::Configuration,
            PipelineError::IoError { .. } => ErrorCategory::Io,
        }
    }

    /// Whether the error was raised before any datapoint was evaluated.
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Compile | ErrorCategory::Registration | ErrorCategory::NotFound
        )
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::io(format!("JSON: {}", err))
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(format!("TOML: {}", err))
    }
}

/// Error categories for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Argument binding failures
    Compile,
    /// Value coercion failures
    Type,
    /// Source or iterator failures
    Iterator,
    /// Registry failures
    Registration,
    /// Unknown transform names
    NotFound,
    /// Payload validation failures
    Schema,
    /// Configuration failures
    Configuration,
    /// File and stream failures
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Compile => write!(f, "COMPILE"),
            ErrorCategory::Type => write!(f, "TYPE"),
            ErrorCategory::Iterator => write!(f, "ITERATOR"),
            ErrorCategory::Registration => write!(f, "REGISTRATION"),
            ErrorCategory::NotFound => write!(f, "NOT_FOUND"),
            ErrorCategory::Schema => write!(f, "SCHEMA"),
            ErrorCategory::Configuration => write!(f, "CONFIGURATION"),
            ErrorCategory::Io => write!(f, "IO"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            PipelineError::compile("filter", "bad").category(),
            ErrorCategory::Compile
        );
        assert_eq!(
            PipelineError::type_mismatch("boolean", "string").category(),
            ErrorCategory::Type
        );
        assert!(PipelineError::not_found("nope").is_compile_time());
        assert!(!PipelineError::iterator("boom").is_compile_time());
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::compile("filter", "Argument 1 is required");
        assert_eq!(
            err.to_string(),
            "Compile error in 'filter': Argument 1 is required"
        );
        let err = PipelineError::type_mismatch("number", "string");
        assert_eq!(err.to_string(), "Type mismatch: expected number, got string");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PipelineError = io.into();
        assert_eq!(err.category(), ErrorCategory::Io);
    }
}
