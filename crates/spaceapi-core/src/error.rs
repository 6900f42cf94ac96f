//! Error types for the status core
//!
//! Provides error handling for:
//! - Store operations (read, parse, atomic write)
//! - Key resolution and value coercion
//! - Document invariant checks before a write

use std::path::PathBuf;

/// Errors raised while reading or persisting the status file
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Status file does not exist
    #[error("status file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Status file is not a JSON object
    #[error("invalid status document in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// IO error while reading the status file
    #[error("io error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error during the temp-file write or rename
    #[error("io error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create parse error for path
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create write error for path
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Check if the file was missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Message safe to show to API clients (no filesystem paths)
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "JSON file not found",
            Self::Parse { .. } => "JSON file is not a valid status document",
            Self::Read { .. } => "failed to read JSON file",
            Self::Write { .. } => "failed to write JSON file",
        }
    }
}

/// Rejected keys, values and documents
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Key is not in the registry
    #[error("invalid key was send: {0}")]
    UnknownKey(String),

    /// Value could not be coerced for the key
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    /// Required field missing from a request
    #[error("missing {0}")]
    MissingField(&'static str),

    /// Document would violate a structural invariant
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl ValidationError {
    /// Create invalid value error
    pub fn invalid_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Combined status core error
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Field expected by a read is absent from the document
    #[error("missing field in status document: {0}")]
    MissingPath(String),
}

impl StatusError {
    /// Check if error was caused by client input
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias for status operations
pub type StatusResult<T> = Result<T, StatusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_display() {
        let err = ValidationError::UnknownKey("bogus".to_string());
        assert_eq!(err.to_string(), "invalid key was send: bogus");
    }

    #[test]
    fn invalid_value_display() {
        let err = ValidationError::invalid_value("temperature", "abc");
        assert_eq!(err.to_string(), "invalid value for temperature: abc");
    }

    #[test]
    fn public_message_hides_path() {
        let err = StoreError::NotFound {
            path: PathBuf::from("/srv/secret/api.json"),
        };
        assert!(!err.public_message().contains("secret"));
        assert!(err.is_not_found());
    }

    #[test]
    fn error_conversions() {
        let err: StatusError = ValidationError::MissingField("value").into();
        assert!(err.is_client_error());

        let err: StatusError = StoreError::parse("api.json", "eof").into();
        assert!(matches!(err, StatusError::Store(StoreError::Parse { .. })));
        assert!(!err.is_client_error());
    }
}
