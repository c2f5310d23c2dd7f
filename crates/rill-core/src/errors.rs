//! Unified error type for Rill construction and configuration
//!
//! Calculation outcomes never travel through this type. They are carried by
//! [`ValueOrError`](crate::ValueOrError) with a
//! [`CalculationError`](crate::CalculationError) payload. `RillError` covers
//! contract violations that are detected when factories, properties, or
//! configuration are built, and are not recoverable at runtime.

/// Unified error type for all Rill construction-time operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RillError {
    /// Invalid input or argument
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// An async runtime was required but none is available
    #[error("No async runtime: {message}")]
    NoRuntime {
        /// Error message describing where a runtime was needed
        message: String,
    },

    /// Operation attempted on a disposed property or factory
    #[error("Disposed: {message}")]
    Disposed {
        /// Error message describing the disposed resource
        message: String,
    },

    /// Configuration could not be loaded or failed validation
    #[error("Config error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl RillError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a missing-runtime error
    pub fn no_runtime(message: impl Into<String>) -> Self {
        Self::NoRuntime {
            message: message.into(),
        }
    }

    /// Create a disposed-resource error
    pub fn disposed(message: impl Into<String>) -> Self {
        Self::Disposed {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Standard Result type for Rill operations
pub type Result<T> = std::result::Result<T, RillError>;

impl From<std::io::Error> for RillError {
    fn from(err: std::io::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<toml::de::Error> for RillError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RillError::invalid("debounce too long");
        assert!(matches!(err, RillError::Invalid { .. }));
        assert_eq!(err.to_string(), "Invalid: debounce too long");
    }

    #[test]
    fn test_io_error_maps_to_config() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "rill.toml missing");
        let err = RillError::from(io_err);
        assert!(matches!(err, RillError::Config { .. }));
        assert!(err.to_string().contains("rill.toml missing"));
    }

    #[test]
    fn test_no_runtime_display() {
        let err = RillError::no_runtime("async calculated property");
        assert_eq!(err.to_string(), "No async runtime: async calculated property");
    }
}
