//! Core error types for cteql.
//!
//! Every failure of the SQL compiler is raised synchronously, before any SQL
//! text is returned. [`CteqlError`] names the offending CTE, column,
//! association, or operator so that a rejected query can be traced
//! back to its source. None of these errors are transient, so none are
//! retryable.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// A malformed query: empty or duplicate CTE names, overlapping
/// column namespaces, misplaced references, and similar caller mistakes.
///
/// # Examples
///
/// ```
/// use cteql_core::error::ValidationError;
///
/// let err = ValidationError::new("CTE name must not be empty.", "empty_name");
/// assert_eq!(err.to_string(), "CTE name must not be empty.");
///
/// let err = ValidationError::new("Duplicate CTE name.", "duplicate_name")
///     .with_param("cte", "a");
/// assert_eq!(err.params.get("cte").map(String::as_str), Some("a"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the kind of failure (e.g. "duplicate_name").
    pub code: String,
    /// Names of the offending items (e.g. `cte` => `a`, `column` => `total`).
    pub params: HashMap<String, String>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: HashMap::new(),
        }
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for cteql.
///
/// The compilation variants (`Validation` through `UnsupportedFeature`) form
/// the compiler's error taxonomy. The remaining variants cover settings and
/// document loading.
#[derive(Error, Debug)]
pub enum CteqlError {
    // ── Compilation ──────────────────────────────────────────────────

    /// The query is malformed.
    #[error("Validation error: {0}")]
    Validation(ValidationError),

    /// An association alias is not declared on the model.
    #[error("Unknown association '{association}' on model '{model}'")]
    UnknownAssociation {
        /// The model the association was looked up on.
        model: String,
        /// The association alias.
        association: String,
    },

    /// A column reference does not resolve in its namespace.
    #[error("Unknown column '{column}' in {scope} scope")]
    UnknownColumn {
        /// The namespace the column was resolved against ("model", "cte", ...).
        scope: String,
        /// The column name.
        column: String,
    },

    /// An operator symbol is not part of the expression DSL.
    #[error("Unsupported operator '{0}'")]
    UnsupportedOperator(String),

    /// The dialect lacks a capability the query requires.
    #[error("Dialect '{dialect}' does not support {feature}")]
    UnsupportedFeature {
        /// The dialect name.
        dialect: String,
        /// The missing capability.
        feature: String,
    },

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// A document could not be parsed or rendered.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CteqlError {
    /// Shorthand for a [`CteqlError::Validation`] without params.
    pub fn validation(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(message, code))
    }

    /// Shorthand for [`CteqlError::UnknownColumn`].
    pub fn unknown_column(scope: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            scope: scope.into(),
            column: column.into(),
        }
    }

    /// Shorthand for [`CteqlError::UnsupportedFeature`].
    pub fn unsupported_feature(dialect: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            dialect: dialect.into(),
            feature: feature.into(),
        }
    }

    /// Returns a stable, machine-readable code for this error.
    ///
    /// - `Validation` -> the validation error's own code
    /// - `UnknownAssociation` -> `unknown_association`
    /// - `UnknownColumn` -> `unknown_column`
    /// - `UnsupportedOperator` -> `unsupported_operator`
    /// - `UnsupportedFeature` -> `unsupported_feature`
    /// - everything else -> `configuration`, `serialization`, or `io`
    pub fn code(&self) -> &str {
        match self {
            Self::Validation(err) => &err.code,
            Self::UnknownAssociation { .. } => "unknown_association",
            Self::UnknownColumn { .. } => "unknown_column",
            Self::UnsupportedOperator(_) => "unsupported_operator",
            Self::UnsupportedFeature { .. } => "unsupported_feature",
            Self::ConfigurationError(_) => "configuration",
            Self::SerializationError(_) => "serialization",
            Self::IoError(_) => "io",
        }
    }

    /// Returns `true` if the error stems from the compiled query
    /// rather than from loading settings or documents.
    pub const fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnknownAssociation { .. }
                | Self::UnknownColumn { .. }
                | Self::UnsupportedOperator(_)
                | Self::UnsupportedFeature { .. }
        )
    }
}

impl From<ValidationError> for CteqlError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

/// A convenience type alias for `Result<T, CteqlError>`.
pub type CteqlResult<T> = Result<T, CteqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("CTE name must not be empty.", "empty_name");
        assert_eq!(err.to_string(), "CTE name must not be empty.");
    }

    #[test]
    fn test_validation_error_with_param() {
        let err = ValidationError::new("Duplicate CTE name.", "duplicate_name").with_param("cte", "a");
        assert_eq!(err.params.get("cte").unwrap(), "a");
    }

    #[test]
    fn test_error_display_carries_names() {
        let err = CteqlError::UnknownAssociation {
            model: "user".into(),
            association: "manager".into(),
        };
        assert_eq!(err.to_string(), "Unknown association 'manager' on model 'user'");

        let err = CteqlError::unknown_column("cte", "total");
        assert_eq!(err.to_string(), "Unknown column 'total' in cte scope");

        let err = CteqlError::UnsupportedOperator("$foo".into());
        assert_eq!(err.to_string(), "Unsupported operator '$foo'");

        let err = CteqlError::unsupported_feature("postgres", "LIMIT in a recursive CTE term");
        assert_eq!(
            err.to_string(),
            "Dialect 'postgres' does not support LIMIT in a recursive CTE term"
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CteqlError::validation("x", "empty_name").code(), "empty_name");
        assert_eq!(CteqlError::unknown_column("model", "x").code(), "unknown_column");
        assert_eq!(CteqlError::UnsupportedOperator("$x".into()).code(), "unsupported_operator");
        assert_eq!(CteqlError::unsupported_feature("d", "f").code(), "unsupported_feature");
        assert_eq!(CteqlError::ConfigurationError("x".into()).code(), "configuration");
    }

    #[test]
    fn test_is_compile_error() {
        assert!(CteqlError::validation("x", "y").is_compile_error());
        assert!(CteqlError::unknown_column("cte", "x").is_compile_error());
        assert!(!CteqlError::ConfigurationError("x".into()).is_compile_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: CteqlError = io_err.into();
        assert_eq!(err.code(), "io");
        assert!(err.to_string().contains("file missing"));
    }
}
