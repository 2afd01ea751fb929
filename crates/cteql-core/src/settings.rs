//! Settings for cteql.
//!
//! [`Settings`] holds the knobs that select how SQL is generated: the dialect
//! preset, the policy for pagination inside a CTE term the dialect cannot
//! express, and the logging configuration. Settings are plain values passed
//! to the compiler at call time; there is no global instance.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CteqlError;

/// What to do with ORDER BY / LIMIT / OFFSET on a CTE term when the dialect
/// cannot express them there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtePagination {
    /// Fail compilation with an unsupported-feature error.
    #[default]
    Reject,
    /// Omit the clauses and log a warning.
    Drop,
}

impl fmt::Display for CtePagination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::Drop => write!(f, "drop"),
        }
    }
}

impl FromStr for CtePagination {
    type Err = CteqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "drop" => Ok(Self::Drop),
            other => Err(CteqlError::ConfigurationError(format!(
                "Unknown CTE pagination policy '{other}' (expected 'reject' or 'drop')"
            ))),
        }
    }
}

/// The complete set of cteql settings.
///
/// # Examples
///
/// ```
/// use cteql_core::settings::{CtePagination, Settings};
///
/// let settings = Settings::default();
/// assert_eq!(settings.dialect, "sqlite");
/// assert_eq!(settings.cte_pagination, CtePagination::Reject);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,

    // ── SQL generation ───────────────────────────────────────────────

    /// The dialect preset name ("sqlite", "mysql", "postgres", "mssql").
    pub dialect: String,
    /// Policy for CTE pagination the dialect cannot express.
    pub cte_pagination: CtePagination,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level or filter directive (e.g. "info", "cteql_db=debug").
    pub log_level: String,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            dialect: "sqlite".to_string(),
            cte_pagination: CtePagination::Reject,
            log_level: "info".to_string(),
            extra: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.dialect, "sqlite");
        assert_eq!(s.cte_pagination, CtePagination::Reject);
        assert_eq!(s.log_level, "info");
        assert!(s.extra.is_empty());
    }

    #[test]
    fn test_cte_pagination_from_str() {
        assert_eq!("reject".parse::<CtePagination>().unwrap(), CtePagination::Reject);
        assert_eq!("DROP".parse::<CtePagination>().unwrap(), CtePagination::Drop);
        assert!("ignore".parse::<CtePagination>().is_err());
    }

    #[test]
    fn test_cte_pagination_serde() {
        let json = serde_json::to_string(&CtePagination::Drop).unwrap();
        assert_eq!(json, "\"drop\"");
        let parsed: CtePagination = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(parsed, CtePagination::Reject);
    }

    #[test]
    fn test_settings_serialization_roundtrip() {
        let mut s = Settings::default();
        s.dialect = "postgres".to_string();
        let json = serde_json::to_string(&s).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.dialect, "postgres");
    }
}
