//! # cteql
//!
//! Dialect-aware SQL generation for recursive common table expressions.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on `cteql`
//! to get everything, or on individual crates for finer-grained control.
//!
//! ```
//! use cteql::prelude::*;
//!
//! let mut registry = ModelRegistry::new();
//! registry
//!     .register(ModelMeta::new("user", "users").field("amount", FieldType::IntegerField))
//!     .unwrap();
//! registry.has_one("user", "user", "report").unwrap();
//!
//! let query = parse_select("user", &cteql::serde_json::json!({
//!     "cte": {"name": "a", "initial": {"where": {"id": 1}}, "recursive": {"next": "report"}}
//! }))
//! .unwrap();
//! let sql = SqlCompiler::new(Dialect::postgres()).compile_select(&registry, &query).unwrap();
//! assert!(sql.starts_with("WITH RECURSIVE a("));
//! ```

/// Error types, settings, and logging.
pub use cteql_core as core;

/// Models, dialects, and the CTE compiler.
#[cfg(feature = "db")]
pub use cteql_db as db;

/// Command framework and built-in commands.
#[cfg(feature = "cli")]
pub use cteql_cli as cli;

/// Re-exported for building query documents.
pub use serde_json;

/// Re-exported for instrumenting callers the way cteql logs.
pub use tracing;

/// Re-exported for installing a custom subscriber instead of
/// [`crate::core::logging::setup_logging`].
pub use tracing_subscriber;

/// The types most programs need.
pub mod prelude {
    pub use cteql_core::{CtePagination, CteqlError, CteqlResult, Settings};

    #[cfg(feature = "db")]
    pub use cteql_db::{
        parse_select, CteSpec, Dialect, Expression, FieldType, Include, InitialBranch, ModelMeta,
        ModelRegistry, OrderBy, RecursiveBranch, SelectQuery, SqlCompiler, Q,
    };
}
