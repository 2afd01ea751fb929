//! # cteql-db
//!
//! Model metadata, SQL dialects, and the recursive common-table-expression
//! compiler for cteql.
//!
//! ## Architecture
//!
//! A [`ModelRegistry`] holds the models and their named associations. A
//! [`SelectQuery`](query::SelectQuery) describes one outer SELECT over a model
//! plus any number of CTEs, each with a seed branch and an optional recursive
//! branch that walks an association one generation at a time. The
//! [`SqlCompiler`](query::SqlCompiler) turns the query into a single SQL
//! string for a [`Dialect`]. Queries can be built with the typed builders or
//! parsed from a JSON document with [`parse_select`](query::parse_select).
//!
//! ## Module Overview
//!
//! - [`model`] - [`ModelMeta`]: table, fields and primary key
//! - [`fields`] - Field definitions ([`FieldDef`](fields::FieldDef)) and types
//! - [`registry`] - Models and associations
//! - [`dialect`] - Quoting, literals, and CTE/pagination capabilities per backend
//! - [`value`] - The backend-agnostic [`Value`](value::Value) enum
//! - [`query`] - Filters, expressions, joins, CTEs and the outer compiler

// These clippy lints are intentionally allowed for the compiler crate:
// - result_large_err: CteqlError is the crate error type and is used throughout
// - format_push_string: format! with push_str is clearer than write! for SQL generation
// - doc_markdown: backtick requirements for documentation items are too strict
// - return_self_not_must_use: builder pattern methods are self-documenting
#![allow(clippy::result_large_err)]
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::module_name_repetitions)]

pub mod dialect;
pub mod fields;
pub mod model;
pub mod query;
pub mod registry;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use dialect::{BooleanLiteral, DatabaseBackendType, Dialect, LimitSyntax, StringEscape};
pub use fields::{FieldDef, FieldType};
pub use model::ModelMeta;
pub use query::{
    parse_select, ArithmeticOp, ComparisonOp, CteSpec, Expression, Include, InitialBranch,
    OrderBy, RecursiveBranch, Scope, SelectQuery, SqlCompiler, Q,
};
pub use registry::{Association, AssociationKind, ModelRegistry};
pub use value::Value;
