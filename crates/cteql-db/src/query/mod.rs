//! Query building and compilation.
//!
//! - [`lookups`] - Q objects for filter trees
//! - [`expressions`] - scoped column references, arithmetic and comparisons
//! - [`columns`] - CTE column lists and the per-branch symbol tables
//! - [`joins`] - recursive self-joins and `include` joins
//! - [`cte`] - one common table expression: seed, recursive step, pagination
//! - [`compiler`] - the outer SELECT and the `WITH` clause
//! - [`document`] - the JSON query document front end

pub mod columns;
pub mod compiler;
pub mod cte;
pub mod document;
pub mod expressions;
pub mod joins;
pub mod lookups;

pub use compiler::{CompileOptions, CteInput, OrderBy, SelectQuery, SqlCompiler};
pub use cte::{CompiledCte, CteCompiler, CteSpec, InitialBranch, RecursiveBranch};
pub use document::parse_select;
pub use expressions::{ArithmeticOp, ComparisonOp, Expression, Scope};
pub use joins::{Include, JoinType};
pub use lookups::Q;
