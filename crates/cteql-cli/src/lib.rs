//! # cteql-cli
//!
//! Command-line front end for cteql.
//!
//! - **Command framework** - [`ManagementCommand`] and [`CommandRegistry`]
//! - **Built-in commands** - `sqlcte` (print SQL for a query document),
//!   `dialects` (capability table), `check` (schema and settings checks)
//!
//! ## Quick Start
//!
//! ```rust
//! use cteql_cli::command::CommandRegistry;
//! use cteql_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! assert_eq!(registry.list_commands(), vec!["check", "dialects", "sqlcte"]);
//! ```

// These clippy lints are intentionally allowed:
// - result_large_err: CteqlError is the crate-wide error type
// - doc_markdown: backtick requirements for documentation items are too strict
// - missing_const_for_fn: some functions may gain runtime logic later
#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]

pub mod command;
pub mod commands;

pub use command::{CommandRegistry, ManagementCommand};
