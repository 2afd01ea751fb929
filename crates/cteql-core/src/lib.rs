//! # cteql-core
//!
//! Core types shared by every cteql crate: the error taxonomy raised by the
//! SQL compiler, the settings that select a dialect and pagination policy, and
//! the tracing-based logging setup. This crate has no other cteql dependencies.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Compiler settings with sensible defaults
//! - [`settings_loader`] - Loading settings from TOML/JSON files and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{CteqlError, CteqlResult, ValidationError};
pub use settings::{CtePagination, Settings};
