//! Field definitions and types for model metadata.
//!
//! This module provides the [`FieldDef`] struct and [`FieldType`] enum that
//! describe a model's columns. The compiler only reads them: the ordered
//! column list seeds every CTE column set.

pub mod types;

pub use types::{FieldDef, FieldType};
