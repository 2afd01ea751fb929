//! Column sets and column namespaces.
//!
//! A [`ColumnSet`] is the ordered column list of a CTE: the base model's
//! columns in declaration order followed by the accumulator columns. The
//! same list feeds the CTE's alias list and both branch projections, which
//! keeps the two sides of the `UNION` the same arity.
//!
//! A [`SymbolTable`] maps each [`Scope`] to a [`Namespace`]: the alias a
//! reference is qualified with and the columns it may name.

use std::collections::{HashMap, HashSet};

use cteql_core::{CteqlError, CteqlResult, ValidationError};

use super::expressions::Scope;
use crate::model::ModelMeta;

/// The ordered columns of one CTE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    columns: Vec<String>,
    base_len: usize,
}

impl ColumnSet {
    /// Resolves base model columns followed by `accumulators`.
    ///
    /// # Errors
    ///
    /// Returns a validation error when an accumulator repeats or collides
    /// with a base column.
    pub fn resolve(model: &ModelMeta, accumulators: &[String]) -> CteqlResult<Self> {
        let mut columns: Vec<String> = model.columns().map(ToString::to_string).collect();
        let base_len = columns.len();
        let mut seen: HashSet<&str> = model.columns().collect();
        for acc in accumulators {
            if !seen.insert(acc.as_str()) {
                let code = if model.has_column(acc) {
                    "column_collision"
                } else {
                    "duplicate_column"
                };
                return Err(CteqlError::Validation(
                    ValidationError::new(
                        format!(
                            "CTE column '{acc}' is declared twice or shadows a column of model '{}'",
                            model.name
                        ),
                        code,
                    )
                    .with_param("column", acc.as_str())
                    .with_param("model", model.name.as_str()),
                ));
            }
            columns.push(acc.clone());
        }
        Ok(Self { columns, base_len })
    }

    /// Every column, base columns first.
    pub fn all(&self) -> &[String] {
        &self.columns
    }

    /// The base model columns.
    pub fn base(&self) -> &[String] {
        &self.columns[..self.base_len]
    }

    /// The accumulator columns.
    pub fn accumulators(&self) -> &[String] {
        &self.columns[self.base_len..]
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` when the set has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The 1-based position of `column`, as used by positional ORDER BY.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column).map(|i| i + 1)
    }
}

/// The alias and addressable columns of one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    alias: String,
    /// Attribute name to column name.
    columns: HashMap<String, String>,
    strict: bool,
}

impl Namespace {
    /// A model namespace that rejects columns the model does not declare.
    pub fn strict_model(alias: impl Into<String>, model: &ModelMeta) -> Self {
        Self::from_model(alias.into(), model, true)
    }

    /// A model namespace that maps known attributes to their columns and
    /// passes other names through unchecked.
    pub fn open_model(alias: impl Into<String>, model: &ModelMeta) -> Self {
        Self::from_model(alias.into(), model, false)
    }

    /// A strict namespace over bare column names.
    pub fn columns<I, S>(alias: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            alias: alias.into(),
            columns: columns
                .into_iter()
                .map(|c| {
                    let c = c.into();
                    (c.clone(), c)
                })
                .collect(),
            strict: true,
        }
    }

    fn from_model(alias: String, model: &ModelMeta, strict: bool) -> Self {
        let mut columns = HashMap::new();
        for field in &model.fields {
            columns.insert(field.column.clone(), field.column.clone());
            columns.insert(field.name.clone(), field.column.clone());
        }
        Self {
            alias,
            columns,
            strict,
        }
    }

    /// The alias references are qualified with.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Resolves a field name to its column.
    ///
    /// # Errors
    ///
    /// Returns [`CteqlError::UnknownColumn`] when a strict namespace does
    /// not know the field.
    pub fn resolve<'a>(&'a self, scope: Scope, field: &'a str) -> CteqlResult<&'a str> {
        match self.columns.get(field) {
            Some(column) => Ok(column.as_str()),
            None if self.strict => Err(CteqlError::unknown_column(scope.to_string(), field)),
            None => Ok(field),
        }
    }
}

/// Scope to namespace lookup for one compilation step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    scopes: HashMap<Scope, Namespace>,
}

impl SymbolTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `scope` to `namespace`.
    #[must_use]
    pub fn with(mut self, scope: Scope, namespace: Namespace) -> Self {
        self.scopes.insert(scope, namespace);
        self
    }

    /// Looks up the namespace bound to `scope`.
    pub fn get(&self, scope: Scope) -> Option<&Namespace> {
        self.scopes.get(&scope)
    }
}
