//! Statement assembly.
//!
//! [`SqlCompiler`] compiles a [`SelectQuery`] into one SQL statement. With
//! no CTEs the statement is a plain `SELECT * FROM table AS alias`; with CTEs
//! each one is compiled by the [`CteCompiler`], the clauses are joined into
//! one `WITH` preamble, and the outer `SELECT` reads the last CTE under the
//! query model's alias.

use std::collections::HashSet;

use cteql_core::logging::compile_span;
use cteql_core::{CtePagination, CteqlError, CteqlResult, Settings, ValidationError};

use super::columns::{Namespace, SymbolTable};
use super::cte::{CompiledCte, CteCompiler, CteSpec};
use super::expressions::{ExpressionCompiler, Scope};
use super::lookups::Q;
use crate::dialect::{Dialect, LimitSyntax};
use crate::model::ModelMeta;
use crate::registry::ModelRegistry;

/// A column ordering direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The column to order by.
    pub column: String,
    /// Whether to sort in descending order.
    pub descending: bool,
    /// Whether to put nulls first or last.
    pub nulls_first: Option<bool>,
}

impl OrderBy {
    /// Creates an ascending order.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
            nulls_first: None,
        }
    }

    /// Creates a descending order.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
            nulls_first: None,
        }
    }

    /// Renders `target ASC|DESC [NULLS FIRST|LAST]`.
    pub fn render(&self, target: &str) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        match self.nulls_first {
            Some(true) => format!("{target} {direction} NULLS FIRST"),
            Some(false) => format!("{target} {direction} NULLS LAST"),
            None => format!("{target} {direction}"),
        }
    }
}

/// Zero, one or many CTEs; a single spec is treated as a one-element list.
#[derive(Debug, Clone, PartialEq)]
pub enum CteInput {
    /// A single CTE.
    One(Box<CteSpec>),
    /// A list of CTEs, possibly empty.
    Many(Vec<CteSpec>),
}

impl CteInput {
    /// Normalizes to a list.
    pub fn into_vec(self) -> Vec<CteSpec> {
        match self {
            Self::One(spec) => vec![*spec],
            Self::Many(specs) => specs,
        }
    }
}

impl From<CteSpec> for CteInput {
    fn from(spec: CteSpec) -> Self {
        Self::One(Box::new(spec))
    }
}

impl From<Vec<CteSpec>> for CteInput {
    fn from(specs: Vec<CteSpec>) -> Self {
        Self::Many(specs)
    }
}

/// A SELECT over one model, optionally reading from CTEs.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    /// The queried model; its name is the outer alias.
    pub model: String,
    /// CTEs in preamble order; the outer query reads the last one.
    pub ctes: Vec<CteSpec>,
    /// Outer WHERE conditions.
    pub filter: Option<Q>,
    /// Outer ordering.
    pub order: Vec<OrderBy>,
    /// Outer row limit.
    pub limit: Option<u64>,
    /// Outer row offset.
    pub offset: Option<u64>,
}

impl SelectQuery {
    /// Creates `SELECT * FROM model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ctes: Vec::new(),
            filter: None,
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Replaces the CTE list.
    #[must_use]
    pub fn with_cte(mut self, ctes: impl Into<CteInput>) -> Self {
        self.ctes = ctes.into().into_vec();
        self
    }

    /// Appends a CTE.
    #[must_use]
    pub fn cte(mut self, spec: CteSpec) -> Self {
        self.ctes.push(spec);
        self
    }

    /// Adds an outer WHERE condition.
    #[must_use]
    pub fn filter(mut self, q: Q) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing & q,
            None => q,
        });
        self
    }

    /// Adds an outer ordering.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    /// Sets the outer row limit.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the outer row offset.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Compiler policies not tied to a dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// What to do with CTE pagination the dialect cannot place.
    pub cte_pagination: CtePagination,
}

impl CompileOptions {
    /// Reads the options from settings.
    pub const fn from_settings(settings: &Settings) -> Self {
        Self {
            cte_pagination: settings.cte_pagination,
        }
    }
}

/// Compiles queries into SQL text for one dialect.
///
/// The compiler holds no per-statement state; one instance may serve any
/// number of threads.
#[derive(Debug, Clone)]
pub struct SqlCompiler {
    dialect: Dialect,
    options: CompileOptions,
}

impl SqlCompiler {
    /// Creates a compiler for the given dialect with default options.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            options: CompileOptions::default(),
        }
    }

    /// Replaces the compile options.
    #[must_use]
    pub const fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds a compiler from the dialect and pagination policy in settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown dialect names.
    pub fn from_settings(settings: &Settings) -> CteqlResult<Self> {
        Ok(Self::new(Dialect::from_name(&settings.dialect)?)
            .with_options(CompileOptions::from_settings(settings)))
    }

    /// The target dialect.
    pub const fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// The compile options.
    pub const fn options(&self) -> CompileOptions {
        self.options
    }

    /// Compiles a SELECT statement, terminated with `;`.
    ///
    /// # Errors
    ///
    /// Returns the first error found; no partial SQL is ever returned.
    pub fn compile_select(&self, registry: &ModelRegistry, query: &SelectQuery) -> CteqlResult<String> {
        let span = compile_span(&query.model, self.dialect.name());
        let _guard = span.enter();

        let model = registry.model(&query.model)?;
        let alias = model.name.as_str();
        let compiled = self.compile_ctes(registry, model, &query.ctes)?;

        let mut sql = String::new();
        let (projection, source) = match compiled.last() {
            None => ("*".to_string(), self.dialect.quote(&model.db_table)?),
            Some(last) => {
                let keyword = if self.dialect.recursive_keyword && compiled.iter().any(|c| c.recursive) {
                    "WITH RECURSIVE "
                } else {
                    "WITH "
                };
                sql.push_str(keyword);
                sql.push_str(&compiled.iter().map(|c| c.sql.as_str()).collect::<Vec<_>>().join(", "));
                sql.push(' ');
                (self.outer_projection(last)?, self.dialect.quote(&last.name)?)
            }
        };
        sql.push_str(&format!("SELECT {projection} FROM {source} AS {}", self.dialect.quote(alias)?));

        let symbols = SymbolTable::new().with(Scope::Model, Namespace::open_model(alias, model));
        let expressions = ExpressionCompiler::new(&self.dialect, &symbols);
        if let Some(filter) = &query.filter {
            if let Some(clause) = filter.compile(&expressions, Scope::Model)? {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }
        if let Some(order) = self.outer_order(model, query)? {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        if let Some(limit) = self.dialect.limit_clause(query.limit, query.offset) {
            sql.push(' ');
            sql.push_str(&limit);
        }
        sql.push(';');

        tracing::trace!(sql = %sql, "compiled statement");
        Ok(sql)
    }

    fn compile_ctes(
        &self,
        registry: &ModelRegistry,
        model: &ModelMeta,
        specs: &[CteSpec],
    ) -> CteqlResult<Vec<CompiledCte>> {
        let compiler = CteCompiler::new(&self.dialect, registry, self.options.cte_pagination);
        let mut names = HashSet::new();
        let mut compiled = Vec::with_capacity(specs.len());
        for spec in specs {
            if !names.insert(spec.name.as_str()) {
                return Err(CteqlError::Validation(
                    ValidationError::new(
                        format!("CTE name '{}' is used more than once", spec.name),
                        "duplicate_name",
                    )
                    .with_param("cte", spec.name.as_str()),
                ));
            }
            compiled.push(compiler.compile(spec, model)?);
        }
        Ok(compiled)
    }

    /// `*` when nothing is hidden, else base columns plus exposed accumulators.
    fn outer_projection(&self, cte: &CompiledCte) -> CteqlResult<String> {
        if cte.projects_all() {
            return Ok("*".to_string());
        }
        let visible = cte.columns.base().iter().chain(
            cte.columns
                .accumulators()
                .iter()
                .filter(|acc| cte.exposed.contains(acc)),
        );
        Ok(visible
            .map(|c| self.dialect.quote(c))
            .collect::<CteqlResult<Vec<_>>>()?
            .join(", "))
    }

    fn outer_order(&self, model: &ModelMeta, query: &SelectQuery) -> CteqlResult<Option<String>> {
        let alias = model.name.as_str();
        if query.order.is_empty() {
            let paginated = query.limit.is_some() || query.offset.is_some();
            if paginated && self.dialect.limit_syntax == LimitSyntax::OffsetFetch {
                return Ok(Some(self.dialect.quote_qualified(alias, model.pk_column())?));
            }
            return Ok(None);
        }
        let terms = query
            .order
            .iter()
            .map(|o| {
                self.dialect
                    .quote_qualified(alias, model.column_for(&o.column))
                    .map(|target| o.render(&target))
            })
            .collect::<CteqlResult<Vec<_>>>()?;
        Ok(Some(terms.join(", ")))
    }
}
