//! Recursive common table expressions.
//!
//! A [`CteSpec`] describes one CTE: a seed query ([`InitialBranch`]), an
//! optional recursive step ([`RecursiveBranch`]) that follows an association
//! from the previous generation, accumulator columns carried across
//! generations, and ordering/pagination for the last term. [`CteCompiler`]
//! turns a spec into the `name(cols) AS (...)` clause of a `WITH` preamble.
//!
//! # Examples
//!
//! ```
//! use cteql_db::query::cte::{CteSpec, InitialBranch, RecursiveBranch};
//! use cteql_db::query::expressions::Expression;
//! use cteql_db::query::lookups::Q;
//!
//! // Walk the `report` chain from user3, summing `amount` into `total`.
//! let cte = CteSpec::new("a")
//!     .accumulator("total")
//!     .initial(
//!         InitialBranch::new()
//!             .filter(Q::eq("username", "user3"))
//!             .assign("total", Expression::model("amount")),
//!     )
//!     .recursive(
//!         RecursiveBranch::new("report")
//!             .assign("total", Expression::cte("total") + Expression::model("amount"))
//!             .cte_filter(Q::lt("total", 500)),
//!     );
//! assert!(cte.is_recursive());
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use cteql_core::{CtePagination, CteqlError, CteqlResult, ValidationError};

use super::columns::{ColumnSet, Namespace, SymbolTable};
use super::compiler::OrderBy;
use super::expressions::{Expression, ExpressionCompiler, Scope};
use super::joins::{Include, JoinCompiler};
use super::lookups::Q;
use crate::dialect::Dialect;
use crate::model::ModelMeta;
use crate::registry::ModelRegistry;

/// CTE names are emitted unquoted after `WITH`.
static CTE_NAME: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// The seed query of a CTE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitialBranch {
    /// WHERE conditions on the base model.
    pub filter: Option<Q>,
    /// Accumulator assignments; every accumulator needs one.
    pub assignments: Vec<(String, Expression)>,
    /// Joins off the base row.
    pub include: Vec<Include>,
}

impl InitialBranch {
    /// Creates an unfiltered seed query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a WHERE condition.
    #[must_use]
    pub fn filter(mut self, q: Q) -> Self {
        self.filter = Some(and_with(self.filter.take(), q));
        self
    }

    /// Sets the seed value of an accumulator.
    #[must_use]
    pub fn assign(mut self, column: impl Into<String>, expr: Expression) -> Self {
        self.assignments.push((column.into(), expr));
        self
    }

    /// Joins an association off the base row.
    #[must_use]
    pub fn include(mut self, include: Include) -> Self {
        self.include.push(include);
        self
    }
}

/// The recursive step of a CTE.
#[derive(Debug, Clone, PartialEq)]
pub struct RecursiveBranch {
    /// The association followed from one generation to the next.
    pub next: String,
    /// Accumulator assignments; missing ones carry the previous value.
    pub assignments: Vec<(String, Expression)>,
    /// Conditions on the joined row.
    pub model_filter: Option<Q>,
    /// Conditions on the previous CTE row's accumulators.
    pub cte_filter: Option<Q>,
    /// Joins off the joined row.
    pub include: Vec<Include>,
}

impl RecursiveBranch {
    /// Creates a step following `next`.
    pub fn new(next: impl Into<String>) -> Self {
        Self {
            next: next.into(),
            assignments: Vec::new(),
            model_filter: None,
            cte_filter: None,
            include: Vec::new(),
        }
    }

    /// Sets the next value of an accumulator.
    #[must_use]
    pub fn assign(mut self, column: impl Into<String>, expr: Expression) -> Self {
        self.assignments.push((column.into(), expr));
        self
    }

    /// Adds a condition on the joined row.
    #[must_use]
    pub fn model_filter(mut self, q: Q) -> Self {
        self.model_filter = Some(and_with(self.model_filter.take(), q));
        self
    }

    /// Adds a condition on the previous CTE row.
    #[must_use]
    pub fn cte_filter(mut self, q: Q) -> Self {
        self.cte_filter = Some(and_with(self.cte_filter.take(), q));
        self
    }

    /// Joins an association off the joined row.
    #[must_use]
    pub fn include(mut self, include: Include) -> Self {
        self.include.push(include);
        self
    }
}

fn and_with(existing: Option<Q>, q: Q) -> Q {
    match existing {
        Some(existing) => existing & q,
        None => q,
    }
}

/// One common table expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CteSpec {
    /// The CTE name; a plain identifier, unique among siblings.
    pub name: String,
    /// The model whose columns seed the column set; defaults to the query's
    /// model.
    pub base_model: Option<String>,
    /// Extra columns carried across generations.
    pub accumulator_columns: Vec<String>,
    /// The seed query.
    pub initial: InitialBranch,
    /// The recursive step, if any.
    pub recursive: Option<RecursiveBranch>,
    /// `UNION` when `true`, `UNION ALL` otherwise.
    pub unique: bool,
    /// Ordering of the last term, by column name.
    pub order: Vec<OrderBy>,
    /// Row limit of the last term.
    pub limit: Option<u64>,
    /// Row offset of the last term.
    pub offset: Option<u64>,
    /// Accumulators the outer query projects.
    pub exposed_accumulator_columns: Vec<String>,
}

impl CteSpec {
    /// Creates a CTE with an unfiltered seed and no recursion.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_model: None,
            accumulator_columns: Vec::new(),
            initial: InitialBranch::new(),
            recursive: None,
            unique: true,
            order: Vec::new(),
            limit: None,
            offset: None,
            exposed_accumulator_columns: Vec::new(),
        }
    }

    /// Seeds the column set from `model` instead of the query's model.
    #[must_use]
    pub fn base_model(mut self, model: impl Into<String>) -> Self {
        self.base_model = Some(model.into());
        self
    }

    /// Declares an accumulator column.
    #[must_use]
    pub fn accumulator(mut self, column: impl Into<String>) -> Self {
        self.accumulator_columns.push(column.into());
        self
    }

    /// Sets the seed query.
    #[must_use]
    pub fn initial(mut self, initial: InitialBranch) -> Self {
        self.initial = initial;
        self
    }

    /// Sets the recursive step.
    #[must_use]
    pub fn recursive(mut self, recursive: RecursiveBranch) -> Self {
        self.recursive = Some(recursive);
        self
    }

    /// Sets whether generations are de-duplicated.
    #[must_use]
    pub const fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Orders the last term.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    /// Limits the last term.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Offsets the last term.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Projects an accumulator in the outer query.
    #[must_use]
    pub fn expose(mut self, column: impl Into<String>) -> Self {
        self.exposed_accumulator_columns.push(column.into());
        self
    }

    /// Returns `true` if the CTE has a recursive step.
    pub const fn is_recursive(&self) -> bool {
        self.recursive.is_some()
    }

    fn has_pagination(&self) -> bool {
        !self.order.is_empty() || self.limit.is_some() || self.offset.is_some()
    }
}

/// A compiled CTE clause with the metadata the outer query needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCte {
    /// The CTE name.
    pub name: String,
    /// `name(cols) AS (...)`.
    pub sql: String,
    /// The CTE's columns.
    pub columns: ColumnSet,
    /// Accumulators projected by the outer query.
    pub exposed: Vec<String>,
    /// Whether the clause references itself.
    pub recursive: bool,
}

impl CompiledCte {
    /// Returns `true` when every accumulator is exposed, so `*` selects
    /// exactly the projected columns.
    pub fn projects_all(&self) -> bool {
        self.columns
            .accumulators()
            .iter()
            .all(|acc| self.exposed.contains(acc))
    }
}

/// Compiles [`CteSpec`]s for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct CteCompiler<'a> {
    dialect: &'a Dialect,
    registry: &'a ModelRegistry,
    pagination: CtePagination,
}

impl<'a> CteCompiler<'a> {
    /// Creates a CTE compiler.
    pub const fn new(dialect: &'a Dialect, registry: &'a ModelRegistry, pagination: CtePagination) -> Self {
        Self {
            dialect,
            registry,
            pagination,
        }
    }

    /// Compiles one CTE whose base model defaults to `default_model`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed specs, unknown association,
    /// column and operator errors from the parts, and
    /// [`CteqlError::UnsupportedFeature`] when the dialect cannot express the
    /// CTE.
    pub fn compile(&self, spec: &CteSpec, default_model: &ModelMeta) -> CteqlResult<CompiledCte> {
        validate_name(&spec.name)?;
        let base = match &spec.base_model {
            Some(name) => self.registry.model(name)?,
            None => default_model,
        };
        let columns = ColumnSet::resolve(base, &spec.accumulator_columns)?;
        let accumulators = columns.accumulators();

        check_assignments(&spec.name, "initial", &spec.initial.assignments, accumulators)?;
        for acc in accumulators {
            if !spec.initial.assignments.iter().any(|(c, _)| c == acc) {
                return Err(CteqlError::Validation(
                    ValidationError::new(
                        format!("CTE '{}' does not seed accumulator '{acc}'", spec.name),
                        "missing_assignment",
                    )
                    .with_param("cte", spec.name.as_str())
                    .with_param("column", acc.as_str()),
                ));
            }
        }
        for exposed in &spec.exposed_accumulator_columns {
            if !accumulators.contains(exposed) {
                return Err(CteqlError::Validation(
                    ValidationError::new(
                        format!("CTE '{}' has no accumulator '{exposed}' to expose", spec.name),
                        "unknown_accumulator",
                    )
                    .with_param("cte", spec.name.as_str())
                    .with_param("column", exposed.as_str()),
                ));
            }
        }

        let mut sql = self.initial_select(spec, base, &columns)?;
        if let Some(recursive) = &spec.recursive {
            if !self.dialect.supports_recursive_cte {
                return Err(CteqlError::unsupported_feature(
                    self.dialect.name(),
                    "recursive common table expressions",
                ));
            }
            check_assignments(&spec.name, "recursive", &recursive.assignments, accumulators)?;
            let step = self.recursive_select(spec, recursive, base, &columns)?;
            let union = if spec.unique { "UNION" } else { "UNION ALL" };
            sql = format!("{sql} {union} {step}");
        }
        if let Some(tail) = self.pagination_tail(spec, base, &columns)? {
            sql.push(' ');
            sql.push_str(&tail);
        }

        let alias_list = columns
            .all()
            .iter()
            .map(|c| self.dialect.quote(c))
            .collect::<CteqlResult<Vec<_>>>()?
            .join(",");

        tracing::debug!(
            cte = %spec.name,
            columns = columns.len(),
            recursive = spec.is_recursive(),
            "compiled common table expression"
        );

        Ok(CompiledCte {
            name: spec.name.clone(),
            sql: format!("{}({alias_list}) AS ({sql})", spec.name),
            exposed: spec.exposed_accumulator_columns.clone(),
            recursive: spec.is_recursive(),
            columns,
        })
    }

    fn initial_select(&self, spec: &CteSpec, base: &ModelMeta, columns: &ColumnSet) -> CteqlResult<String> {
        let alias = base.name.as_str();
        let strict = SymbolTable::new().with(Scope::Model, Namespace::strict_model(alias, base));
        let assignments = ExpressionCompiler::new(self.dialect, &strict);
        // Seed filters may name attributes the model does not declare.
        let open = SymbolTable::new().with(Scope::Model, Namespace::open_model(alias, base));
        let filters = ExpressionCompiler::new(self.dialect, &open);

        let qualify = !spec.initial.include.is_empty();
        let mut projection = Vec::with_capacity(columns.len());
        for column in columns.base() {
            projection.push(if qualify {
                self.dialect.quote_qualified(alias, column)?
            } else {
                self.dialect.quote(column)?
            });
        }
        for acc in columns.accumulators() {
            let expr = assignment(&spec.initial.assignments, acc).ok_or_else(|| {
                CteqlError::validation(format!("Accumulator '{acc}' has no seed"), "missing_assignment")
            })?;
            projection.push(assignments.compile(expr)?);
        }

        let mut sql = format!(
            "SELECT {} FROM {} AS {}",
            projection.join(", "),
            self.dialect.quote(&base.db_table)?,
            self.dialect.quote(alias)?,
        );
        let joins = JoinCompiler::new(self.dialect, self.registry);
        for join in joins.include_joins(base, alias, &[spec.name.as_str()], &spec.initial.include)? {
            sql.push(' ');
            sql.push_str(&join);
        }
        if let Some(filter) = &spec.initial.filter {
            if let Some(clause) = filter.compile(&filters, Scope::Model)? {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }
        Ok(sql)
    }

    fn recursive_select(
        &self,
        spec: &CteSpec,
        recursive: &RecursiveBranch,
        base: &ModelMeta,
        columns: &ColumnSet,
    ) -> CteqlResult<String> {
        let association = self.registry.association(&base.name, &recursive.next)?;
        let target = self.registry.model(&association.target)?;
        if let Some(missing) = columns.base().iter().find(|c| !target.has_column(c)) {
            return Err(CteqlError::Validation(
                ValidationError::new(
                    format!(
                        "Association '{}' targets model '{}', which lacks column '{missing}' of the CTE",
                        recursive.next, target.name
                    ),
                    "incompatible_target",
                )
                .with_param("association", recursive.next.as_str())
                .with_param("column", missing.as_str()),
            ));
        }

        let joined = association.name.as_str();
        if joined == spec.name {
            return Err(CteqlError::Validation(
                ValidationError::new(
                    format!("CTE '{}' has the same name as its next association", spec.name),
                    "alias_collision",
                )
                .with_param("cte", spec.name.as_str())
                .with_param("alias", joined),
            ));
        }
        let model_namespace = Namespace::strict_model(joined, target);
        let cte_namespace =
            Namespace::columns(spec.name.as_str(), columns.accumulators().iter().map(String::as_str));
        let symbols = SymbolTable::new()
            .with(Scope::Model, model_namespace.clone())
            .with(Scope::Cte, cte_namespace.clone());
        let expressions = ExpressionCompiler::new(self.dialect, &symbols);
        let model_only = SymbolTable::new().with(Scope::Model, model_namespace);
        let cte_only = SymbolTable::new().with(Scope::Cte, cte_namespace);

        let mut projection = Vec::with_capacity(columns.len());
        for column in columns.base() {
            projection.push(self.dialect.quote_qualified(joined, column)?);
        }
        for acc in columns.accumulators() {
            projection.push(match assignment(&recursive.assignments, acc) {
                Some(expr) => expressions.compile(expr)?,
                None => self.dialect.quote_qualified(&spec.name, acc)?,
            });
        }

        let joins = JoinCompiler::new(self.dialect, self.registry);
        let mut sql = format!(
            "SELECT {} FROM {} {}",
            projection.join(", "),
            self.dialect.quote(&spec.name)?,
            joins.recursive_join(&spec.name, base, &recursive.next)?,
        );
        for join in joins.include_joins(target, joined, &[spec.name.as_str()], &recursive.include)? {
            sql.push(' ');
            sql.push_str(&join);
        }

        let mut conditions = Vec::with_capacity(2);
        if let Some(filter) = &recursive.model_filter {
            let compiler = ExpressionCompiler::new(self.dialect, &model_only);
            conditions.extend(filter.compile(&compiler, Scope::Model)?);
        }
        if let Some(filter) = &recursive.cte_filter {
            let compiler = ExpressionCompiler::new(self.dialect, &cte_only);
            conditions.extend(filter.compile(&compiler, Scope::Cte)?);
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        Ok(sql)
    }

    /// ORDER BY / LIMIT / OFFSET for the last term, subject to the dialect
    /// and the pagination policy.
    fn pagination_tail(&self, spec: &CteSpec, base: &ModelMeta, columns: &ColumnSet) -> CteqlResult<Option<String>> {
        if !spec.has_pagination() {
            return Ok(None);
        }
        if !self.dialect.supports_cte_order_limit_offset {
            return match self.pagination {
                CtePagination::Reject => Err(CteqlError::unsupported_feature(
                    self.dialect.name(),
                    "ORDER BY, LIMIT or OFFSET inside a common table expression",
                )),
                CtePagination::Drop => {
                    tracing::warn!(
                        cte = %spec.name,
                        dialect = self.dialect.name(),
                        "dropping ORDER BY/LIMIT/OFFSET the dialect cannot place inside a CTE"
                    );
                    Ok(None)
                }
            };
        }

        let mut parts = Vec::new();
        if !spec.order.is_empty() {
            let mut terms = Vec::with_capacity(spec.order.len());
            for order in &spec.order {
                let column = base.column_for(&order.column);
                let position = columns
                    .position(column)
                    .ok_or_else(|| CteqlError::unknown_column(Scope::Cte.to_string(), order.column.as_str()))?;
                terms.push(order.render(&position.to_string()));
            }
            parts.push(format!("ORDER BY {}", terms.join(", ")));
        }
        parts.extend(self.dialect.limit_clause(spec.limit, spec.offset));
        Ok(Some(parts.join(" ")))
    }
}

fn assignment<'s>(assignments: &'s [(String, Expression)], column: &str) -> Option<&'s Expression> {
    assignments.iter().find(|(c, _)| c == column).map(|(_, e)| e)
}

fn validate_name(name: &str) -> CteqlResult<()> {
    if name.is_empty() {
        return Err(CteqlError::validation("CTE name must not be empty", "empty_name"));
    }
    if !CTE_NAME.is_match(name) {
        return Err(CteqlError::Validation(
            ValidationError::new(
                format!("CTE name '{name}' is not a plain identifier"),
                "invalid_name",
            )
            .with_param("cte", name),
        ));
    }
    Ok(())
}

fn check_assignments(
    cte: &str,
    branch: &str,
    assignments: &[(String, Expression)],
    accumulators: &[String],
) -> CteqlResult<()> {
    let mut seen = HashSet::new();
    for (column, _) in assignments {
        if !accumulators.contains(column) {
            return Err(CteqlError::Validation(
                ValidationError::new(
                    format!("The {branch} branch of CTE '{cte}' assigns undeclared column '{column}'"),
                    "unknown_accumulator",
                )
                .with_param("cte", cte)
                .with_param("column", column.as_str()),
            ));
        }
        if !seen.insert(column.as_str()) {
            return Err(CteqlError::Validation(
                ValidationError::new(
                    format!("The {branch} branch of CTE '{cte}' assigns '{column}' twice"),
                    "duplicate_assignment",
                )
                .with_param("cte", cte)
                .with_param("column", column.as_str()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldType;
    use crate::query::expressions::ComparisonOp;

    fn bracket() -> Dialect {
        Dialect {
            quote_open: '[',
            quote_close: ']',
            ..Dialect::sqlite()
        }
    }

    fn registry() -> ModelRegistry {
        let mut reg = ModelRegistry::new();
        reg.register(
            ModelMeta::new("user", "users")
                .field("amount", FieldType::IntegerField)
                .with_timestamps(),
        )
        .unwrap();
        reg.register(ModelMeta::new("project", "projects").field("name", FieldType::CharField))
            .unwrap();
        reg.has_one("user", "user", "report").unwrap();
        reg.has_many("user", "project", "assigned").unwrap();
        reg
    }

    fn compile(spec: &CteSpec) -> CteqlResult<CompiledCte> {
        let d = bracket();
        let reg = registry();
        let user = reg.model("user").unwrap();
        CteCompiler::new(&d, &reg, CtePagination::Reject).compile(spec, user)
    }

    fn total_cte() -> CteSpec {
        CteSpec::new("a")
            .accumulator("total")
            .initial(
                InitialBranch::new()
                    .filter(Q::eq("username", "user3"))
                    .assign("total", Expression::model("amount")),
            )
            .recursive(
                RecursiveBranch::new("report")
                    .assign("total", Expression::cte("total") + Expression::model("amount")),
            )
    }

    #[test]
    fn test_basic_recursive_clause() {
        let spec = CteSpec::new("a")
            .initial(InitialBranch::new().filter(Q::eq("username", "user3")))
            .recursive(RecursiveBranch::new("report"));
        let compiled = compile(&spec).unwrap();
        assert!(compiled.recursive);
        assert_eq!(
            compiled.sql,
            "a([id],[amount],[createdAt],[updatedAt],[reportId]) AS (SELECT [id], [amount], [createdAt], [updatedAt], [reportId] FROM [users] AS [user] WHERE [user].[username] = 'user3' UNION SELECT [report].[id], [report].[amount], [report].[createdAt], [report].[updatedAt], [report].[reportId] FROM [a] INNER JOIN [users] AS [report] ON [a].[id] = [report].[reportId])"
        );
    }

    #[test]
    fn test_accumulator_projection() {
        let compiled = compile(&total_cte()).unwrap();
        assert_eq!(
            compiled.sql,
            "a([id],[amount],[createdAt],[updatedAt],[reportId],[total]) AS (SELECT [id], [amount], [createdAt], [updatedAt], [reportId], [user].[amount] FROM [users] AS [user] WHERE [user].[username] = 'user3' UNION SELECT [report].[id], [report].[amount], [report].[createdAt], [report].[updatedAt], [report].[reportId], ([a].[total] + [report].[amount]) FROM [a] INNER JOIN [users] AS [report] ON [a].[id] = [report].[reportId])"
        );
        assert!(!compiled.projects_all());
    }

    #[test]
    fn test_projection_arity_matches_alias_list() {
        let compiled = compile(&total_cte().accumulator("depth").initial(
            InitialBranch::new()
                .assign("total", Expression::model("amount"))
                .assign("depth", Expression::value(0)),
        ))
        .unwrap();
        assert_eq!(compiled.columns.len(), 7);
        // Missing recursive assignment carries the value forward.
        assert!(compiled.sql.ends_with(
            "([a].[total] + [report].[amount]), [a].[depth] FROM [a] INNER JOIN [users] AS [report] ON [a].[id] = [report].[reportId])"
        ));
    }

    #[test]
    fn test_union_all() {
        let compiled = compile(&total_cte().unique(false)).unwrap();
        assert!(compiled.sql.contains(" UNION ALL SELECT "));
        let compiled = compile(&total_cte()).unwrap();
        assert!(!compiled.sql.contains("UNION ALL"));
    }

    #[test]
    fn test_scoped_predicates() {
        let mut spec = total_cte();
        spec.recursive = spec.recursive.map(|r| {
            r.model_filter(Q::gt("amount", 30)).cte_filter(Q::lt("total", 500))
        });
        let compiled = compile(&spec).unwrap();
        assert!(compiled
            .sql
            .ends_with("ON [a].[id] = [report].[reportId] WHERE [report].[amount] > 30 AND [a].[total] < 500)"));
    }

    #[test]
    fn test_cte_predicate_rejects_model_column() {
        let mut spec = total_cte();
        spec.recursive = spec.recursive.map(|r| r.cte_filter(Q::lt("amount", 500)));
        let err = compile(&spec).unwrap_err();
        assert_eq!(err.to_string(), "Unknown column 'amount' in cte scope");
    }

    #[test]
    fn test_model_predicate_rejects_unknown_column() {
        let mut spec = total_cte();
        spec.recursive = spec.recursive.map(|r| r.model_filter(Q::gt("total", 1)));
        assert_eq!(compile(&spec).unwrap_err().code(), "unknown_column");
    }

    #[test]
    fn test_cte_reference_in_seed() {
        let spec = total_cte().initial(InitialBranch::new().assign("total", Expression::cte("total")));
        assert_eq!(compile(&spec).unwrap_err().code(), "scope_unavailable");
    }

    #[test]
    fn test_missing_seed_assignment() {
        let spec = total_cte().initial(InitialBranch::new());
        assert_eq!(compile(&spec).unwrap_err().code(), "missing_assignment");
    }

    #[test]
    fn test_undeclared_assignment() {
        let mut spec = total_cte();
        spec.recursive = spec.recursive.map(|r| r.assign("depth", Expression::value(1)));
        assert_eq!(compile(&spec).unwrap_err().code(), "unknown_accumulator");
        let spec = total_cte().initial(
            InitialBranch::new()
                .assign("total", Expression::value(0))
                .assign("total", Expression::value(1)),
        );
        assert_eq!(compile(&spec).unwrap_err().code(), "duplicate_assignment");
    }

    #[test]
    fn test_unknown_exposed_accumulator() {
        assert_eq!(compile(&total_cte().expose("depth")).unwrap_err().code(), "unknown_accumulator");
        assert!(compile(&total_cte().expose("total")).unwrap().projects_all());
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(compile(&CteSpec::new("")).unwrap_err().code(), "empty_name");
        assert_eq!(compile(&CteSpec::new("a b")).unwrap_err().code(), "invalid_name");
        assert_eq!(compile(&CteSpec::new("1a")).unwrap_err().code(), "invalid_name");
    }

    #[test]
    fn test_scoped_predicates_do_not_cross_scopes() {
        let mut spec = total_cte();
        spec.recursive = spec.recursive.map(|r| {
            r.model_filter(Q::filter("amount", ComparisonOp::Gt, Expression::cte("total")))
        });
        assert_eq!(compile(&spec).unwrap_err().code(), "scope_unavailable");

        let mut spec = total_cte();
        spec.recursive = spec.recursive.map(|r| {
            r.cte_filter(Q::filter("total", ComparisonOp::Lt, Expression::model("amount")))
        });
        assert_eq!(compile(&spec).unwrap_err().code(), "scope_unavailable");
    }

    #[test]
    fn test_seed_assignment_needs_declared_column() {
        let spec = total_cte().initial(
            InitialBranch::new()
                .filter(Q::eq("username", "user3"))
                .assign("total", Expression::model("bogus")),
        );
        let err = compile(&spec).unwrap_err();
        assert_eq!(err.code(), "unknown_column");
        assert_eq!(err.to_string(), "Unknown column 'bogus' in model scope");
    }

    #[test]
    fn test_cte_named_like_next_association() {
        let spec = CteSpec::new("report").recursive(RecursiveBranch::new("report"));
        let err = compile(&spec).unwrap_err();
        assert_eq!(err.code(), "alias_collision");
        assert!(err.to_string().contains("'report'"));
    }

    #[test]
    fn test_recursive_include_reusing_joined_alias() {
        let spec = CteSpec::new("a").recursive(RecursiveBranch::new("report").include(Include::new("report")));
        assert_eq!(compile(&spec).unwrap_err().code(), "alias_collision");
    }

    #[test]
    fn test_unknown_next() {
        let spec = CteSpec::new("a").recursive(RecursiveBranch::new("boss"));
        assert_eq!(compile(&spec).unwrap_err().code(), "unknown_association");
    }

    #[test]
    fn test_incompatible_target() {
        let spec = CteSpec::new("a").recursive(RecursiveBranch::new("assigned"));
        let err = compile(&spec).unwrap_err();
        assert_eq!(err.code(), "incompatible_target");
    }

    #[test]
    fn test_order_by_position() {
        let spec = CteSpec::new("a")
            .recursive(RecursiveBranch::new("report"))
            .order_by(OrderBy::asc("amount"))
            .order_by(OrderBy::desc("id"));
        let compiled = compile(&spec).unwrap();
        assert!(compiled.sql.ends_with("[report].[reportId] ORDER BY 2 ASC, 1 DESC)"));
    }

    #[test]
    fn test_order_unknown_column() {
        let spec = CteSpec::new("a").order_by(OrderBy::asc("username"));
        assert_eq!(compile(&spec).unwrap_err().code(), "unknown_column");
    }

    #[test]
    fn test_non_recursive_clause() {
        let spec = CteSpec::new("a")
            .initial(InitialBranch::new().filter(Q::eq("username", "user3")))
            .order_by(OrderBy::asc("amount"));
        let compiled = compile(&spec).unwrap();
        assert!(!compiled.recursive);
        assert_eq!(
            compiled.sql,
            "a([id],[amount],[createdAt],[updatedAt],[reportId]) AS (SELECT [id], [amount], [createdAt], [updatedAt], [reportId] FROM [users] AS [user] WHERE [user].[username] = 'user3' ORDER BY 2 ASC)"
        );
    }

    #[test]
    fn test_pagination_policy() {
        let reg = registry();
        let user = reg.model("user").unwrap();
        let pg = Dialect::postgres();
        let spec = CteSpec::new("a").recursive(RecursiveBranch::new("report")).limit(2);

        let err = CteCompiler::new(&pg, &reg, CtePagination::Reject)
            .compile(&spec, user)
            .unwrap_err();
        assert_eq!(err.code(), "unsupported_feature");

        let compiled = CteCompiler::new(&pg, &reg, CtePagination::Drop)
            .compile(&spec, user)
            .unwrap();
        assert!(!compiled.sql.contains("LIMIT"));
    }

    #[test]
    fn test_recursion_unsupported() {
        let reg = registry();
        let user = reg.model("user").unwrap();
        let d = Dialect {
            supports_recursive_cte: false,
            ..Dialect::sqlite()
        };
        let spec = CteSpec::new("a").recursive(RecursiveBranch::new("report"));
        let err = CteCompiler::new(&d, &reg, CtePagination::Reject)
            .compile(&spec, user)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dialect 'sqlite' does not support recursive common table expressions"
        );
    }
}
