//! Association joins.
//!
//! Two kinds of join appear inside a CTE: the self-referencing join that
//! moves the recursion one generation forward, and ordinary `include` joins
//! hanging off the current generation's row. Both derive their ON condition
//! from the association's foreign-key ownership.

use std::collections::HashSet;

use cteql_core::{CteqlError, CteqlResult, ValidationError};

use super::columns::{Namespace, SymbolTable};
use super::expressions::{ExpressionCompiler, Scope};
use super::lookups::Q;
use crate::dialect::Dialect;
use crate::model::ModelMeta;
use crate::registry::{Association, ModelRegistry};

/// SQL JOIN types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// INNER JOIN.
    Inner,
    /// LEFT OUTER JOIN.
    LeftOuter,
}

impl JoinType {
    /// Returns the SQL keyword for this join type.
    pub const fn sql_keyword(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::LeftOuter => "LEFT OUTER JOIN",
        }
    }
}

/// An association to join, with an optional filter and nested includes.
///
/// # Examples
///
/// ```
/// use cteql_db::query::joins::Include;
/// use cteql_db::query::lookups::Q;
///
/// let include = Include::new("assigned").filter(Q::eq("name", "Rebuilding"));
/// assert!(include.required);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    /// The association alias on the parent model.
    pub association: String,
    /// Expected target model; checked against the association when set.
    pub model: Option<String>,
    /// Extra condition ANDed into the ON clause.
    pub filter: Option<Q>,
    /// `true` joins INNER, `false` joins LEFT OUTER.
    pub required: bool,
    /// Includes joined off this include's alias.
    pub include: Vec<Include>,
}

impl Include {
    /// Creates a required include of `association`.
    pub fn new(association: impl Into<String>) -> Self {
        Self {
            association: association.into(),
            model: None,
            filter: None,
            required: true,
            include: Vec::new(),
        }
    }

    /// Asserts the association targets `model`.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Adds a condition to the ON clause.
    #[must_use]
    pub fn filter(mut self, q: Q) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing & q,
            None => q,
        });
        self
    }

    /// Makes this a LEFT OUTER JOIN.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Nests another include under this one.
    #[must_use]
    pub fn include(mut self, child: Self) -> Self {
        self.include.push(child);
        self
    }

    /// The join type implied by `required`.
    pub const fn join_type(&self) -> JoinType {
        if self.required {
            JoinType::Inner
        } else {
            JoinType::LeftOuter
        }
    }
}

/// Compiles association joins.
#[derive(Debug, Clone, Copy)]
pub struct JoinCompiler<'a> {
    dialect: &'a Dialect,
    registry: &'a ModelRegistry,
}

impl<'a> JoinCompiler<'a> {
    /// Creates a join compiler.
    pub const fn new(dialect: &'a Dialect, registry: &'a ModelRegistry) -> Self {
        Self { dialect, registry }
    }

    /// Compiles the join from the CTE to the next generation:
    /// `INNER JOIN target AS next ON cte.key = next.key`.
    ///
    /// # Errors
    ///
    /// Returns [`CteqlError::UnknownAssociation`] for an undeclared `next`,
    /// plus quoting errors.
    pub fn recursive_join(&self, cte_name: &str, source: &ModelMeta, next: &str) -> CteqlResult<String> {
        let association = self.registry.association(&source.name, next)?;
        let target = self.registry.model(&association.target)?;
        let on = self.on_condition(association, source, cte_name, target, &association.name)?;
        Ok(format!(
            "{} {} AS {} ON {on}",
            JoinType::Inner.sql_keyword(),
            self.dialect.quote(&target.db_table)?,
            self.dialect.quote(&association.name)?,
        ))
    }

    /// Compiles `includes` against the row aliased `parent_alias`.
    ///
    /// Top-level includes are aliased by their association name; nested ones
    /// by `parent->child`. No alias may repeat `parent_alias`, any of
    /// `reserved`, or another include's alias.
    ///
    /// # Errors
    ///
    /// Returns [`CteqlError::UnknownAssociation`] for undeclared includes, a
    /// validation error when an include names the wrong target model or
    /// reuses an alias, and filter compilation errors.
    pub fn include_joins(
        &self,
        parent: &ModelMeta,
        parent_alias: &str,
        reserved: &[&str],
        includes: &[Include],
    ) -> CteqlResult<Vec<String>> {
        let mut joins = Vec::new();
        let mut aliases: HashSet<String> = reserved.iter().map(|a| (*a).to_string()).collect();
        aliases.insert(parent_alias.to_string());
        for include in includes {
            self.push_include(&mut joins, &mut aliases, parent, parent_alias, None, include)?;
        }
        Ok(joins)
    }

    fn push_include(
        &self,
        joins: &mut Vec<String>,
        aliases: &mut HashSet<String>,
        parent: &ModelMeta,
        parent_alias: &str,
        prefix: Option<&str>,
        include: &Include,
    ) -> CteqlResult<()> {
        let association = self.registry.association(&parent.name, &include.association)?;
        let target = self.registry.model(&association.target)?;
        if let Some(expected) = &include.model {
            if *expected != target.name {
                return Err(CteqlError::Validation(
                    ValidationError::new(
                        format!(
                            "Include '{}' targets model '{}', not '{expected}'",
                            include.association, target.name
                        ),
                        "include_model_mismatch",
                    )
                    .with_param("association", include.association.as_str())
                    .with_param("model", expected.as_str()),
                ));
            }
        }

        let alias = prefix.map_or_else(
            || association.name.clone(),
            |p| format!("{p}->{}", association.name),
        );
        if !aliases.insert(alias.clone()) {
            return Err(CteqlError::Validation(
                ValidationError::new(
                    format!("Include '{}' reuses the alias '{alias}'", include.association),
                    "alias_collision",
                )
                .with_param("association", include.association.as_str())
                .with_param("alias", alias.as_str()),
            ));
        }
        let mut on = self.on_condition(association, parent, parent_alias, target, &alias)?;
        if let Some(filter) = &include.filter {
            let symbols = SymbolTable::new().with(Scope::Model, Namespace::open_model(&alias, target));
            let compiler = ExpressionCompiler::new(self.dialect, &symbols);
            if let Some(extra) = filter.compile(&compiler, Scope::Model)? {
                on.push_str(" AND ");
                on.push_str(&extra);
            }
        }
        joins.push(format!(
            "{} {} AS {} ON {on}",
            include.join_type().sql_keyword(),
            self.dialect.quote(&target.db_table)?,
            self.dialect.quote(&alias)?,
        ));

        for child in &include.include {
            self.push_include(joins, aliases, target, &alias, Some(&alias), child)?;
        }
        Ok(())
    }

    fn on_condition(
        &self,
        association: &Association,
        source: &ModelMeta,
        source_alias: &str,
        target: &ModelMeta,
        target_alias: &str,
    ) -> CteqlResult<String> {
        let (source_column, target_column) = association.join_columns(source, target);
        Ok(format!(
            "{} = {}",
            self.dialect.quote_qualified(source_alias, source_column)?,
            self.dialect.quote_qualified(target_alias, target_column)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldType;

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
        reg.register(
            ModelMeta::new("project", "projects")
                .field("name", FieldType::CharField)
                .with_timestamps(),
        )
        .unwrap();
        reg.register(ModelMeta::new("task", "tasks").field("title", FieldType::CharField))
            .unwrap();
        reg.has_one("user", "user", "report").unwrap();
        reg.belongs_to("user", "user", "manager").unwrap();
        reg.has_many("user", "project", "assigned").unwrap();
        reg.has_many("project", "task", "tasks").unwrap();
        reg
    }

    #[test]
    fn test_join_type_keywords() {
        assert_eq!(JoinType::Inner.sql_keyword(), "INNER JOIN");
        assert_eq!(JoinType::LeftOuter.sql_keyword(), "LEFT OUTER JOIN");
    }

    #[test]
    fn test_recursive_join_key_on_target() {
        let d = bracket();
        let reg = registry();
        let jc = JoinCompiler::new(&d, &reg);
        let user = reg.model("user").unwrap();
        assert_eq!(
            jc.recursive_join("a", user, "report").unwrap(),
            "INNER JOIN [users] AS [report] ON [a].[id] = [report].[reportId]"
        );
    }

    #[test]
    fn test_recursive_join_belongs_to() {
        let d = bracket();
        let reg = registry();
        let jc = JoinCompiler::new(&d, &reg);
        let user = reg.model("user").unwrap();
        assert_eq!(
            jc.recursive_join("chain", user, "manager").unwrap(),
            "INNER JOIN [users] AS [manager] ON [chain].[managerId] = [manager].[id]"
        );
    }

    #[test]
    fn test_recursive_join_unknown_association() {
        let d = bracket();
        let reg = registry();
        let jc = JoinCompiler::new(&d, &reg);
        let user = reg.model("user").unwrap();
        let err = jc.recursive_join("a", user, "boss").unwrap_err();
        assert_eq!(err.to_string(), "Unknown association 'boss' on model 'user'");
    }

    #[test]
    fn test_include_with_filter() {
        let d = bracket();
        let reg = registry();
        let jc = JoinCompiler::new(&d, &reg);
        let user = reg.model("user").unwrap();
        let joins = jc
            .include_joins(
                user,
                "user",
                &[],
                &[Include::new("assigned").filter(Q::eq("name", "Rebuilding"))],
            )
            .unwrap();
        assert_eq!(
            joins,
            vec!["INNER JOIN [projects] AS [assigned] ON [user].[id] = [assigned].[userId] AND [assigned].[name] = 'Rebuilding'"]
        );
    }

    #[test]
    fn test_optional_nested_include() {
        let d = bracket();
        let reg = registry();
        let jc = JoinCompiler::new(&d, &reg);
        let user = reg.model("user").unwrap();
        let joins = jc
            .include_joins(
                user,
                "report",
                &["a"],
                &[Include::new("assigned").include(Include::new("tasks").optional())],
            )
            .unwrap();
        assert_eq!(
            joins,
            vec![
                "INNER JOIN [projects] AS [assigned] ON [report].[id] = [assigned].[userId]",
                "LEFT OUTER JOIN [tasks] AS [assigned->tasks] ON [assigned].[id] = [assigned->tasks].[projectId]",
            ]
        );
    }

    #[test]
    fn test_include_model_mismatch() {
        let d = bracket();
        let reg = registry();
        let jc = JoinCompiler::new(&d, &reg);
        let user = reg.model("user").unwrap();
        let err = jc
            .include_joins(user, "user", &[], &[Include::new("assigned").model("task")])
            .unwrap_err();
        assert_eq!(err.code(), "include_model_mismatch");
    }

    #[test]
    fn test_include_alias_collisions() {
        let d = bracket();
        let reg = registry();
        let jc = JoinCompiler::new(&d, &reg);
        let user = reg.model("user").unwrap();

        let err = jc
            .include_joins(user, "report", &["a"], &[Include::new("report")])
            .unwrap_err();
        assert_eq!(err.code(), "alias_collision");
        assert!(err.to_string().contains("'report'"));

        let err = jc
            .include_joins(user, "user", &["assigned"], &[Include::new("assigned")])
            .unwrap_err();
        assert_eq!(err.code(), "alias_collision");

        let err = jc
            .include_joins(user, "user", &["a"], &[Include::new("assigned"), Include::new("assigned")])
            .unwrap_err();
        assert_eq!(err.code(), "alias_collision");
    }

    #[test]
    fn test_include_builder_merges_filters() {
        let inc = Include::new("assigned")
            .filter(Q::eq("name", "x"))
            .filter(Q::gt("budget", 1));
        assert!(matches!(inc.filter, Some(Q::And(ref c)) if c.len() == 2));
        assert_eq!(inc.join_type(), JoinType::Inner);
    }
}
