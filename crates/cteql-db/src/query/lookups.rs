//! Q objects for building filter trees.
//!
//! A [`Q`] is a composable predicate: single field comparisons combined with
//! `&` (AND), `|` (OR) and `!` (NOT). A filter's field is resolved against
//! the scope the predicate is compiled in, so the same tree can filter the
//! base table, a joined include, or the previous CTE row.
//!
//! # Examples
//!
//! ```
//! use cteql_db::query::lookups::Q;
//!
//! // username = 'user3'
//! let q = Q::eq("username", "user3");
//!
//! // amount > 30 AND amount < 500
//! let range = Q::gt("amount", 30) & Q::lt("amount", 500);
//!
//! // NOT(amount = 0)
//! let nonzero = !Q::eq("amount", 0);
//! # let _ = (q, range, nonzero);
//! ```

use std::ops;

use cteql_core::CteqlResult;

use super::expressions::{ComparisonOp, Expression, ExpressionCompiler, Scope};
use crate::value::Value;

/// A composable filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Q {
    /// `field OP value`.
    Filter {
        /// The attribute or column name, resolved in the predicate's scope.
        field: String,
        /// The comparison operator.
        op: ComparisonOp,
        /// The right-hand side: a literal or a scoped expression.
        value: Expression,
    },
    /// Logical AND of multiple conditions.
    And(Vec<Q>),
    /// Logical OR of multiple conditions.
    Or(Vec<Q>),
    /// Logical negation of a condition.
    Not(Box<Q>),
}

impl Q {
    /// Creates a filter with an arbitrary operator and right-hand side.
    pub fn filter(field: impl Into<String>, op: ComparisonOp, value: impl Into<Expression>) -> Self {
        Self::Filter {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(field, ComparisonOp::Eq, Expression::Literal(value.into()))
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(field, ComparisonOp::Ne, Expression::Literal(value.into()))
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(field, ComparisonOp::Gt, Expression::Literal(value.into()))
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(field, ComparisonOp::Gte, Expression::Literal(value.into()))
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(field, ComparisonOp::Lt, Expression::Literal(value.into()))
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(field, ComparisonOp::Lte, Expression::Literal(value.into()))
    }

    /// `field IN (values...)`
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::filter(field, ComparisonOp::In, Value::List(values))
    }

    /// Returns `true` for an AND/OR with no children, which filters nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => children.is_empty(),
            _ => false,
        }
    }

    /// Compiles the tree to a WHERE/ON fragment, with filter fields resolved
    /// in `scope`. Returns `None` for an empty tree.
    ///
    /// The top-level conjunction is not parenthesized; nested groups are.
    ///
    /// # Errors
    ///
    /// Propagates column resolution and literal errors.
    pub fn compile(&self, compiler: &ExpressionCompiler<'_>, scope: Scope) -> CteqlResult<Option<String>> {
        if self.is_empty() {
            return Ok(None);
        }
        match self {
            Self::And(children) => {
                let parts = compile_children(children, compiler, scope)?;
                Ok((!parts.is_empty()).then(|| parts.join(" AND ")))
            }
            other => other.compile_nested(compiler, scope),
        }
    }

    fn compile_nested(&self, compiler: &ExpressionCompiler<'_>, scope: Scope) -> CteqlResult<Option<String>> {
        match self {
            Self::Filter { field, op, value } => {
                let lhs = compiler.column(scope, field)?;
                compiler.comparison(&lhs, *op, value).map(Some)
            }
            Self::And(children) | Self::Or(children) => {
                let parts = compile_children(children, compiler, scope)?;
                let joiner = if matches!(self, Self::And(_)) { " AND " } else { " OR " };
                Ok(match parts.len() {
                    0 => None,
                    1 => parts.into_iter().next(),
                    _ => Some(format!("({})", parts.join(joiner))),
                })
            }
            Self::Not(inner) => Ok(inner
                .compile_nested(compiler, scope)?
                .map(|sql| format!("NOT ({sql})"))),
        }
    }
}

fn compile_children(children: &[Q], compiler: &ExpressionCompiler<'_>, scope: Scope) -> CteqlResult<Vec<String>> {
    let mut parts = Vec::with_capacity(children.len());
    for child in children {
        if let Some(sql) = child.compile_nested(compiler, scope)? {
            parts.push(sql);
        }
    }
    Ok(parts)
}

impl ops::BitAnd for Q {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            // Flatten nested ANDs
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (other, Self::And(mut right)) => {
                right.insert(0, other);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }
}

impl ops::BitOr for Q {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            // Flatten nested ORs
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), other) => {
                left.push(other);
                Self::Or(left)
            }
            (other, Self::Or(mut right)) => {
                right.insert(0, other);
                Self::Or(right)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }
}

impl ops::Not for Q {
    type Output = Self;

    fn not(self) -> Self::Output {
        // Double negation cancellation
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::fields::FieldType;
    use crate::model::ModelMeta;
    use crate::query::columns::{Namespace, SymbolTable};

    fn bracket() -> Dialect {
        Dialect {
            quote_open: '[',
            quote_close: ']',
            ..Dialect::sqlite()
        }
    }

    fn symbols() -> SymbolTable {
        let user = ModelMeta::new("user", "users").field("amount", FieldType::IntegerField);
        SymbolTable::new()
            .with(Scope::Model, Namespace::open_model("user", &user))
            .with(Scope::Cte, Namespace::columns("a", ["total"]))
    }

    fn compile(q: &Q) -> Option<String> {
        let d = bracket();
        let s = symbols();
        q.compile(&ExpressionCompiler::new(&d, &s), Scope::Model).unwrap()
    }

    #[test]
    fn test_simple_filter() {
        assert_eq!(
            compile(&Q::eq("username", "user3")).as_deref(),
            Some("[user].[username] = 'user3'")
        );
    }

    #[test]
    fn test_and_operator() {
        let q = Q::gt("amount", 30) & Q::lt("amount", 500);
        match &q {
            Q::And(children) => assert_eq!(children.len(), 2),
            _ => panic!("Expected And"),
        }
        assert_eq!(
            compile(&q).as_deref(),
            Some("[user].[amount] > 30 AND [user].[amount] < 500")
        );
    }

    #[test]
    fn test_and_flattening() {
        let q = Q::eq("a", 1) & Q::eq("b", 2) & Q::eq("c", 3);
        match &q {
            Q::And(children) => assert_eq!(children.len(), 3),
            _ => panic!("Expected And"),
        }
    }

    #[test]
    fn test_or_is_parenthesized() {
        let q = Q::eq("amount", 1) | Q::eq("amount", 2);
        assert_eq!(
            compile(&q).as_deref(),
            Some("([user].[amount] = 1 OR [user].[amount] = 2)")
        );
        let q = Q::eq("username", "x") & (Q::eq("amount", 1) | Q::eq("amount", 2));
        assert_eq!(
            compile(&q).as_deref(),
            Some("[user].[username] = 'x' AND ([user].[amount] = 1 OR [user].[amount] = 2)")
        );
    }

    #[test]
    fn test_not() {
        let q = !Q::eq("amount", 0);
        assert_eq!(compile(&q).as_deref(), Some("NOT ([user].[amount] = 0)"));
        assert_eq!(!!Q::eq("amount", 0), Q::eq("amount", 0));
    }

    #[test]
    fn test_empty_tree_compiles_to_none() {
        assert_eq!(compile(&Q::And(vec![])), None);
        assert_eq!(compile(&(Q::And(vec![]) | Q::Or(vec![]))), None);
    }

    #[test]
    fn test_null_and_in() {
        assert_eq!(
            compile(&Q::eq("reportId", Value::Null)).as_deref(),
            Some("[user].[reportId] IS NULL")
        );
        assert_eq!(
            compile(&Q::is_in("id", vec![Value::Int(1), Value::Int(2)])).as_deref(),
            Some("[user].[id] IN (1, 2)")
        );
        assert_eq!(compile(&Q::is_in("id", vec![])).as_deref(), Some("[user].[id] IN (NULL)"));
    }

    #[test]
    fn test_cte_scope() {
        let d = bracket();
        let s = symbols();
        let c = ExpressionCompiler::new(&d, &s);
        assert_eq!(
            Q::lt("total", 500).compile(&c, Scope::Cte).unwrap().as_deref(),
            Some("[a].[total] < 500")
        );
        assert_eq!(
            Q::lt("amount", 500).compile(&c, Scope::Cte).unwrap_err().code(),
            "unknown_column"
        );
    }

    #[test]
    fn test_expression_rhs() {
        let q = Q::filter("amount", ComparisonOp::Lt, Expression::cte("total"));
        let d = bracket();
        let s = symbols();
        let c = ExpressionCompiler::new(&d, &s);
        assert_eq!(
            q.compile(&c, Scope::Model).unwrap().as_deref(),
            Some("[user].[amount] < [a].[total]")
        );
    }
}
