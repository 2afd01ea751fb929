//! Expression trees and their compilation to SQL text.
//!
//! An [`Expression`] is a tagged tree: scoped column references, arithmetic
//! over an operand list, binary comparisons, and inline literals. The
//! [`ExpressionCompiler`] walks the tree with a [`SymbolTable`] that maps
//! each [`Scope`] to the alias and column namespace it resolves against.
//!
//! # Examples
//!
//! ```
//! use cteql_db::query::expressions::Expression;
//!
//! // total + amount, reading the previous CTE row and the joined row
//! let next_total = Expression::cte("total") + Expression::model("amount");
//! assert!(matches!(next_total, Expression::Arithmetic { .. }));
//! ```

use std::fmt;
use std::ops;

use cteql_core::{CteqlError, CteqlResult, ValidationError};

use super::columns::SymbolTable;
use crate::dialect::Dialect;
use crate::value::Value;

/// The namespace a column reference resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The current model row: the base alias in the seed query, the joined
    /// alias in the recursive step.
    Model,
    /// The previous CTE row; only its accumulator columns are addressable.
    Cte,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Model => "model",
            Self::Cte => "cte",
        })
    }
}

/// An arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl ArithmeticOp {
    /// The SQL operator.
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }

    /// Maps a DSL symbol (`$add`, ...) to an operator.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "$add" => Some(Self::Add),
            "$sub" => Some(Self::Sub),
            "$mul" => Some(Self::Mul),
            "$div" => Some(Self::Div),
            _ => None,
        }
    }
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
}

impl ComparisonOp {
    /// The SQL operator.
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    /// Maps a DSL symbol (`$gt`, ...) to an operator.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "$eq" => Some(Self::Eq),
            "$ne" => Some(Self::Ne),
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            "$like" => Some(Self::Like),
            "$notLike" => Some(Self::NotLike),
            "$in" => Some(Self::In),
            "$notIn" => Some(Self::NotIn),
            _ => None,
        }
    }
}

/// A node of the expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A column of the model row or the previous CTE row.
    Column {
        /// Which namespace the field lives in.
        scope: Scope,
        /// The attribute or column name.
        field: String,
    },
    /// `(a OP b OP ...)` evaluated left to right.
    Arithmetic {
        /// The operator applied between operands.
        op: ArithmeticOp,
        /// At least two operands.
        operands: Vec<Expression>,
    },
    /// `left OP right`.
    Comparison {
        /// The comparison operator.
        op: ComparisonOp,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// An inline literal.
    Literal(Value),
}

impl Expression {
    /// References a column of the current model row.
    pub fn model(field: impl Into<String>) -> Self {
        Self::Column {
            scope: Scope::Model,
            field: field.into(),
        }
    }

    /// References an accumulator column of the previous CTE row.
    pub fn cte(field: impl Into<String>) -> Self {
        Self::Column {
            scope: Scope::Cte,
            field: field.into(),
        }
    }

    /// Wraps a literal value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Builds an arithmetic node.
    pub const fn arithmetic(op: ArithmeticOp, operands: Vec<Self>) -> Self {
        Self::Arithmetic { op, operands }
    }

    /// Builds a comparison node.
    pub fn compare(op: ComparisonOp, left: Self, right: Self) -> Self {
        Self::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn combine(self, op: ArithmeticOp, rhs: Self) -> Self {
        match self {
            Self::Arithmetic {
                op: lhs_op,
                mut operands,
            } if lhs_op == op => {
                operands.push(rhs);
                Self::Arithmetic { op, operands }
            }
            lhs => Self::Arithmetic {
                op,
                operands: vec![lhs, rhs],
            },
        }
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl ops::Add for Expression {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.combine(ArithmeticOp::Add, rhs)
    }
}

impl ops::Sub for Expression {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self.combine(ArithmeticOp::Sub, rhs)
    }
}

impl ops::Mul for Expression {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.combine(ArithmeticOp::Mul, rhs)
    }
}

impl ops::Div for Expression {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        self.combine(ArithmeticOp::Div, rhs)
    }
}

/// Compiles expressions against one symbol table.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionCompiler<'a> {
    dialect: &'a Dialect,
    symbols: &'a SymbolTable,
}

impl<'a> ExpressionCompiler<'a> {
    /// Creates a compiler resolving columns through `symbols`.
    pub const fn new(dialect: &'a Dialect, symbols: &'a SymbolTable) -> Self {
        Self { dialect, symbols }
    }

    /// The dialect used for quoting and literals.
    pub const fn dialect(&self) -> &'a Dialect {
        self.dialect
    }

    /// Compiles one expression to SQL text.
    ///
    /// # Errors
    ///
    /// Returns [`CteqlError::UnknownColumn`] for references missing from a
    /// closed namespace, a validation error for references to a scope that is
    /// not available or for arithmetic with fewer than two operands, and any
    /// literal rendering error.
    pub fn compile(&self, expr: &Expression) -> CteqlResult<String> {
        match expr {
            Expression::Column { scope, field } => self.column(*scope, field),
            Expression::Arithmetic { op, operands } => {
                if operands.len() < 2 {
                    return Err(CteqlError::Validation(
                        ValidationError::new(
                            format!(
                                "Arithmetic '{}' needs at least two operands, got {}",
                                op.sql(),
                                operands.len()
                            ),
                            "invalid_arity",
                        )
                        .with_param("operator", op.sql()),
                    ));
                }
                let parts = operands
                    .iter()
                    .map(|o| self.compile(o))
                    .collect::<CteqlResult<Vec<_>>>()?;
                Ok(format!("({})", parts.join(&format!(" {} ", op.sql()))))
            }
            Expression::Comparison { op, left, right } => {
                let lhs = self.compile(left)?;
                self.comparison(&lhs, *op, right)
            }
            Expression::Literal(value) => self.dialect.literal(value),
        }
    }

    /// Compiles a scoped column reference to `alias.column`.
    ///
    /// # Errors
    ///
    /// See [`compile`](Self::compile).
    pub fn column(&self, scope: Scope, field: &str) -> CteqlResult<String> {
        let namespace = self.symbols.get(scope).ok_or_else(|| {
            CteqlError::Validation(
                ValidationError::new(
                    format!("Column '{field}' references the {scope} scope, which is not available here"),
                    "scope_unavailable",
                )
                .with_param("scope", scope.to_string())
                .with_param("column", field),
            )
        })?;
        let column = namespace.resolve(scope, field)?;
        self.dialect.quote_qualified(namespace.alias(), column)
    }

    /// Renders `lhs OP right`, handling `IS [NOT] NULL` and `IN` lists.
    ///
    /// # Errors
    ///
    /// See [`compile`](Self::compile).
    pub fn comparison(&self, lhs: &str, op: ComparisonOp, right: &Expression) -> CteqlResult<String> {
        match (op, right) {
            (ComparisonOp::Eq, Expression::Literal(Value::Null)) => Ok(format!("{lhs} IS NULL")),
            (ComparisonOp::Ne, Expression::Literal(Value::Null)) => {
                Ok(format!("{lhs} IS NOT NULL"))
            }
            (ComparisonOp::In | ComparisonOp::NotIn, Expression::Literal(value)) => {
                let list = match value {
                    Value::List(_) => value.clone(),
                    single => Value::List(vec![single.clone()]),
                };
                Ok(format!("{lhs} {} {}", op.sql(), self.dialect.literal(&list)?))
            }
            (_, Expression::Literal(Value::List(_))) => Err(CteqlError::Validation(
                ValidationError::new(
                    format!("Operator '{}' does not accept a list", op.sql()),
                    "invalid_operand",
                )
                .with_param("operator", op.sql()),
            )),
            _ => Ok(format!("{lhs} {} {}", op.sql(), self.compile(right)?)),
        }
    }
}
