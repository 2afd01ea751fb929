//! Dialect capability table.
//!
//! A [`Dialect`] is a plain configuration struct: quote characters, whether
//! recursive CTEs are available, whether ORDER BY / LIMIT / OFFSET may appear
//! inside a CTE term, and how pagination, booleans and strings are spelled.
//! One preset exists per supported backend and the caller picks one at
//! compile time; nothing about a dialect is global.
//!
//! | Preset | Quotes | Recursive CTE | Pagination in CTE | Limit syntax |
//! |---|---|---|---|---|
//! | `sqlite` | `` ` `` | yes | yes | `LIMIT offset, count` |
//! | `mysql` | `` ` `` | yes | no | `LIMIT offset, count` |
//! | `postgres` | `"` | yes | no | `LIMIT count OFFSET offset` |
//! | `mssql` | `[ ]` | yes, no `RECURSIVE` keyword | no | `OFFSET .. FETCH NEXT ..` |

use std::fmt;

use cteql_core::{CteqlError, CteqlResult, ValidationError};

use crate::value::Value;

/// The database backend a dialect targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    /// PostgreSQL.
    PostgreSQL,
    /// SQLite.
    SQLite,
    /// MySQL and MariaDB.
    MySQL,
    /// Microsoft SQL Server.
    MsSql,
}

impl DatabaseBackendType {
    /// Returns the short name used in settings and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgres",
            Self::SQLite => "sqlite",
            Self::MySQL => "mysql",
            Self::MsSql => "mssql",
        }
    }
}

impl fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How LIMIT and OFFSET are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSyntax {
    /// `LIMIT count OFFSET offset`.
    LimitOffset,
    /// `LIMIT offset, count`.
    OffsetComma,
    /// `OFFSET offset ROWS FETCH NEXT count ROWS ONLY`.
    OffsetFetch,
}

/// How boolean literals are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanLiteral {
    /// `TRUE` / `FALSE`.
    Keyword,
    /// `1` / `0`.
    Numeric,
}

/// How string literals are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEscape {
    /// Single quotes are doubled.
    Standard,
    /// Backslashes are escaped too.
    Backslash,
}

/// The capability flags and spelling rules of one SQL dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    /// Backend this dialect targets.
    pub backend: DatabaseBackendType,
    /// Opening identifier quote.
    pub quote_open: char,
    /// Closing identifier quote.
    pub quote_close: char,
    /// Whether `WITH RECURSIVE` style self-referencing CTEs are available.
    pub supports_recursive_cte: bool,
    /// Whether ORDER BY / LIMIT / OFFSET may appear inside a CTE term.
    pub supports_cte_order_limit_offset: bool,
    /// Whether recursive CTEs are introduced with the `RECURSIVE` keyword.
    pub recursive_keyword: bool,
    /// Pagination spelling.
    pub limit_syntax: LimitSyntax,
    /// Boolean literal spelling.
    pub boolean_literal: BooleanLiteral,
    /// String literal escaping.
    pub string_escape: StringEscape,
}

/// Offset-only pagination under `LIMIT offset, count` needs some count.
const MAX_ROWS: &str = "9223372036854775807";

impl Dialect {
    /// The SQLite preset.
    pub const fn sqlite() -> Self {
        Self {
            backend: DatabaseBackendType::SQLite,
            quote_open: '`',
            quote_close: '`',
            supports_recursive_cte: true,
            supports_cte_order_limit_offset: true,
            recursive_keyword: true,
            limit_syntax: LimitSyntax::OffsetComma,
            boolean_literal: BooleanLiteral::Numeric,
            string_escape: StringEscape::Standard,
        }
    }

    /// The MySQL preset.
    pub const fn mysql() -> Self {
        Self {
            backend: DatabaseBackendType::MySQL,
            quote_open: '`',
            quote_close: '`',
            supports_recursive_cte: true,
            supports_cte_order_limit_offset: false,
            recursive_keyword: true,
            limit_syntax: LimitSyntax::OffsetComma,
            boolean_literal: BooleanLiteral::Numeric,
            string_escape: StringEscape::Backslash,
        }
    }

    /// The PostgreSQL preset.
    pub const fn postgres() -> Self {
        Self {
            backend: DatabaseBackendType::PostgreSQL,
            quote_open: '"',
            quote_close: '"',
            supports_recursive_cte: true,
            supports_cte_order_limit_offset: false,
            recursive_keyword: true,
            limit_syntax: LimitSyntax::LimitOffset,
            boolean_literal: BooleanLiteral::Keyword,
            string_escape: StringEscape::Standard,
        }
    }

    /// The SQL Server preset.
    pub const fn mssql() -> Self {
        Self {
            backend: DatabaseBackendType::MsSql,
            quote_open: '[',
            quote_close: ']',
            supports_recursive_cte: true,
            supports_cte_order_limit_offset: false,
            recursive_keyword: false,
            limit_syntax: LimitSyntax::OffsetFetch,
            boolean_literal: BooleanLiteral::Numeric,
            string_escape: StringEscape::Standard,
        }
    }

    /// Every preset, in display order.
    pub const fn presets() -> [Self; 4] {
        [Self::sqlite(), Self::mysql(), Self::postgres(), Self::mssql()]
    }

    /// Selects a preset by name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown names.
    pub fn from_name(name: &str) -> CteqlResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::sqlite()),
            "mysql" | "mariadb" => Ok(Self::mysql()),
            "postgres" | "postgresql" => Ok(Self::postgres()),
            "mssql" | "sqlserver" => Ok(Self::mssql()),
            other => Err(CteqlError::ConfigurationError(format!(
                "Unknown dialect '{other}'"
            ))),
        }
    }

    /// The dialect's short name.
    pub const fn name(&self) -> &'static str {
        self.backend.name()
    }

    /// Wraps an identifier in the dialect's quote characters.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty identifiers and for identifiers
    /// containing the closing quote character.
    ///
    /// # Examples
    ///
    /// ```
    /// use cteql_db::dialect::Dialect;
    ///
    /// assert_eq!(Dialect::postgres().quote("users").unwrap(), "\"users\"");
    /// assert_eq!(Dialect::mssql().quote("users").unwrap(), "[users]");
    /// ```
    pub fn quote(&self, ident: &str) -> CteqlResult<String> {
        if ident.is_empty() {
            return Err(CteqlError::Validation(ValidationError::new(
                "Identifier must not be empty",
                "invalid_identifier",
            )));
        }
        if ident.contains(self.quote_close) {
            return Err(CteqlError::Validation(
                ValidationError::new(
                    format!(
                        "Identifier '{ident}' contains the quote character '{}'",
                        self.quote_close
                    ),
                    "invalid_identifier",
                )
                .with_param("identifier", ident),
            ));
        }
        Ok(format!("{}{ident}{}", self.quote_open, self.quote_close))
    }

    /// Renders `alias.column`, both quoted.
    ///
    /// # Errors
    ///
    /// See [`quote`](Self::quote).
    pub fn quote_qualified(&self, alias: &str, column: &str) -> CteqlResult<String> {
        Ok(format!("{}.{}", self.quote(alias)?, self.quote(column)?))
    }

    /// Renders a value as an inline SQL literal.
    ///
    /// Lists render as a parenthesized tuple for `IN`; an empty list renders
    /// `(NULL)` so the predicate matches nothing.
    ///
    /// # Errors
    ///
    /// Returns a validation error for NaN and infinite floats.
    pub fn literal(&self, value: &Value) -> CteqlResult<String> {
        Ok(match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match (self.boolean_literal, b) {
                (BooleanLiteral::Keyword, true) => "TRUE".to_string(),
                (BooleanLiteral::Keyword, false) => "FALSE".to_string(),
                (BooleanLiteral::Numeric, true) => "1".to_string(),
                (BooleanLiteral::Numeric, false) => "0".to_string(),
            },
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                if !f.is_finite() {
                    return Err(CteqlError::Validation(
                        ValidationError::new(
                            format!("Cannot inline non-finite number {f}"),
                            "invalid_literal",
                        )
                        .with_param("value", f.to_string()),
                    ));
                }
                f.to_string()
            }
            Value::String(s) => self.string_literal(s),
            Value::Date(d) => self.string_literal(&d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => {
                self.string_literal(&dt.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            Value::DateTimeTz(dt) => {
                self.string_literal(&dt.format("%Y-%m-%d %H:%M:%S%.f %:z").to_string())
            }
            Value::Uuid(u) => self.string_literal(&u.to_string()),
            Value::List(items) => {
                if items.is_empty() {
                    "(NULL)".to_string()
                } else {
                    let rendered = items
                        .iter()
                        .map(|v| self.literal(v))
                        .collect::<CteqlResult<Vec<_>>>()?;
                    format!("({})", rendered.join(", "))
                }
            }
        })
    }

    fn string_literal(&self, s: &str) -> String {
        let escaped = match self.string_escape {
            StringEscape::Standard => s.replace('\'', "''"),
            StringEscape::Backslash => s.replace('\\', "\\\\").replace('\'', "''"),
        };
        format!("'{escaped}'")
    }

    /// Renders pagination, or `None` when neither limit nor offset is set.
    pub fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (self.limit_syntax, limit, offset) {
            (_, None, None) => None,
            (LimitSyntax::LimitOffset, Some(l), Some(o)) => Some(format!("LIMIT {l} OFFSET {o}")),
            (LimitSyntax::LimitOffset, Some(l), None) => Some(format!("LIMIT {l}")),
            (LimitSyntax::LimitOffset, None, Some(o)) => Some(format!("OFFSET {o}")),
            (LimitSyntax::OffsetComma, Some(l), Some(o)) => Some(format!("LIMIT {o}, {l}")),
            (LimitSyntax::OffsetComma, Some(l), None) => Some(format!("LIMIT {l}")),
            (LimitSyntax::OffsetComma, None, Some(o)) => Some(format!("LIMIT {o}, {MAX_ROWS}")),
            (LimitSyntax::OffsetFetch, Some(l), o) => Some(format!(
                "OFFSET {} ROWS FETCH NEXT {l} ROWS ONLY",
                o.unwrap_or(0)
            )),
            (LimitSyntax::OffsetFetch, None, Some(o)) => Some(format!("OFFSET {o} ROWS")),
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::sqlite()
    }
}
