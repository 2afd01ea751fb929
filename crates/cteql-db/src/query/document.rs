//! JSON query documents.
//!
//! [`parse_select`] reads the operator-DSL document shape into a typed
//! [`SelectQuery`]:
//!
//! ```json
//! {
//!   "cte": [{
//!     "name": "a",
//!     "cteAttributes": ["total"],
//!     "initial": { "where": { "username": "user3" }, "total": { "$model": "amount" } },
//!     "recursive": {
//!       "next": "report",
//!       "total": { "$add": [{ "$cte": "total" }, { "$model": "amount" }] },
//!       "where": { "model": { "amount": { "$gt": 30 } }, "cte": { "total": { "$lt": 500 } } }
//!     }
//!   }],
//!   "includeCTEAttributes": ["total"]
//! }
//! ```
//!
//! `cte` may be a single object or a list; an empty list means no CTE.
//! Unknown `$operators` are rejected with [`CteqlError::UnsupportedOperator`].

use cteql_core::{CteqlError, CteqlResult, ValidationError};
use serde_json::{Map, Value as Json};

use super::compiler::{CteInput, OrderBy, SelectQuery};
use super::cte::{CteSpec, InitialBranch, RecursiveBranch};
use super::expressions::{ArithmeticOp, ComparisonOp, Expression, Scope};
use super::joins::Include;
use super::lookups::Q;
use crate::value::Value;

/// Parses a query document over `model`.
///
/// # Errors
///
/// Returns a validation error for malformed shapes and unknown keys, and
/// [`CteqlError::UnsupportedOperator`] for unknown `$operators`.
///
/// # Examples
///
/// ```
/// use cteql_db::query::document::parse_select;
///
/// let query = parse_select("user", &serde_json::json!({
///     "cte": { "name": "a", "initial": { "where": { "username": "user3" } },
///              "recursive": { "next": "report" } }
/// })).unwrap();
/// assert_eq!(query.ctes.len(), 1);
/// ```
pub fn parse_select(model: &str, doc: &Json) -> CteqlResult<SelectQuery> {
    let doc = object(doc, "query document")?;
    let mut query = SelectQuery::new(model);
    let mut exposed = Vec::new();

    for (key, value) in doc {
        match key.as_str() {
            "cte" => query = query.with_cte(parse_cte_input(value)?),
            "where" => query = query.filter(parse_where(value)?),
            "order" => query.order = parse_order(value)?,
            "limit" => query.limit = Some(unsigned(value, "limit")?),
            "offset" => query.offset = Some(unsigned(value, "offset")?),
            "includeCTEAttributes" => exposed = strings(value, "includeCTEAttributes")?,
            other => return Err(unknown_key(other, "query document")),
        }
    }

    if !exposed.is_empty() {
        let last = query.ctes.last_mut().ok_or_else(|| {
            malformed("includeCTEAttributes requires at least one CTE")
        })?;
        last.exposed_accumulator_columns.extend(exposed);
    }
    Ok(query)
}

fn parse_cte_input(value: &Json) -> CteqlResult<CteInput> {
    match value {
        Json::Null => Ok(CteInput::Many(Vec::new())),
        Json::Array(items) => Ok(CteInput::Many(
            items.iter().map(parse_cte).collect::<CteqlResult<Vec<_>>>()?,
        )),
        Json::Object(_) => Ok(CteInput::from(parse_cte(value)?)),
        _ => Err(malformed("cte must be an object or a list of objects")),
    }
}

/// Parses one CTE object.
///
/// # Errors
///
/// See [`parse_select`].
pub fn parse_cte(value: &Json) -> CteqlResult<CteSpec> {
    let map = object(value, "cte")?;
    let name = map
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| malformed("cte requires a string name"))?;
    let mut spec = CteSpec::new(name);
    let mut recursive_order = false;

    for (key, value) in map {
        match key.as_str() {
            "name" => {}
            "model" => {
                spec.base_model = Some(
                    value
                        .as_str()
                        .ok_or_else(|| malformed("cte model must be a string"))?
                        .to_string(),
                );
            }
            "cteAttributes" => spec.accumulator_columns = strings(value, "cteAttributes")?,
            "initial" => spec.initial = parse_initial(value)?,
            "recursive" => {
                let (branch, order) = parse_recursive(value)?;
                if let Some(order) = order {
                    recursive_order = true;
                    spec.order = order;
                }
                spec.recursive = Some(branch);
            }
            "unique" => {
                spec.unique = value
                    .as_bool()
                    .ok_or_else(|| malformed("cte unique must be a boolean"))?;
            }
            "order" if !recursive_order => spec.order = parse_order(value)?,
            "order" => {}
            "limit" => spec.limit = Some(unsigned(value, "limit")?),
            "offset" => spec.offset = Some(unsigned(value, "offset")?),
            other => return Err(unknown_key(other, "cte")),
        }
    }

    if recursive_order && map.contains_key("order") {
        return Err(CteqlError::Validation(
            ValidationError::new(
                format!("CTE '{name}' sets order both on the CTE and inside recursive"),
                "conflicting_order",
            )
            .with_param("cte", name),
        ));
    }
    Ok(spec)
}

fn parse_initial(value: &Json) -> CteqlResult<InitialBranch> {
    let mut branch = InitialBranch::new();
    for (key, value) in object(value, "initial")? {
        match key.as_str() {
            "where" => branch = branch.filter(parse_where(value)?),
            "include" => branch.include = parse_includes(value)?,
            column => branch = branch.assign(assignment_target(column)?, parse_expression(value)?),
        }
    }
    Ok(branch)
}

fn parse_recursive(value: &Json) -> CteqlResult<(RecursiveBranch, Option<Vec<OrderBy>>)> {
    let map = object(value, "recursive")?;
    let next = map
        .get("next")
        .and_then(Json::as_str)
        .ok_or_else(|| malformed("recursive requires a string next association"))?;
    let mut branch = RecursiveBranch::new(next);
    let mut order = None;

    for (key, value) in map {
        match key.as_str() {
            "next" => {}
            "where" => {
                for (scope, predicate) in object(value, "recursive where")? {
                    match scope.as_str() {
                        "model" => branch = branch.model_filter(parse_where(predicate)?),
                        "cte" => branch = branch.cte_filter(parse_where(predicate)?),
                        other => return Err(unknown_key(other, "recursive where")),
                    }
                }
            }
            "include" => branch.include = parse_includes(value)?,
            "order" => order = Some(parse_order(value)?),
            column => branch = branch.assign(assignment_target(column)?, parse_expression(value)?),
        }
    }
    Ok((branch, order))
}

fn assignment_target(key: &str) -> CteqlResult<&str> {
    if key.starts_with('$') {
        return Err(CteqlError::UnsupportedOperator(key.to_string()));
    }
    Ok(key)
}

fn parse_includes(value: &Json) -> CteqlResult<Vec<Include>> {
    match value {
        Json::Array(items) => items.iter().map(parse_include).collect(),
        _ => Ok(vec![parse_include(value)?]),
    }
}

fn parse_include(value: &Json) -> CteqlResult<Include> {
    let map = object(value, "include")?;
    let association = map
        .get("as")
        .and_then(Json::as_str)
        .ok_or_else(|| malformed("include requires a string 'as' association"))?;
    let mut include = Include::new(association);
    for (key, value) in map {
        match key.as_str() {
            "as" => {}
            "model" => {
                include = include.model(
                    value
                        .as_str()
                        .ok_or_else(|| malformed("include model must be a string"))?,
                );
            }
            "where" => include = include.filter(parse_where(value)?),
            "required" => {
                include.required = value
                    .as_bool()
                    .ok_or_else(|| malformed("include required must be a boolean"))?;
            }
            "include" => include.include = parse_includes(value)?,
            other => return Err(unknown_key(other, "include")),
        }
    }
    Ok(include)
}

/// Parses a `where` object into a [`Q`].
///
/// `{field: literal}` is equality (a list means `IN`), `{field: {$op: x}}`
/// applies each operator, `$and`/`$or` take lists and `$not` an object.
///
/// # Errors
///
/// See [`parse_select`].
pub fn parse_where(value: &Json) -> CteqlResult<Q> {
    let mut conditions = Vec::new();
    for (key, value) in object(value, "where")? {
        match key.as_str() {
            "$and" => conditions.push(Q::And(where_list(value, "$and")?)),
            "$or" => conditions.push(Q::Or(where_list(value, "$or")?)),
            "$not" => conditions.push(!parse_where(value)?),
            op if op.starts_with('$') => {
                return Err(CteqlError::UnsupportedOperator(op.to_string()));
            }
            field => conditions.extend(parse_condition(field, value)?),
        }
    }
    Ok(if conditions.len() == 1 {
        conditions.remove(0)
    } else {
        Q::And(conditions)
    })
}

fn where_list(value: &Json, op: &str) -> CteqlResult<Vec<Q>> {
    value
        .as_array()
        .ok_or_else(|| malformed(format!("{op} takes a list of conditions")))?
        .iter()
        .map(parse_where)
        .collect()
}

fn parse_condition(field: &str, value: &Json) -> CteqlResult<Vec<Q>> {
    let Json::Object(ops) = value else {
        let literal = Value::from_json(value)?;
        let op = if matches!(literal, Value::List(_)) {
            ComparisonOp::In
        } else {
            ComparisonOp::Eq
        };
        return Ok(vec![Q::filter(field, op, literal)]);
    };
    // A bare column reference compares for equality.
    if ops.len() == 1 && (ops.contains_key("$model") || ops.contains_key("$cte")) {
        return Ok(vec![Q::filter(field, ComparisonOp::Eq, parse_expression(value)?)]);
    }
    ops.iter()
        .map(|(symbol, operand)| {
            let op = ComparisonOp::from_symbol(symbol)
                .ok_or_else(|| CteqlError::UnsupportedOperator(symbol.clone()))?;
            Ok(Q::filter(field, op, parse_expression(operand)?))
        })
        .collect()
}

/// Parses an expression node: `{$model: f}`, `{$cte: f}`,
/// `{$add: [a, b, ...]}` and friends, `{$gt: [a, b]}` and friends, or a
/// literal.
///
/// # Errors
///
/// See [`parse_select`].
pub fn parse_expression(value: &Json) -> CteqlResult<Expression> {
    let Json::Object(map) = value else {
        return Value::from_json(value).map(Expression::Literal);
    };
    let mut entries = map.iter();
    let (Some((symbol, operand)), None) = (entries.next(), entries.next()) else {
        return Err(malformed("an expression object must have exactly one operator key"));
    };
    match symbol.as_str() {
        "$model" => column(Scope::Model, operand),
        "$cte" => column(Scope::Cte, operand),
        s => {
            if let Some(op) = ArithmeticOp::from_symbol(s) {
                let operands = operand
                    .as_array()
                    .ok_or_else(|| malformed(format!("{s} takes a list of operands")))?
                    .iter()
                    .map(parse_expression)
                    .collect::<CteqlResult<Vec<_>>>()?;
                return Ok(Expression::arithmetic(op, operands));
            }
            if let Some(op) = ComparisonOp::from_symbol(s) {
                return match operand.as_array().map(Vec::as_slice) {
                    Some([left, right]) => Ok(Expression::compare(
                        op,
                        parse_expression(left)?,
                        parse_expression(right)?,
                    )),
                    _ => Err(malformed(format!("{s} takes exactly two operands"))),
                };
            }
            if s.starts_with('$') {
                Err(CteqlError::UnsupportedOperator(s.to_string()))
            } else {
                Err(malformed(format!("'{s}' is not an operator")))
            }
        }
    }
}

fn column(scope: Scope, operand: &Json) -> CteqlResult<Expression> {
    let field = operand
        .as_str()
        .ok_or_else(|| malformed(format!("${scope} takes a column name")))?;
    Ok(Expression::Column {
        scope,
        field: field.to_string(),
    })
}

fn parse_order(value: &Json) -> CteqlResult<Vec<OrderBy>> {
    let items = value
        .as_array()
        .ok_or_else(|| malformed("order must be a list"))?;
    items
        .iter()
        .map(|item| match item {
            Json::String(column) => Ok(OrderBy::asc(column.as_str())),
            Json::Array(pair) => match pair.as_slice() {
                [Json::String(column)] => Ok(OrderBy::asc(column.as_str())),
                [Json::String(column), Json::String(direction)] => order_term(column, direction),
                _ => Err(malformed("order entries are [column, direction]")),
            },
            _ => Err(malformed("order entries are [column, direction]")),
        })
        .collect()
}

fn order_term(column: &str, direction: &str) -> CteqlResult<OrderBy> {
    let upper = direction.to_ascii_uppercase();
    let words: Vec<&str> = upper.split_whitespace().collect();
    let (descending, nulls_first) = match words.as_slice() {
        ["ASC"] => (false, None),
        ["DESC"] => (true, None),
        ["ASC", "NULLS", "FIRST"] => (false, Some(true)),
        ["ASC", "NULLS", "LAST"] => (false, Some(false)),
        ["DESC", "NULLS", "FIRST"] => (true, Some(true)),
        ["DESC", "NULLS", "LAST"] => (true, Some(false)),
        _ => return Err(malformed(format!("unknown order direction '{direction}'"))),
    };
    Ok(OrderBy {
        column: column.to_string(),
        descending,
        nulls_first,
    })
}

fn object<'a>(value: &'a Json, what: &str) -> CteqlResult<&'a Map<String, Json>> {
    value
        .as_object()
        .ok_or_else(|| malformed(format!("{what} must be an object")))
}

fn strings(value: &Json, what: &str) -> CteqlResult<Vec<String>> {
    value
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(ToString::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| malformed(format!("{what} must be a list of strings")))
}

fn unsigned(value: &Json, what: &str) -> CteqlResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| malformed(format!("{what} must be a non-negative integer")))
}

fn malformed(message: impl Into<String>) -> CteqlError {
    CteqlError::validation(message, "malformed_document")
}

fn unknown_key(key: &str, what: &str) -> CteqlError {
    CteqlError::Validation(
        ValidationError::new(format!("Unknown key '{key}' in {what}"), "unknown_key")
            .with_param("key", key),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_object_and_list_agree() {
        let cte = json!({"name": "a", "initial": {"where": {"username": "user3"}}, "recursive": {"next": "report"}});
        let one = parse_select("user", &json!({"cte": cte.clone()})).unwrap();
        let many = parse_select("user", &json!({"cte": [cte]})).unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn test_empty_cte_list() {
        let query = parse_select("user", &json!({"cte": []})).unwrap();
        assert!(query.ctes.is_empty());
        assert_eq!(query, SelectQuery::new("user"));
    }

    #[test]
    fn test_accumulator_document() {
        let query = parse_select(
            "user",
            &json!({
                "cte": [{
                    "name": "a",
                    "cteAttributes": ["total"],
                    "initial": {"total": {"$model": "amount"}, "where": {"username": "user3"}},
                    "recursive": {
                        "next": "report",
                        "total": {"$add": [{"$cte": "total"}, {"$model": "amount"}]},
                        "where": {"model": {"amount": {"$gt": 30}}, "cte": {"total": {"$lt": 500}}}
                    }
                }],
                "includeCTEAttributes": ["total"]
            }),
        )
        .unwrap();
        let spec = &query.ctes[0];
        assert_eq!(spec.accumulator_columns, vec!["total"]);
        assert_eq!(spec.exposed_accumulator_columns, vec!["total"]);
        assert_eq!(
            spec.initial.assignments,
            vec![("total".to_string(), Expression::model("amount"))]
        );
        assert_eq!(spec.initial.filter, Some(Q::eq("username", "user3")));
        let recursive = spec.recursive.as_ref().unwrap();
        assert_eq!(recursive.next, "report");
        assert_eq!(
            recursive.assignments[0].1,
            Expression::cte("total") + Expression::model("amount")
        );
        assert_eq!(recursive.model_filter, Some(Q::gt("amount", 30)));
        assert_eq!(recursive.cte_filter, Some(Q::lt("total", 500)));
    }

    #[test]
    fn test_where_shapes() {
        assert_eq!(
            parse_where(&json!({"amount": {"$gt": 1, "$lt": 5}})).unwrap(),
            Q::And(vec![Q::gt("amount", 1), Q::lt("amount", 5)])
        );
        assert_eq!(
            parse_where(&json!({"$or": [{"a": 1}, {"b": 2}]})).unwrap(),
            Q::Or(vec![Q::eq("a", 1), Q::eq("b", 2)])
        );
        assert_eq!(parse_where(&json!({"$not": {"a": 1}})).unwrap(), !Q::eq("a", 1));
        assert_eq!(
            parse_where(&json!({"id": [1, 2]})).unwrap(),
            Q::is_in("id", vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            parse_where(&json!({"amount": {"$lt": {"$cte": "total"}}})).unwrap(),
            Q::filter("amount", ComparisonOp::Lt, Expression::cte("total"))
        );
    }

    #[test]
    fn test_unknown_operator() {
        let err = parse_where(&json!({"amount": {"$foo": 1}})).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported operator '$foo'");
        let err = parse_expression(&json!({"$pow": [1, 2]})).unwrap_err();
        assert_eq!(err.code(), "unsupported_operator");
        let err = parse_where(&json!({"$xor": []})).unwrap_err();
        assert_eq!(err.code(), "unsupported_operator");
    }

    #[test]
    fn test_expression_comparison_node() {
        assert_eq!(
            parse_expression(&json!({"$gt": [{"$model": "amount"}, 30]})).unwrap(),
            Expression::compare(ComparisonOp::Gt, Expression::model("amount"), Expression::value(30))
        );
        assert_eq!(
            parse_expression(&json!({"$gt": [1]})).unwrap_err().code(),
            "malformed_document"
        );
    }

    #[test]
    fn test_includes() {
        let spec = parse_cte(&json!({
            "name": "a",
            "initial": {"include": {"model": "project", "as": "assigned", "where": {"name": "Rebuilding"}}},
            "recursive": {"next": "report", "include": [{"as": "assigned", "required": false}]}
        }))
        .unwrap();
        assert_eq!(
            spec.initial.include,
            vec![Include::new("assigned").model("project").filter(Q::eq("name", "Rebuilding"))]
        );
        assert_eq!(
            spec.recursive.unwrap().include,
            vec![Include::new("assigned").optional()]
        );
    }

    #[test]
    fn test_order_and_pagination() {
        let spec = parse_cte(&json!({
            "name": "a",
            "order": [["amount", "ASC"], ["id", "desc nulls last"], "createdAt"],
            "limit": 2,
            "offset": 2,
            "unique": false
        }))
        .unwrap();
        assert_eq!(spec.order[0], OrderBy::asc("amount"));
        assert_eq!(
            spec.order[1],
            OrderBy {
                nulls_first: Some(false),
                ..OrderBy::desc("id")
            }
        );
        assert_eq!(spec.order[2], OrderBy::asc("createdAt"));
        assert_eq!((spec.limit, spec.offset), (Some(2), Some(2)));
        assert!(!spec.unique);
    }

    #[test]
    fn test_recursive_order() {
        let spec = parse_cte(&json!({
            "name": "a",
            "recursive": {"next": "report", "order": [["amount", "DESC"]]}
        }))
        .unwrap();
        assert_eq!(spec.order, vec![OrderBy::desc("amount")]);

        let err = parse_cte(&json!({
            "name": "a",
            "order": [["amount", "ASC"]],
            "recursive": {"next": "report", "order": [["amount", "DESC"]]}
        }))
        .unwrap_err();
        assert_eq!(err.code(), "conflicting_order");
    }

    #[test]
    fn test_malformed_documents() {
        assert_eq!(parse_select("user", &json!([])).unwrap_err().code(), "malformed_document");
        assert_eq!(parse_select("user", &json!({"cte": 3})).unwrap_err().code(), "malformed_document");
        assert_eq!(parse_cte(&json!({"initial": {}})).unwrap_err().code(), "malformed_document");
        assert_eq!(
            parse_cte(&json!({"name": "a", "recursive": {}})).unwrap_err().code(),
            "malformed_document"
        );
        assert_eq!(parse_select("user", &json!({"select": []})).unwrap_err().code(), "unknown_key");
        assert_eq!(
            parse_select("user", &json!({"includeCTEAttributes": ["total"]})).unwrap_err().code(),
            "malformed_document"
        );
        assert_eq!(
            parse_select("user", &json!({"limit": -1})).unwrap_err().code(),
            "malformed_document"
        );
    }

    #[test]
    fn test_outer_clauses() {
        let query = parse_select(
            "user",
            &json!({"where": {"amount": {"$gte": 10}}, "order": [["amount", "DESC"]], "limit": 5}),
        )
        .unwrap();
        assert_eq!(query.filter, Some(Q::gte("amount", 10)));
        assert_eq!(query.order, vec![OrderBy::desc("amount")]);
        assert_eq!(query.limit, Some(5));
    }
}
