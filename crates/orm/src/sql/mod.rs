//! SQL Generation
//!
//! Pure translation from clause values to SQL fragments with positional
//! `?` placeholders. Every function returns the fragment text without a
//! leading space; parameters come back in emission order.

use serde_json::Value;

use crate::conditions::{ConditionClause, JoinCondition, Operator, OrderClause};
use crate::error::{ModelError, ModelResult};
use crate::query::types::{ExistenceClause, JoinClause, JoinKind};

/// SQL text plus the parameters its placeholders bind, in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Append another fragment separated by a single space
    pub fn push(&mut self, other: SqlFragment) {
        if other.sql.is_empty() {
            return;
        }
        if !self.sql.is_empty() {
            self.sql.push(' ');
        }
        self.sql.push_str(&other.sql);
        self.params.extend(other.params);
    }

    pub fn push_sql(&mut self, sql: &str) {
        self.push(SqlFragment::new(sql, Vec::new()));
    }
}

/// Qualify a bare field with the table alias. Fields that already carry a
/// table prefix are left alone.
pub fn qualify(field: &str, alias: Option<&str>) -> String {
    match alias {
        Some(alias) if !field.contains('.') => format!("{}.{}", alias, field),
        _ => field.to_string(),
    }
}

/// Split `"posts oxygent"` into the table and its alias
pub fn split_alias(table: &str) -> (&str, Option<&str>) {
    let mut parts = table.split_whitespace();
    let name = parts.next().unwrap_or(table);
    let alias = parts.last();
    (name, alias)
}

/// `SELECT [DISTINCT] fields FROM table`
pub fn select_clause(table: &str, fields: &[String], distinct: bool) -> String {
    let columns = if fields.is_empty() {
        "*".to_string()
    } else {
        fields.join(", ")
    };
    if distinct {
        format!("SELECT DISTINCT {} FROM {}", columns, table)
    } else {
        format!("SELECT {} FROM {}", columns, table)
    }
}

/// A single condition, with null-safe rendering of equality and ordering
/// comparisons.
pub fn condition_sql(condition: &ConditionClause, alias: Option<&str>) -> SqlFragment {
    let field = qualify(&condition.field, alias);
    let value = condition.value.clone();

    match condition.operator {
        Operator::In | Operator::NotIn => {
            let items = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            let placeholders = vec!["?"; items.len()].join(", ");
            SqlFragment::new(
                format!("{} {} ({})", field, condition.operator, placeholders),
                items,
            )
        }
        Operator::Equal if value.is_null() => {
            SqlFragment::new(format!("{} IS ?", field), vec![value])
        }
        Operator::NotEqual if value.is_null() => {
            SqlFragment::new(format!("{} IS NOT ?", field), vec![value])
        }
        Operator::NotEqual => SqlFragment::new(
            format!("({} IS NULL OR {} != ?)", field, field),
            vec![value],
        ),
        op if op.is_ordering() && !value.is_null() => SqlFragment::new(
            format!("({} NOT NULL AND {} {} ?)", field, field, op),
            vec![value],
        ),
        op => SqlFragment::new(format!("{} {} ?", field, op), vec![value]),
    }
}

/// Conditions joined by their connectors. The first condition's connector
/// is dropped.
pub fn conditions_sql(conditions: &[ConditionClause], alias: Option<&str>) -> ModelResult<SqlFragment> {
    if conditions.is_empty() {
        return Err(ModelError::EmptyCondition);
    }

    let mut fragment = SqlFragment::default();
    for (index, condition) in conditions.iter().enumerate() {
        if index > 0 {
            fragment.push_sql(condition.connector.as_sql());
        }
        fragment.push(condition_sql(condition, alias));
    }
    Ok(fragment)
}

/// `WHERE cond [connector cond]...`
pub fn where_clause(conditions: &[ConditionClause], alias: Option<&str>) -> ModelResult<SqlFragment> {
    let body = conditions_sql(conditions, alias)?;
    Ok(SqlFragment::new(format!("WHERE {}", body.sql), body.params))
}

/// `[NOT] EXISTS (SELECT 1 FROM table WHERE inner = outer)`, optionally
/// widened with `outer IS NULL OR` for negated checks on nullable keys.
pub fn existence_clause(clause: &ExistenceClause) -> String {
    let subquery = format!(
        "EXISTS (SELECT 1 FROM {} WHERE {} = {})",
        clause.table, clause.inner_column, clause.outer_column
    );
    match (clause.negated, &clause.null_column) {
        (false, _) => subquery,
        (true, None) => format!("NOT {}", subquery),
        (true, Some(column)) => format!("({} IS NULL OR NOT {})", column, subquery),
    }
}

/// WHERE clause combining plain conditions and existence checks. Returns
/// an empty fragment when there is nothing to filter on.
pub fn filter_clause(
    conditions: &[ConditionClause],
    existence: &[ExistenceClause],
    alias: Option<&str>,
) -> ModelResult<SqlFragment> {
    if existence.is_empty() {
        if conditions.is_empty() {
            return Ok(SqlFragment::default());
        }
        return where_clause(conditions, alias);
    }

    let mut parts: Vec<String> = Vec::new();
    let mut params = Vec::new();
    if !conditions.is_empty() {
        let body = conditions_sql(conditions, alias)?;
        if conditions.len() > 1 {
            parts.push(format!("({})", body.sql));
        } else {
            parts.push(body.sql);
        }
        params = body.params;
    }
    parts.extend(existence.iter().map(existence_clause));
    Ok(SqlFragment::new(format!("WHERE {}", parts.join(" AND ")), params))
}

fn join_conditions_sql(conditions: &[JoinCondition]) -> String {
    let mut sql = String::new();
    for (index, condition) in conditions.iter().enumerate() {
        if index > 0 {
            sql.push(' ');
            sql.push_str(condition.connector.as_sql());
            sql.push(' ');
        }
        sql.push_str(&format!("{} {} {}", condition.left, condition.operator, condition.right));
    }
    sql
}

/// `[NATURAL] INNER|OUTER|CROSS JOIN table [USING (...) | ON ...]`
pub fn join_clause(join: &JoinClause) -> String {
    let keyword = match join.kind {
        JoinKind::Inner => "INNER JOIN",
        JoinKind::Outer => "OUTER JOIN",
        JoinKind::Cross => "CROSS JOIN",
    };

    if !join.using.is_empty() {
        format!("{} {} USING ({})", keyword, join.table, join.using.join(", "))
    } else if !join.on.is_empty() {
        format!("{} {} ON {}", keyword, join.table, join_conditions_sql(&join.on))
    } else if join.kind == JoinKind::Cross {
        format!("{} {}", keyword, join.table)
    } else {
        format!("NATURAL {} {}", keyword, join.table)
    }
}

/// `GROUP BY field ORDER, ... [HAVING cond]`
pub fn group_by_clause(
    groups: &[OrderClause],
    having: Option<&ConditionClause>,
    alias: Option<&str>,
) -> ModelResult<SqlFragment> {
    if groups.is_empty() {
        return Err(ModelError::EmptyCondition);
    }

    let terms: Vec<String> = groups
        .iter()
        .map(|group| format!("{} {}", qualify(&group.field, alias), group.order))
        .collect();
    let mut fragment = SqlFragment::new(format!("GROUP BY {}", terms.join(", ")), Vec::new());
    if let Some(having) = having {
        let condition = having_sql(having, alias);
        fragment.sql.push_str(" HAVING ");
        fragment.sql.push_str(&condition.sql);
        fragment.params.extend(condition.params);
    }
    Ok(fragment)
}

/// HAVING compares aggregates, so it renders the symbol as given
fn having_sql(condition: &ConditionClause, alias: Option<&str>) -> SqlFragment {
    if condition.operator.is_membership() {
        return condition_sql(condition, alias);
    }
    SqlFragment::new(
        format!("{} {} ?", qualify(&condition.field, alias), condition.operator),
        vec![condition.value.clone()],
    )
}

/// `ORDER BY field ORDER, ...`
pub fn order_by_clause(orders: &[OrderClause]) -> String {
    let terms: Vec<String> = orders
        .iter()
        .map(|order| format!("{} {}", order.field, order.order))
        .collect();
    format!("ORDER BY {}", terms.join(", "))
}

/// `LIMIT n [OFFSET m]`. SQLite needs a LIMIT before OFFSET, so a bare
/// offset renders with `LIMIT -1`.
pub fn limit_clause(limit: Option<u64>, offset: Option<u64>) -> String {
    match (limit, offset) {
        (Some(limit), Some(offset)) => format!("LIMIT {} OFFSET {}", limit, offset),
        (Some(limit), None) => format!("LIMIT {}", limit),
        (None, Some(offset)) => format!("LIMIT -1 OFFSET {}", offset),
        (None, None) => String::new(),
    }
}

/// `INSERT INTO table (a, b) VALUES (?, ?)`
pub fn insert_clause(table: &str, columns: &[String]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", table);
    }
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    )
}

/// `UPDATE table SET a = ?, b = ?`
pub fn update_clause(table: &str, columns: &[String]) -> String {
    let assignments: Vec<String> = columns.iter().map(|column| format!("{} = ?", column)).collect();
    format!("UPDATE {} SET {}", table, assignments.join(", "))
}

/// `DELETE FROM table`
pub fn delete_clause(table: &str) -> String {
    format!("DELETE FROM {}", table)
}
