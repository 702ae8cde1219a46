//! Row-level SQL primitives shared by every store component.
//!
//! Table and column names are derived from schema data at runtime, so every
//! identifier that reaches a statement is validated against a strict
//! allowlist pattern first. Values are always bound positionally.

use crate::core::error::TesseraError;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::sync::LazyLock;

/// Lowercase snake_case only. Anything else is refused before it can reach
/// a statement.
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

pub fn check_identifier(name: &str) -> Result<(), TesseraError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(TesseraError::InvalidIdentifier(name.to_string()))
    }
}

/// Derives the physical table name for a field path rooted at a resource
/// type, e.g. `["person", "addrs", "lines"]` -> `person_addrs_lines`.
///
/// The join is not injective on its own (field names may themselves contain
/// underscores); `VersionedStorage::prepare_storage` refuses any prototype
/// set whose derived names collide.
pub fn table_name(components: &[&str]) -> Result<String, TesseraError> {
    for component in components {
        check_identifier(component)?;
    }
    Ok(components.join("_"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
}

impl ColumnKind {
    fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Integer => "INTEGER",
        }
    }
}

/// Wraps a `&str` as a bindable TEXT value.
pub fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_owned())
}

pub fn create_table(
    conn: &Connection,
    table: &str,
    columns: &[(&str, ColumnKind)],
) -> Result<(), TesseraError> {
    check_identifier(table)?;
    let mut defs = Vec::with_capacity(columns.len());
    for (name, kind) in columns {
        check_identifier(name)?;
        defs.push(format!("{} {}", name, kind.sql_type()));
    }
    let statement = format!("CREATE TABLE IF NOT EXISTS {} ({})", table, defs.join(", "));
    conn.execute(&statement, [])?;
    Ok(())
}

pub fn insert(
    conn: &Connection,
    table: &str,
    values: &[(&str, SqlValue)],
) -> Result<(), TesseraError> {
    check_identifier(table)?;
    let mut columns = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (i, (name, _)) in values.iter().enumerate() {
        check_identifier(name)?;
        columns.push(*name);
        placeholders.push(format!("?{}", i + 1));
    }
    let statement = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&statement, params_from_iter(values.iter().map(|(_, v)| v)))?;
    Ok(())
}

/// Rewrites `values` on every row matching the exact-match condition set.
pub fn update_matching(
    conn: &Connection,
    table: &str,
    matches: &[(&str, SqlValue)],
    values: &[(&str, SqlValue)],
) -> Result<(), TesseraError> {
    check_identifier(table)?;
    if values.is_empty() {
        return Ok(());
    }
    let mut assignments = Vec::with_capacity(values.len());
    let mut index = 1;
    for (name, _) in values {
        check_identifier(name)?;
        assignments.push(format!("{} = ?{}", name, index));
        index += 1;
    }
    let mut statement = format!("UPDATE {} SET {}", table, assignments.join(", "));
    statement.push_str(&condition_clause(matches, index)?);
    let params = values.iter().chain(matches.iter()).map(|(_, v)| v);
    conn.execute(&statement, params_from_iter(params))?;
    Ok(())
}

/// Deletes every row matching the exact-match condition set. Matching zero
/// rows is not an error.
pub fn delete_matching(
    conn: &Connection,
    table: &str,
    matches: &[(&str, SqlValue)],
) -> Result<(), TesseraError> {
    check_identifier(table)?;
    let mut statement = format!("DELETE FROM {}", table);
    statement.push_str(&condition_clause(matches, 1)?);
    conn.execute(&statement, params_from_iter(matches.iter().map(|(_, v)| v)))?;
    Ok(())
}

/// Selects a column subset from every row matching the exact-match
/// condition set, optionally ordered. Rows come back in the requested
/// column order.
pub fn select_matching(
    conn: &Connection,
    table: &str,
    columns: &[&str],
    matches: &[(&str, SqlValue)],
    order_by: &[&str],
) -> Result<Vec<Vec<SqlValue>>, TesseraError> {
    check_identifier(table)?;
    for name in columns {
        check_identifier(name)?;
    }
    let mut statement = format!("SELECT {} FROM {}", columns.join(", "), table);
    statement.push_str(&condition_clause(matches, 1)?);
    if !order_by.is_empty() {
        for name in order_by {
            check_identifier(name)?;
        }
        statement.push_str(&format!(" ORDER BY {}", order_by.join(", ")));
    }

    let mut stmt = conn.prepare(&statement)?;
    let mapped = stmt.query_map(params_from_iter(matches.iter().map(|(_, v)| v)), |row| {
        let mut out = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            out.push(row.get::<_, SqlValue>(i)?);
        }
        Ok(out)
    })?;

    let mut rows = Vec::new();
    for row in mapped {
        rows.push(row?);
    }
    Ok(rows)
}

fn condition_clause(
    matches: &[(&str, SqlValue)],
    first_index: usize,
) -> Result<String, TesseraError> {
    if matches.is_empty() {
        return Ok(String::new());
    }
    let mut conditions = Vec::with_capacity(matches.len());
    for (i, (name, _)) in matches.iter().enumerate() {
        check_identifier(name)?;
        conditions.push(format!("{} = ?{}", name, first_index + i));
    }
    Ok(format!(" WHERE {}", conditions.join(" AND ")))
}
