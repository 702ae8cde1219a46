//! Persistence for resource type specifications themselves.
//!
//! Instance data lives in the per-type table sets; the specifications that
//! describe those types are ordinary rows in a two-column `resource_types`
//! table, so schema definitions can be introspected and updated at
//! runtime. The versioning component reads them back to know what to
//! provision.

use crate::core::error::TesseraError;
use crate::core::sql::{self, ColumnKind};
use rusqlite::types::Value as SqlValue;
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const RESOURCE_TYPES_TABLE: &str = "resource_types";

/// A resource type specification: the type's name and its schema
/// versions, each carrying prototype templates for the main item and any
/// subitems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTypeSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    pub versions: Vec<VersionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSpec {
    pub version: String,
    pub prototype: Value,
    #[serde(default)]
    pub subpaths: BTreeMap<String, SubpathSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubpathSpec {
    pub prototype: Value,
}

pub fn prepare_tables(txn: &Transaction<'_>) -> Result<(), TesseraError> {
    sql::create_table(
        txn,
        RESOURCE_TYPES_TABLE,
        &[("type", ColumnKind::Text), ("spec", ColumnKind::Text)],
    )
}

/// Inserts the spec if its type name is new, else overwrites the stored
/// spec for that type.
pub fn add_or_update_spec(
    txn: &Transaction<'_>,
    spec: &ResourceTypeSpec,
) -> Result<(), TesseraError> {
    let serialized = serde_json::to_string(spec)?;
    let known = get_types(txn)?;
    if known.iter().any(|name| name == &spec.type_name) {
        sql::update_matching(
            txn,
            RESOURCE_TYPES_TABLE,
            &[("type", sql::text(&spec.type_name))],
            &[("spec", sql::text(&serialized))],
        )
    } else {
        sql::insert(
            txn,
            RESOURCE_TYPES_TABLE,
            &[
                ("type", sql::text(&spec.type_name)),
                ("spec", sql::text(&serialized)),
            ],
        )
    }
}

pub fn get_spec(txn: &Transaction<'_>, type_name: &str) -> Result<ResourceTypeSpec, TesseraError> {
    let rows = sql::select_matching(
        txn,
        RESOURCE_TYPES_TABLE,
        &["spec"],
        &[("type", sql::text(type_name))],
        &[],
    )?;
    let Some(row) = rows.into_iter().next() else {
        return Err(TesseraError::UnknownResourceType(type_name.to_string()));
    };
    match row.into_iter().next() {
        Some(SqlValue::Text(serialized)) => Ok(serde_json::from_str(&serialized)?),
        _ => Err(TesseraError::UnknownResourceType(type_name.to_string())),
    }
}

pub fn get_types(txn: &Transaction<'_>) -> Result<Vec<String>, TesseraError> {
    let rows = sql::select_matching(txn, RESOURCE_TYPES_TABLE, &["type"], &[], &[])?;
    Ok(rows
        .into_iter()
        .filter_map(|row| match row.into_iter().next() {
            Some(SqlValue::Text(name)) => Some(name),
            _ => None,
        })
        .collect())
}

/// Removes a stored spec. Unknown type names are a no-op.
pub fn delete_spec(txn: &Transaction<'_>, type_name: &str) -> Result<(), TesseraError> {
    sql::delete_matching(
        txn,
        RESOURCE_TYPES_TABLE,
        &[("type", sql::text(type_name))],
    )
}
