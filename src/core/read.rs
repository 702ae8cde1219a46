//! Read-side reconstruction of items from their relational rows.

use crate::core::error::TesseraError;
use crate::core::prototype::{Prototype, SubItemPrototypes};
use crate::core::sql;
use crate::core::walker::{walk_item, ItemRegion};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Transaction};
use serde_json::{Map, Value};
use tracing::trace;

/// Read-only interface to one resource type's table set. All operations
/// run inside a caller-supplied transaction and perform no writes.
pub struct ReadOnlyStore {
    item_type: String,
    prototype: Prototype,
    subitem_prototypes: SubItemPrototypes,
}

impl ReadOnlyStore {
    pub fn new(item_type: &str, prototype: Prototype) -> Self {
        Self {
            item_type: item_type.to_string(),
            prototype,
            subitem_prototypes: SubItemPrototypes::default(),
        }
    }

    pub fn set_subitem_prototype(&mut self, subitem_name: &str, prototype: Prototype) {
        self.subitem_prototypes.add(subitem_name, prototype);
    }

    /// Ids of all items of this type. No ordering guarantee.
    pub fn get_item_ids(&self, txn: &Transaction<'_>) -> Result<Vec<String>, TesseraError> {
        let rows = sql::select_matching(txn, &self.item_type, &["id"], &[], &[])?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_iter().next() {
                Some(SqlValue::Text(id)) => Some(id),
                _ => None,
            })
            .collect())
    }

    pub fn get_item(
        &self,
        txn: &Transaction<'_>,
        item_id: &str,
    ) -> Result<Map<String, Value>, TesseraError> {
        read_whole_item(txn, &self.item_type, &self.prototype, item_id)
    }

    pub fn get_subitem(
        &self,
        txn: &Transaction<'_>,
        item_id: &str,
        subitem_name: &str,
    ) -> Result<Map<String, Value>, TesseraError> {
        let prototype = self.subitem_prototypes.get(subitem_name)?;
        let table = sql::table_name(&[&self.item_type, subitem_name])?;
        read_whole_item(txn, &table, prototype, item_id)
    }
}

fn read_whole_item(
    txn: &Transaction<'_>,
    item_type: &str,
    prototype: &Prototype,
    item_id: &str,
) -> Result<Map<String, Value>, TesseraError> {
    trace!(item_type, item_id, "reconstructing item");
    let conn: &Connection = txn;
    let walker = ReadWalker {
        conn,
        item_type,
        item_id,
    };
    let mut item = Map::new();
    walk_item(&mut item, prototype, &mut |item, region| {
        walker.visit(item, region)
    })?;
    Ok(item)
}

struct ReadWalker<'a> {
    conn: &'a Connection,
    item_type: &'a str,
    item_id: &'a str,
}

impl ReadWalker<'_> {
    fn visit(
        &self,
        item: &mut Map<String, Value>,
        region: ItemRegion<'_>,
    ) -> Result<(), TesseraError> {
        match region {
            ItemRegion::MainFields { columns } => self.read_main_row(item, columns),
            ItemRegion::StringList { field } => {
                let table = sql::table_name(&[self.item_type, field])?;
                let rows = self.read_ordered(&table, &["value"], &[("id", sql::text(self.item_id))])?;
                let values = rows.into_iter().map(first_value).collect();
                item.insert(field.to_string(), Value::Array(values));
                Ok(())
            }
            ItemRegion::DictList { field, columns } => {
                let table = sql::table_name(&[self.item_type, field])?;
                let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
                let rows =
                    self.read_ordered(&table, &column_refs, &[("id", sql::text(self.item_id))])?;
                let mut entries = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut entry = Map::new();
                    for (name, value) in columns.iter().zip(row) {
                        entry.insert(name.clone(), json_from_sql(value));
                    }
                    entries.push(Value::Object(entry));
                }
                item.insert(field.to_string(), Value::Array(entries));
                Ok(())
            }
            ItemRegion::NestedStringList { field, pos, nested } => {
                let table = sql::table_name(&[self.item_type, field, nested])?;
                let rows = self.read_ordered(
                    &table,
                    &["value"],
                    &[
                        ("id", sql::text(self.item_id)),
                        ("dict_list_pos", SqlValue::Integer(pos as i64)),
                    ],
                )?;
                let values = rows.into_iter().map(first_value).collect();

                // The walker only issues nested visits for entries the
                // dict-list visit created.
                let Some(entry) = item
                    .get_mut(field)
                    .and_then(Value::as_array_mut)
                    .and_then(|entries| entries.get_mut(pos))
                    .and_then(Value::as_object_mut)
                else {
                    return Ok(());
                };
                entry.insert(nested.to_string(), Value::Array(values));
                Ok(())
            }
        }
    }

    fn read_main_row(
        &self,
        item: &mut Map<String, Value>,
        columns: &[String],
    ) -> Result<(), TesseraError> {
        // A prototype with no scalar fields still has an identity row;
        // look up the id column so the select never sees an empty column
        // list.
        let lookup: Vec<&str> = if columns.is_empty() {
            vec!["id"]
        } else {
            columns.iter().map(String::as_str).collect()
        };
        let rows = sql::select_matching(
            self.conn,
            self.item_type,
            &lookup,
            &[("id", sql::text(self.item_id))],
            &[],
        )?;
        let Some(row) = rows.into_iter().next() else {
            return Err(TesseraError::ItemDoesNotExist {
                id: self.item_id.to_string(),
            });
        };
        for (name, value) in columns.iter().zip(row) {
            item.insert(name.clone(), json_from_sql(value));
        }
        Ok(())
    }

    /// Selects list rows for this item, restoring caller order from the
    /// position column. The position itself is not part of the result.
    fn read_ordered(
        &self,
        table: &str,
        columns: &[&str],
        matches: &[(&str, SqlValue)],
    ) -> Result<Vec<Vec<SqlValue>>, TesseraError> {
        let mut selected = Vec::with_capacity(columns.len() + 1);
        selected.push("list_pos");
        selected.extend_from_slice(columns);
        let rows = sql::select_matching(self.conn, table, &selected, matches, &["list_pos"])?;
        Ok(rows
            .into_iter()
            .map(|mut row| {
                row.remove(0);
                row
            })
            .collect())
    }
}

fn first_value(row: Vec<SqlValue>) -> Value {
    row.into_iter().next().map_or(Value::Null, json_from_sql)
}

fn json_from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => Value::from(f),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(_) => Value::Null,
    }
}
