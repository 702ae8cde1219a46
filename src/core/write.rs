//! Write-side persistence: create, update and delete items and subitems.
//!
//! Every mutation runs inside the caller's transaction. Revision
//! preconditions are checked before the first row write, so a failed
//! check has no side effects and anything after it rolls back with the
//! transaction.

use crate::core::error::TesseraError;
use crate::core::ident;
use crate::core::prototype::{FieldKind, Prototype, SubItemPrototypes};
use crate::core::sql;
use crate::core::walker::{walk_item, ItemRegion};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Transaction};
use serde_json::{Map, Value};
use tracing::debug;

/// Write interface to one resource type's table set.
pub struct WriteOnlyStore {
    item_type: String,
    prototype: Prototype,
    subitem_prototypes: SubItemPrototypes,
}

impl WriteOnlyStore {
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

    /// Adds a new item, inventing its `id` and `revision`. The caller must
    /// not supply either.
    pub fn add_item(
        &self,
        txn: &Transaction<'_>,
        item: &Map<String, Value>,
    ) -> Result<Map<String, Value>, TesseraError> {
        if let Some(id) = item.get("id") {
            return Err(TesseraError::CannotAddWithId {
                id: value_as_text(id),
            });
        }
        if let Some(revision) = item.get("revision") {
            return Err(TesseraError::CannotAddWithRevision {
                revision: value_as_text(revision),
            });
        }

        let item_id = ident::new_item_id();
        let mut added = item.clone();
        added.insert("id".to_string(), Value::String(item_id.clone()));
        added.insert(
            "revision".to_string(),
            Value::String(ident::new_revision()),
        );
        write_item_rows(
            txn,
            &self.item_type,
            &self.prototype,
            &item_id,
            &mut added,
            MainRowOp::Insert,
        )?;
        debug!(item_type = %self.item_type, id = %item_id, "added item");
        Ok(added)
    }

    /// Rewrites an existing item in full. The supplied `revision` must
    /// match the stored one; on success the item gets a fresh revision.
    pub fn update_item(
        &self,
        txn: &Transaction<'_>,
        item: &Map<String, Value>,
    ) -> Result<Map<String, Value>, TesseraError> {
        let item_id = string_field(item, "id")?;
        let supplied = string_field(item, "revision")?;
        let current = current_revision(txn, &self.item_type, &item_id)?;
        if supplied != current {
            return Err(TesseraError::WrongRevision { current, supplied });
        }

        let mut updated = item.clone();
        updated.insert(
            "revision".to_string(),
            Value::String(ident::new_revision()),
        );
        // List lengths may have changed, so list rows are replaced
        // wholesale; the main row is rewritten in place.
        delete_item_rows(txn, &self.item_type, &self.prototype, &item_id, TableScope::ListsOnly)?;
        write_item_rows(
            txn,
            &self.item_type,
            &self.prototype,
            &item_id,
            &mut updated,
            MainRowOp::Update,
        )?;
        debug!(item_type = %self.item_type, id = %item_id, "updated item");
        Ok(updated)
    }

    /// Removes all rows for `item_id`, including its subitems' rows. An id
    /// with no rows is a silent no-op.
    pub fn delete_item(&self, txn: &Transaction<'_>, item_id: &str) -> Result<(), TesseraError> {
        delete_item_rows(txn, &self.item_type, &self.prototype, item_id, TableScope::All)?;
        for subitem_name in self.subitem_prototypes.names() {
            let table = sql::table_name(&[&self.item_type, subitem_name])?;
            let prototype = self.subitem_prototypes.get(subitem_name)?;
            delete_item_rows(txn, &table, prototype, item_id, TableScope::All)?;
        }
        debug!(item_type = %self.item_type, id = %item_id, "deleted item");
        Ok(())
    }

    /// Replaces a subitem's rows and bumps the parent's revision. The
    /// parent must exist and `expected_revision` must match its current
    /// revision; the subitem itself is replace-on-write, so this is also
    /// the create path. Returns the parent's new revision.
    pub fn update_subitem(
        &self,
        txn: &Transaction<'_>,
        item_id: &str,
        expected_revision: &str,
        subitem_name: &str,
        subitem: &Map<String, Value>,
    ) -> Result<String, TesseraError> {
        let prototype = self.subitem_prototypes.get(subitem_name)?;
        let current = current_revision(txn, &self.item_type, item_id)?;
        if expected_revision != current {
            return Err(TesseraError::WrongRevision {
                current,
                supplied: expected_revision.to_string(),
            });
        }

        let table = sql::table_name(&[&self.item_type, subitem_name])?;
        delete_item_rows(txn, &table, prototype, item_id, TableScope::All)?;
        let mut stored = subitem.clone();
        write_item_rows(txn, &table, prototype, item_id, &mut stored, MainRowOp::Insert)?;

        // The parent anchors consistency for all its subitems: bump its
        // revision even though none of its own columns changed.
        let new_revision = ident::new_revision();
        sql::update_matching(
            txn,
            &self.item_type,
            &[("id", sql::text(item_id))],
            &[("revision", sql::text(&new_revision))],
        )?;
        debug!(
            item_type = %self.item_type,
            id = %item_id,
            subitem = %subitem_name,
            "updated subitem"
        );
        Ok(new_revision)
    }
}

#[derive(Clone, Copy)]
enum MainRowOp {
    Insert,
    Update,
}

#[derive(Clone, Copy, PartialEq)]
enum TableScope {
    All,
    ListsOnly,
}

fn write_item_rows(
    txn: &Transaction<'_>,
    item_type: &str,
    prototype: &Prototype,
    item_id: &str,
    item: &mut Map<String, Value>,
    main_op: MainRowOp,
) -> Result<(), TesseraError> {
    let conn: &Connection = txn;
    let walker = WriteWalker {
        conn,
        item_type,
        item_id,
        main_op,
    };
    walk_item(item, prototype, &mut |item, region| {
        walker.visit(item, region)
    })
}

struct WriteWalker<'a> {
    conn: &'a Connection,
    item_type: &'a str,
    item_id: &'a str,
    main_op: MainRowOp,
}

impl WriteWalker<'_> {
    fn visit(
        &self,
        item: &mut Map<String, Value>,
        region: ItemRegion<'_>,
    ) -> Result<(), TesseraError> {
        match region {
            ItemRegion::MainFields { columns } => {
                let mut values: Vec<(&str, SqlValue)> = Vec::with_capacity(columns.len() + 1);
                values.push(("id", sql::text(self.item_id)));
                for name in columns {
                    if name.as_str() == "id" {
                        continue;
                    }
                    values.push((name.as_str(), sql_from_json(item.get(name.as_str()))));
                }
                match self.main_op {
                    MainRowOp::Insert => sql::insert(self.conn, self.item_type, &values),
                    MainRowOp::Update => sql::update_matching(
                        self.conn,
                        self.item_type,
                        &[("id", sql::text(self.item_id))],
                        &values[1..],
                    ),
                }
            }
            ItemRegion::StringList { field } => {
                let table = sql::table_name(&[self.item_type, field])?;
                let Some(entries) = item.get(field).and_then(Value::as_array) else {
                    return Ok(());
                };
                for (pos, value) in entries.iter().enumerate() {
                    sql::insert(
                        self.conn,
                        &table,
                        &[
                            ("id", sql::text(self.item_id)),
                            ("list_pos", SqlValue::Integer(pos as i64)),
                            ("value", sql_from_json(Some(value))),
                        ],
                    )?;
                }
                Ok(())
            }
            ItemRegion::DictList { field, columns } => {
                let table = sql::table_name(&[self.item_type, field])?;
                let Some(entries) = item.get(field).and_then(Value::as_array) else {
                    return Ok(());
                };
                for (pos, entry) in entries.iter().enumerate() {
                    let entry_map = entry.as_object();
                    let mut values: Vec<(&str, SqlValue)> =
                        Vec::with_capacity(columns.len() + 2);
                    values.push(("id", sql::text(self.item_id)));
                    values.push(("list_pos", SqlValue::Integer(pos as i64)));
                    for name in columns {
                        let value = entry_map.and_then(|map| map.get(name.as_str()));
                        values.push((name.as_str(), sql_from_json(value)));
                    }
                    sql::insert(self.conn, &table, &values)?;
                }
                Ok(())
            }
            ItemRegion::NestedStringList { field, pos, nested } => {
                let table = sql::table_name(&[self.item_type, field, nested])?;
                let Some(entries) = item
                    .get(field)
                    .and_then(Value::as_array)
                    .and_then(|entries| entries.get(pos))
                    .and_then(Value::as_object)
                    .and_then(|entry| entry.get(nested))
                    .and_then(Value::as_array)
                else {
                    return Ok(());
                };
                for (list_pos, value) in entries.iter().enumerate() {
                    sql::insert(
                        self.conn,
                        &table,
                        &[
                            ("id", sql::text(self.item_id)),
                            ("dict_list_pos", SqlValue::Integer(pos as i64)),
                            ("list_pos", SqlValue::Integer(list_pos as i64)),
                            ("value", sql_from_json(Some(value))),
                        ],
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// Reads the stored revision of an item's main row, or fails with
/// `ItemDoesNotExist`. This is the read-before-write half of the
/// optimistic-concurrency check.
fn current_revision(
    txn: &Transaction<'_>,
    item_type: &str,
    item_id: &str,
) -> Result<String, TesseraError> {
    let rows = sql::select_matching(
        txn,
        item_type,
        &["revision"],
        &[("id", sql::text(item_id))],
        &[],
    )?;
    let Some(row) = rows.into_iter().next() else {
        return Err(TesseraError::ItemDoesNotExist {
            id: item_id.to_string(),
        });
    };
    match row.into_iter().next() {
        Some(SqlValue::Text(revision)) => Ok(revision),
        _ => Ok(String::new()),
    }
}

/// Deletes an item's rows across a prototype's table set. `ListsOnly`
/// keeps the main row, for in-place updates.
fn delete_item_rows(
    txn: &Transaction<'_>,
    item_type: &str,
    prototype: &Prototype,
    item_id: &str,
    scope: TableScope,
) -> Result<(), TesseraError> {
    let id_match = [("id", sql::text(item_id))];
    if scope == TableScope::All {
        sql::delete_matching(txn, item_type, &id_match)?;
    }
    for (name, kind) in prototype.fields() {
        match kind {
            FieldKind::Scalar => {}
            FieldKind::StringList => {
                let table = sql::table_name(&[item_type, name])?;
                sql::delete_matching(txn, &table, &id_match)?;
            }
            FieldKind::DictList(inner) => {
                let table = sql::table_name(&[item_type, name])?;
                sql::delete_matching(txn, &table, &id_match)?;
                for (nested, nested_kind) in inner.fields() {
                    if matches!(nested_kind, FieldKind::StringList) {
                        let nested_table = sql::table_name(&[item_type, name, nested])?;
                        sql::delete_matching(txn, &nested_table, &id_match)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn string_field(item: &Map<String, Value>, field: &'static str) -> Result<String, TesseraError> {
    match item.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        _ => Err(TesseraError::MissingField(field)),
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn sql_from_json(value: Option<&Value>) -> SqlValue {
    match value {
        Some(Value::String(text)) => SqlValue::Text(text.clone()),
        Some(Value::Null) | None => SqlValue::Null,
        Some(other) => SqlValue::Text(other.to_string()),
    }
}
