//! One traversal over an item's structural regions.
//!
//! Read and write behavior share a single walk of the prototype: the
//! traversal function enumerates regions and a behavior-specific visit
//! function matches on the closed `ItemRegion` union. Region order is main
//! fields, then string-list fields, then dict-list fields with their
//! per-entry nested string lists, all in prototype order.

use crate::core::error::TesseraError;
use crate::core::prototype::{FieldKind, Prototype};
use serde_json::{Map, Value};

/// The four structural regions a prototype can describe.
#[derive(Debug)]
pub enum ItemRegion<'a> {
    /// All scalar fields at once, one main-table row.
    MainFields { columns: &'a [String] },
    /// One ordered string-list field.
    StringList { field: &'a str },
    /// One ordered dict-list field; each entry carries the given scalar
    /// columns.
    DictList { field: &'a str, columns: &'a [String] },
    /// A string-list field nested inside the dict-list entry at `pos`.
    NestedStringList {
        field: &'a str,
        pos: usize,
        nested: &'a str,
    },
}

/// Drives `visit` over every region of `prototype`. The number of nested
/// string-list visits for a dict-list field is the entry count of
/// `item[field]` after the `DictList` visit ran, so a read behavior that
/// fills the field and a write behavior that already has it walk the same
/// way. The walker raises nothing of its own; visitor errors propagate
/// unchanged.
pub fn walk_item<F>(
    item: &mut Map<String, Value>,
    prototype: &Prototype,
    visit: &mut F,
) -> Result<(), TesseraError>
where
    F: FnMut(&mut Map<String, Value>, ItemRegion<'_>) -> Result<(), TesseraError>,
{
    let main_columns = prototype.scalar_columns();
    visit(
        item,
        ItemRegion::MainFields {
            columns: &main_columns,
        },
    )?;

    for (name, kind) in prototype.fields() {
        if matches!(kind, FieldKind::StringList) {
            visit(item, ItemRegion::StringList { field: name })?;
        }
    }

    for (name, kind) in prototype.fields() {
        let FieldKind::DictList(inner) = kind else {
            continue;
        };
        let columns = inner.scalar_columns();
        visit(
            item,
            ItemRegion::DictList {
                field: name,
                columns: &columns,
            },
        )?;

        let entries = item
            .get(name.as_str())
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        for pos in 0..entries {
            for (nested, nested_kind) in inner.fields() {
                if matches!(nested_kind, FieldKind::StringList) {
                    visit(
                        item,
                        ItemRegion::NestedStringList {
                            field: name,
                            pos,
                            nested,
                        },
                    )?;
                }
            }
        }
    }
    Ok(())
}
