//! Schema versioning: the migration authority for a resource type.
//!
//! A `VersionedStorage` collects the prototypes declared by each schema
//! version of one resource type and provisions the tables they imply.
//! Migration is additive: a new version that does not redeclare a subitem
//! carries the previous version's prototype forward, and provisioning is
//! idempotent, so restarting against an existing database is safe.

use crate::core::error::TesseraError;
use crate::core::prototype::{FieldKind, Prototype};
use crate::core::restype::ResourceTypeSpec;
use crate::core::sql::{self, ColumnKind};
use rusqlite::Transaction;
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub struct VersionedStorage {
    resource_type: String,
    versions: Vec<Version>,
}

struct Version {
    id: String,
    previous: Option<String>,
    prototypes: Vec<(Option<String>, Prototype)>,
}

impl VersionedStorage {
    pub fn new(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            versions: Vec::new(),
        }
    }

    /// Builds the full version chain from a serialized resource type
    /// specification.
    pub fn from_spec(spec: &ResourceTypeSpec) -> Result<Self, TesseraError> {
        let mut storage = Self::new(&spec.type_name);
        let mut previous: Option<String> = None;
        for version in &spec.versions {
            storage.start_version(&version.version, previous.as_deref());
            storage.add_prototype(Prototype::from_template(&version.prototype)?)?;
            for (subpath, subspec) in &version.subpaths {
                storage
                    .add_subitem_prototype(subpath, Prototype::from_template(&subspec.prototype)?)?;
            }
            previous = Some(version.version.clone());
        }
        Ok(storage)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Version ids in declaration order, each with its predecessor.
    pub fn versions(&self) -> Vec<(&str, Option<&str>)> {
        self.versions
            .iter()
            .map(|version| (version.id.as_str(), version.previous.as_deref()))
            .collect()
    }

    /// Establishes a new version node; subsequent prototype registrations
    /// attach to it.
    pub fn start_version(&mut self, version_id: &str, previous: Option<&str>) {
        self.versions.push(Version {
            id: version_id.to_string(),
            previous: previous.map(str::to_string),
            prototypes: Vec::new(),
        });
    }

    /// Attaches the main item prototype to the current version.
    pub fn add_prototype(&mut self, prototype: Prototype) -> Result<(), TesseraError> {
        self.attach(None, prototype)
    }

    /// Attaches a subitem prototype to the current version.
    pub fn add_subitem_prototype(
        &mut self,
        subpath: &str,
        prototype: Prototype,
    ) -> Result<(), TesseraError> {
        self.attach(Some(subpath.to_string()), prototype)
    }

    fn attach(
        &mut self,
        subpath: Option<String>,
        prototype: Prototype,
    ) -> Result<(), TesseraError> {
        let version = self
            .versions
            .last_mut()
            .ok_or(TesseraError::VersionNotStarted)?;
        version.prototypes.push((subpath, prototype));
        Ok(())
    }

    /// Creates every table implied by the effective prototype set,
    /// skipping tables that already exist.
    pub fn prepare_storage(&self, txn: &Transaction<'_>) -> Result<(), TesseraError> {
        for (table, columns) in self.table_plan()? {
            let column_refs: Vec<(&str, ColumnKind)> = columns
                .iter()
                .map(|(name, kind)| (name.as_str(), *kind))
                .collect();
            sql::create_table(txn, &table, &column_refs)?;
            debug!(resource_type = %self.resource_type, table = %table, "ensured table");
        }
        Ok(())
    }

    /// The prototypes in effect after applying every version in order:
    /// later redeclarations of the same subpath win, everything else is
    /// carried forward.
    fn effective_prototypes(&self) -> Vec<(Option<&str>, &Prototype)> {
        let mut order: Vec<Option<&str>> = Vec::new();
        let mut effective: HashMap<Option<&str>, &Prototype> = HashMap::new();
        for version in &self.versions {
            for (subpath, prototype) in &version.prototypes {
                let key = subpath.as_deref();
                if !effective.contains_key(&key) {
                    order.push(key);
                }
                effective.insert(key, prototype);
            }
        }
        order
            .into_iter()
            .filter_map(|key| effective.get(&key).map(|prototype| (key, *prototype)))
            .collect()
    }

    /// Every (table, columns) pair the effective prototypes imply. Fails
    /// with `TableNameConflict` if two distinct field paths derive the
    /// same physical name, which keeps the naming scheme injective over
    /// any schema that can actually be provisioned.
    fn table_plan(&self) -> Result<Vec<(String, Vec<(String, ColumnKind)>)>, TesseraError> {
        let mut plan = Vec::new();
        let mut claimed = HashSet::new();
        for (subpath, prototype) in self.effective_prototypes() {
            let base = match subpath {
                None => {
                    sql::check_identifier(&self.resource_type)?;
                    self.resource_type.clone()
                }
                Some(subpath) => sql::table_name(&[&self.resource_type, subpath])?,
            };
            plan_prototype_tables(&mut plan, &mut claimed, &base, prototype)?;
        }
        Ok(plan)
    }
}

fn plan_prototype_tables(
    plan: &mut Vec<(String, Vec<(String, ColumnKind)>)>,
    claimed: &mut HashSet<String>,
    base: &str,
    prototype: &Prototype,
) -> Result<(), TesseraError> {
    let mut main_columns = vec![("id".to_string(), ColumnKind::Text)];
    for column in prototype.scalar_columns() {
        if column != "id" {
            main_columns.push((column, ColumnKind::Text));
        }
    }
    claim(claimed, base)?;
    plan.push((base.to_string(), main_columns));

    for (field, kind) in prototype.fields() {
        match kind {
            FieldKind::Scalar => {}
            FieldKind::StringList => {
                let table = sql::table_name(&[base, field])?;
                claim(claimed, &table)?;
                plan.push((
                    table,
                    vec![
                        ("id".to_string(), ColumnKind::Text),
                        ("list_pos".to_string(), ColumnKind::Integer),
                        ("value".to_string(), ColumnKind::Text),
                    ],
                ));
            }
            FieldKind::DictList(inner) => {
                let table = sql::table_name(&[base, field])?;
                claim(claimed, &table)?;
                let mut columns = vec![
                    ("id".to_string(), ColumnKind::Text),
                    ("list_pos".to_string(), ColumnKind::Integer),
                ];
                for column in inner.scalar_columns() {
                    columns.push((column, ColumnKind::Text));
                }
                plan.push((table, columns));

                for (nested, nested_kind) in inner.fields() {
                    if matches!(nested_kind, FieldKind::StringList) {
                        let nested_table = sql::table_name(&[base, field, nested])?;
                        claim(claimed, &nested_table)?;
                        plan.push((
                            nested_table,
                            vec![
                                ("id".to_string(), ColumnKind::Text),
                                ("dict_list_pos".to_string(), ColumnKind::Integer),
                                ("list_pos".to_string(), ColumnKind::Integer),
                                ("value".to_string(), ColumnKind::Text),
                            ],
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

fn claim(claimed: &mut HashSet<String>, table: &str) -> Result<(), TesseraError> {
    if !claimed.insert(table.to_string()) {
        return Err(TesseraError::TableNameConflict(table.to_string()));
    }
    Ok(())
}
