//! Prototypes: immutable schema templates describing an item's shape.
//!
//! A prototype is written as an example JSON value, the way resource type
//! specifications declare them: `""` marks a scalar field, `[""]` a string
//! list, and `[{...}]` a list of dicts whose own fields may be scalars or
//! string lists but nothing deeper. That fixed depth is the whole schema
//! model; it is not a general document tree.

use crate::core::error::TesseraError;
use crate::core::sql;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar,
    StringList,
    DictList(Prototype),
}

/// Shape descriptor for one item or subitem type. Fields keep the
/// template's declaration order so traversal is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    fields: Vec<(String, FieldKind)>,
}

impl Prototype {
    pub fn from_template(template: &Value) -> Result<Prototype, TesseraError> {
        let map = template.as_object().ok_or_else(|| {
            TesseraError::InvalidPrototype("prototype template must be a JSON object".to_string())
        })?;
        Self::from_map(map, true)
    }

    fn from_map(map: &Map<String, Value>, dict_lists_allowed: bool) -> Result<Prototype, TesseraError> {
        let mut fields = Vec::with_capacity(map.len());
        for (name, value) in map {
            sql::check_identifier(name)?;
            let kind = match value {
                Value::String(_) => FieldKind::Scalar,
                Value::Array(entries) => {
                    let element = entries.first().ok_or_else(|| {
                        TesseraError::InvalidPrototype(format!(
                            "list field {} needs an element template",
                            name
                        ))
                    })?;
                    match element {
                        Value::String(_) => FieldKind::StringList,
                        Value::Object(inner) if dict_lists_allowed => {
                            FieldKind::DictList(Self::from_map(inner, false)?)
                        }
                        Value::Object(_) => {
                            return Err(TesseraError::InvalidPrototype(format!(
                                "field {} nests dicts deeper than one level",
                                name
                            )));
                        }
                        _ => {
                            return Err(TesseraError::InvalidPrototype(format!(
                                "list field {} must contain strings or dicts",
                                name
                            )));
                        }
                    }
                }
                _ => {
                    return Err(TesseraError::InvalidPrototype(format!(
                        "field {} must be a string or a list",
                        name
                    )));
                }
            };
            fields.push((name.clone(), kind));
        }
        Ok(Prototype { fields })
    }

    pub fn fields(&self) -> &[(String, FieldKind)] {
        &self.fields
    }

    /// Names of the scalar fields, in prototype order. These are the main
    /// table's data columns.
    pub fn scalar_columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, kind)| matches!(kind, FieldKind::Scalar))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Registry of subitem prototypes for one resource type, keyed by subitem
/// name.
#[derive(Debug, Clone, Default)]
pub struct SubItemPrototypes {
    prototypes: HashMap<String, Prototype>,
}

impl SubItemPrototypes {
    pub fn add(&mut self, subitem_name: &str, prototype: Prototype) {
        self.prototypes.insert(subitem_name.to_string(), prototype);
    }

    pub fn get(&self, subitem_name: &str) -> Result<&Prototype, TesseraError> {
        self.prototypes
            .get(subitem_name)
            .ok_or_else(|| TesseraError::UnknownSubitem(subitem_name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.prototypes.keys().map(String::as_str).collect()
    }
}
