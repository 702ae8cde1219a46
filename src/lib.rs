//! Tessera: a schema-driven document/relational storage engine.
//!
//! Tessera maps nested JSON documents ("items") onto flat relational
//! tables and reconstructs them on read, while enforcing
//! optimistic-concurrency revisioning. Every resource type is described
//! by a [`core::prototype::Prototype`], an example-shaped template of
//! scalar fields, string lists and one level of dict lists, and each
//! structural region of that shape gets its own table.
//!
//! # Architecture
//!
//! - [`core::prototype`]: shape templates for items and subitems
//! - [`core::walker`]: the single traversal both behaviors share
//! - [`core::read`] / [`core::write`]: document reconstruction and
//!   revision-checked mutation
//! - [`core::versioned`]: per-version table provisioning with additive
//!   carry-forward migration
//! - [`core::restype`]: runtime registry of the type specifications
//!   themselves
//!
//! All operations run inside a caller-supplied `rusqlite` transaction;
//! the engine holds no locks and spawns no work of its own. Two
//! concurrent updates from the same starting revision resolve to exactly
//! one winner; the loser gets
//! [`core::error::TesseraError::WrongRevision`] and may retry.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use tessera::core::{db, prototype::Prototype, versioned::VersionedStorage};
//! use tessera::core::{read::ReadOnlyStore, write::WriteOnlyStore};
//!
//! # fn main() -> Result<(), tessera::core::error::TesseraError> {
//! let template = json!({"id": "", "revision": "", "name": "", "aliases": [""]});
//!
//! let mut conn = db::db_connect("people.db")?;
//! let mut vs = VersionedStorage::new("person");
//! vs.start_version("v1", None);
//! vs.add_prototype(Prototype::from_template(&template)?)?;
//!
//! let txn = conn.transaction()?;
//! vs.prepare_storage(&txn)?;
//!
//! let wo = WriteOnlyStore::new("person", Prototype::from_template(&template)?);
//! let ro = ReadOnlyStore::new("person", Prototype::from_template(&template)?);
//!
//! let person = json!({"name": "James Bond", "aliases": ["007"]});
//! let added = wo.add_item(&txn, person.as_object().unwrap())?;
//! let read_back = ro.get_item(&txn, added["id"].as_str().unwrap())?;
//! assert_eq!(added, read_back);
//! txn.commit()?;
//! # Ok(())
//! # }
//! ```

pub mod core;
