use serde_json::json;
use std::collections::BTreeMap;
use tessera::core::db;
use tessera::core::error::TesseraError;
use tessera::core::prototype::Prototype;
use tessera::core::read::ReadOnlyStore;
use tessera::core::restype::{self, ResourceTypeSpec, SubpathSpec, VersionSpec};
use tessera::core::versioned::VersionedStorage;
use tessera::core::write::WriteOnlyStore;

fn person_spec() -> ResourceTypeSpec {
    let mut subpaths = BTreeMap::new();
    subpaths.insert(
        "secret".to_string(),
        SubpathSpec {
            prototype: json!({"secret_identity": ""}),
        },
    );
    ResourceTypeSpec {
        type_name: "person".to_string(),
        versions: vec![VersionSpec {
            version: "v1".to_string(),
            prototype: json!({
                "id": "",
                "revision": "",
                "name": "",
                "aliases": [""],
            }),
            subpaths,
        }],
    }
}

#[test]
fn stores_and_returns_specs() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut conn =
        db::db_connect(&tmp.path().join("registry.db").to_string_lossy()).expect("db connect");
    let txn = conn.transaction().expect("transaction");
    restype::prepare_tables(&txn).expect("prepare tables");

    let spec = person_spec();
    restype::add_or_update_spec(&txn, &spec).expect("add spec");

    assert_eq!(restype::get_types(&txn).expect("types"), vec!["person"]);
    assert_eq!(restype::get_spec(&txn, "person").expect("spec"), spec);
}

#[test]
fn overwrites_existing_spec_for_the_same_type() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut conn =
        db::db_connect(&tmp.path().join("registry.db").to_string_lossy()).expect("db connect");
    let txn = conn.transaction().expect("transaction");
    restype::prepare_tables(&txn).expect("prepare tables");

    restype::add_or_update_spec(&txn, &person_spec()).expect("add spec");

    let mut revised = person_spec();
    revised.versions.push(VersionSpec {
        version: "v2".to_string(),
        prototype: json!({"id": "", "revision": "", "name": "", "nickname": ""}),
        subpaths: BTreeMap::new(),
    });
    restype::add_or_update_spec(&txn, &revised).expect("update spec");

    assert_eq!(restype::get_types(&txn).expect("types"), vec!["person"]);
    assert_eq!(restype::get_spec(&txn, "person").expect("spec"), revised);
}

#[test]
fn unknown_types_are_a_typed_error() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut conn =
        db::db_connect(&tmp.path().join("registry.db").to_string_lossy()).expect("db connect");
    let txn = conn.transaction().expect("transaction");
    restype::prepare_tables(&txn).expect("prepare tables");

    let err = restype::get_spec(&txn, "unicorn").unwrap_err();
    assert!(matches!(err, TesseraError::UnknownResourceType(_)));
}

#[test]
fn deletes_specs() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut conn =
        db::db_connect(&tmp.path().join("registry.db").to_string_lossy()).expect("db connect");
    let txn = conn.transaction().expect("transaction");
    restype::prepare_tables(&txn).expect("prepare tables");

    restype::add_or_update_spec(&txn, &person_spec()).expect("add spec");
    restype::delete_spec(&txn, "person").expect("delete spec");

    assert!(restype::get_types(&txn).expect("types").is_empty());
    assert!(restype::get_spec(&txn, "person").is_err());
}

#[test]
fn registered_specs_drive_provisioning_end_to_end() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut conn =
        db::db_connect(&tmp.path().join("registry.db").to_string_lossy()).expect("db connect");
    let txn = conn.transaction().expect("transaction");
    restype::prepare_tables(&txn).expect("prepare tables");
    restype::add_or_update_spec(&txn, &person_spec()).expect("add spec");

    // Read the spec back out of the registry and provision from it, the
    // way a backend boots.
    let spec = restype::get_spec(&txn, "person").expect("spec");
    let vs = VersionedStorage::from_spec(&spec).expect("versioned storage");
    vs.prepare_storage(&txn).expect("prepare storage");

    let version = &spec.versions[0];
    let mut wo = WriteOnlyStore::new(
        &spec.type_name,
        Prototype::from_template(&version.prototype).expect("prototype"),
    );
    let mut ro = ReadOnlyStore::new(
        &spec.type_name,
        Prototype::from_template(&version.prototype).expect("prototype"),
    );
    for (subpath, subspec) in &version.subpaths {
        let prototype = Prototype::from_template(&subspec.prototype).expect("subitem prototype");
        wo.set_subitem_prototype(subpath, prototype.clone());
        ro.set_subitem_prototype(subpath, prototype);
    }

    let item = json!({"name": "James Bond", "aliases": ["007"]})
        .as_object()
        .expect("item")
        .clone();
    let added = wo.add_item(&txn, &item).expect("add item");
    let item_id = added["id"].as_str().expect("id");
    assert_eq!(ro.get_item(&txn, item_id).expect("get item"), added);

    let subitem = json!({"secret_identity": "Peter Parker"})
        .as_object()
        .expect("subitem")
        .clone();
    wo.update_subitem(
        &txn,
        item_id,
        added["revision"].as_str().expect("revision"),
        "secret",
        &subitem,
    )
    .expect("update subitem");

    assert_eq!(
        ro.get_subitem(&txn, item_id, "secret").expect("get subitem"),
        subitem
    );
    txn.commit().expect("commit");
}
