//! Opaque identifier and revision token generation.
//!
//! Items never choose their own identity: the write store invents an `id`
//! on create and a fresh `revision` on every accepted mutation. Both are
//! ULID strings, which are unique enough that two sequential revisions of
//! the same item can never collide.

use ulid::Ulid;

/// Returns a new item id.
pub fn new_item_id() -> String {
    Ulid::new().to_string()
}

/// Returns a new revision token. Content-independent: regenerated on every
/// accepted mutation, never derived from the item's fields.
pub fn new_revision() -> String {
    Ulid::new().to_string()
}
