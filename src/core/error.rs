use rusqlite;
use std::io;
use thiserror::Error;

/// All conditions the engine can raise. Domain conditions
/// (`ItemDoesNotExist`, the add preconditions, `WrongRevision`) are
/// expected and recoverable; the surrounding application decides how to
/// present them.
#[derive(Error, Debug)]
pub enum TesseraError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("item {id} does not exist")]
    ItemDoesNotExist { id: String },
    #[error("cannot add an item that already has an id ({id})")]
    CannotAddWithId { id: String },
    #[error("cannot add an item that already has a revision ({revision})")]
    CannotAddWithRevision { revision: String },
    #[error("revision {supplied} does not match current revision {current}")]
    WrongRevision { current: String, supplied: String },
    #[error("item is missing required field {0}")]
    MissingField(&'static str),
    #[error("invalid prototype: {0}")]
    InvalidPrototype(String),
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("table name {0} is derived from more than one field path")]
    TableNameConflict(String),
    #[error("a schema version must be started before prototypes are added")]
    VersionNotStarted,
    #[error("resource type {0} is not known")]
    UnknownResourceType(String),
    #[error("no subitem {0} is configured for this resource type")]
    UnknownSubitem(String),
}
