//! SQLite connection bootstrap.
//!
//! The engine itself only ever sees caller-supplied transactions; this is
//! the one place connection-level pragmas are set.

use crate::core::error::TesseraError;
use rusqlite::Connection;

pub fn db_connect(db_path: &str) -> Result<Connection, TesseraError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}
