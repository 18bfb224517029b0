// src/db/mod.rs

//! SQLite access for package metadata databases
//!
//! Metadata databases follow the layout of yum's `primary.sqlite`: one
//! `packages` table plus one table per dependency relation and a `files`
//! table, all joined on `pkgKey`.

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Create (or upgrade) a metadata database at the specified path
///
/// Creates parent directories and the schema. Calling it on an existing
/// database is safe.
pub fn init(db_path: &str) -> Result<Connection> {
    debug!("Initializing metadata database at: {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    info!("Metadata database ready at {}", db_path);
    Ok(conn)
}

/// Open an existing metadata database
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        return Err(Error::DatabaseNotFound(db_path.to_string()));
    }

    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

    Ok(conn)
}
