// src/db/schema.rs

//! Schema for package metadata databases
//!
//! The tables mirror yum's `primary.sqlite` closely enough that such a file
//! can be opened directly; the version row lives in `db_info` as it does
//! there.

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version (yum's primary database version)
pub const SCHEMA_VERSION: i32 = 10;

/// Initialize the version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS db_info (dbversion INTEGER, checksum TEXT)",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT dbversion FROM db_info ORDER BY dbversion DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM db_info", [])?;
    conn.execute("INSERT INTO db_info (dbversion) VALUES (?1)", [version])?;
    Ok(())
}

/// Create the metadata tables if the database is older than `SCHEMA_VERSION`
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current metadata schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    create_tables(conn)?;
    set_schema_version(conn, SCHEMA_VERSION)?;

    info!("Metadata schema created at version {}", SCHEMA_VERSION);
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS packages (
            pkgKey INTEGER PRIMARY KEY,
            pkgId TEXT,
            name TEXT NOT NULL,
            arch TEXT NOT NULL,
            version TEXT NOT NULL,
            epoch TEXT,
            release TEXT,
            summary TEXT,
            description TEXT,
            url TEXT,
            rpm_license TEXT,
            size_package INTEGER
        );

        CREATE INDEX IF NOT EXISTS packagename ON packages (name);

        -- One table per relation, same columns
        CREATE TABLE IF NOT EXISTS provides (
            name TEXT NOT NULL, flags TEXT, epoch TEXT, version TEXT, release TEXT,
            pkgKey INTEGER REFERENCES packages(pkgKey) ON DELETE CASCADE
        );
        CREATE TABLE IF NOT EXISTS requires (
            name TEXT NOT NULL, flags TEXT, epoch TEXT, version TEXT, release TEXT,
            pkgKey INTEGER REFERENCES packages(pkgKey) ON DELETE CASCADE,
            pre BOOLEAN DEFAULT FALSE
        );
        CREATE TABLE IF NOT EXISTS conflicts (
            name TEXT NOT NULL, flags TEXT, epoch TEXT, version TEXT, release TEXT,
            pkgKey INTEGER REFERENCES packages(pkgKey) ON DELETE CASCADE
        );
        CREATE TABLE IF NOT EXISTS obsoletes (
            name TEXT NOT NULL, flags TEXT, epoch TEXT, version TEXT, release TEXT,
            pkgKey INTEGER REFERENCES packages(pkgKey) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS providesname ON provides (name);
        CREATE INDEX IF NOT EXISTS requiresname ON requires (name);
        CREATE INDEX IF NOT EXISTS conflictsname ON conflicts (name);
        CREATE INDEX IF NOT EXISTS obsoletesname ON obsoletes (name);
        CREATE INDEX IF NOT EXISTS pkgprovides ON provides (pkgKey);
        CREATE INDEX IF NOT EXISTS pkgrequires ON requires (pkgKey);
        CREATE INDEX IF NOT EXISTS pkgconflicts ON conflicts (pkgKey);
        CREATE INDEX IF NOT EXISTS pkgobsoletes ON obsoletes (pkgKey);

        CREATE TABLE IF NOT EXISTS files (
            name TEXT NOT NULL,
            type TEXT,
            pkgKey INTEGER REFERENCES packages(pkgKey) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS filenames ON files (name);
        CREATE INDEX IF NOT EXISTS pkgfiles ON files (pkgKey);
        ",
    )?;

    Ok(())
}
