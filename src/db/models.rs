// src/db/models.rs

//! Row types for the metadata database
//!
//! Each struct maps one table and knows how to insert itself and how to
//! read itself back from a row.

use crate::error::{Error, Result};
use crate::packages::{Dependency, DependencySense};
use crate::version::Evr;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Which relation table a dependency row lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Provides,
    Requires,
    Conflicts,
    Obsoletes,
}

impl DependencyKind {
    pub fn table_name(&self) -> &str {
        match self {
            DependencyKind::Provides => "provides",
            DependencyKind::Requires => "requires",
            DependencyKind::Conflicts => "conflicts",
            DependencyKind::Obsoletes => "obsoletes",
        }
    }
}

/// A row of the `packages` table
#[derive(Debug, Clone)]
pub struct PackageRow {
    pub pkg_key: Option<i64>,
    pub pkg_id: Option<String>,
    pub name: String,
    pub arch: String,
    pub epoch: Option<String>,
    pub version: String,
    pub release: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub license: Option<String>,
    pub size: Option<i64>,
}

const PACKAGE_COLUMNS: &str = "pkgKey, pkgId, name, arch, epoch, version, release, \
     summary, description, url, rpm_license, size_package";

impl PackageRow {
    pub fn new(name: String, arch: String, evr: &Evr) -> Self {
        Self {
            pkg_key: None,
            pkg_id: None,
            name,
            arch,
            epoch: evr.epoch.clone(),
            version: evr.version.clone(),
            release: evr.release.clone(),
            summary: None,
            description: None,
            url: None,
            license: None,
            size: None,
        }
    }

    /// The row's EVR; an epoch of `0` is treated as no epoch
    pub fn evr(&self) -> Evr {
        let epoch = self.epoch.as_deref().filter(|e| *e != "0");
        Evr::new(epoch, &self.version, self.release.as_deref())
    }

    /// Insert this package into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO packages (pkgId, name, arch, epoch, version, release,
                                   summary, description, url, rpm_license, size_package)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                &self.pkg_id,
                &self.name,
                &self.arch,
                &self.epoch,
                &self.version,
                &self.release,
                &self.summary,
                &self.description,
                &self.url,
                &self.license,
                &self.size,
            ],
        )?;

        let key = conn.last_insert_rowid();
        self.pkg_key = Some(key);
        Ok(key)
    }

    /// Find a package by its key
    pub fn find_by_key(conn: &Connection, pkg_key: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM packages WHERE pkgKey = ?1",
            PACKAGE_COLUMNS
        ))?;

        let row = stmt.query_row([pkg_key], Self::from_row).optional()?;

        Ok(row)
    }

    /// Find packages by exact name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM packages WHERE name = ?1 ORDER BY pkgKey",
            PACKAGE_COLUMNS
        ))?;

        let rows = stmt
            .query_map([name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Case-insensitive substring search over name, summary, description and url
    pub fn search(conn: &Connection, pattern: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM packages
             WHERE name LIKE ?1 OR summary LIKE ?1 OR description LIKE ?1 OR url LIKE ?1
             ORDER BY name, pkgKey",
            PACKAGE_COLUMNS
        ))?;

        let search_pattern = format!("%{}%", pattern);
        let rows = stmt
            .query_map([&search_pattern], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// List all packages
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM packages ORDER BY name, pkgKey",
            PACKAGE_COLUMNS
        ))?;

        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            pkg_key: Some(row.get(0)?),
            pkg_id: row.get(1)?,
            name: row.get(2)?,
            arch: row.get(3)?,
            epoch: row.get(4)?,
            version: row.get(5)?,
            release: row.get(6)?,
            summary: row.get(7)?,
            description: row.get(8)?,
            url: row.get(9)?,
            license: row.get(10)?,
            size: row.get(11)?,
        })
    }
}

/// A row of one of the relation tables
#[derive(Debug, Clone)]
pub struct DependencyRow {
    pub pkg_key: i64,
    pub name: String,
    pub flags: Option<String>,
    pub epoch: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
}

impl DependencyRow {
    /// Build a row from a dependency belonging to `pkg_key`
    pub fn from_dependency(pkg_key: i64, dep: &Dependency) -> Self {
        let evr = dep.evr().map(Evr::parse);

        Self {
            pkg_key,
            name: dep.name().to_string(),
            flags: dep.sense().as_flags().map(str::to_string),
            epoch: evr.as_ref().and_then(|e| e.epoch.clone()),
            version: evr.as_ref().map(|e| e.version.clone()),
            release: evr.and_then(|e| e.release),
        }
    }

    /// Convert back to a dependency
    pub fn to_dependency(&self) -> Result<Dependency> {
        let sense = DependencySense::from_flags(self.flags.as_deref())?;

        if sense == DependencySense::None {
            return Dependency::new(&self.name, sense, None);
        }

        let version = self.version.as_deref().ok_or_else(|| {
            Error::InvalidDependency(format!("{}: flags without a version", self.name))
        })?;
        let evr = Evr::new(self.epoch.as_deref(), version, self.release.as_deref());

        Dependency::new(&self.name, sense, Some(evr.to_string()))
    }

    /// Insert this row into the table for `kind`
    pub fn insert(&self, conn: &Connection, kind: DependencyKind) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO {} (name, flags, epoch, version, release, pkgKey)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                kind.table_name()
            ),
            params![
                &self.name,
                &self.flags,
                &self.epoch,
                &self.version,
                &self.release,
                self.pkg_key,
            ],
        )?;
        Ok(())
    }

    /// All rows of `kind` belonging to one package
    pub fn find_by_package(
        conn: &Connection,
        kind: DependencyKind,
        pkg_key: i64,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT pkgKey, name, flags, epoch, version, release FROM {} WHERE pkgKey = ?1",
            kind.table_name()
        ))?;

        let rows = stmt
            .query_map([pkg_key], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// All rows of `kind` carrying the capability `name`
    pub fn find_by_name(conn: &Connection, kind: DependencyKind, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT pkgKey, name, flags, epoch, version, release FROM {} WHERE name = ?1
             ORDER BY pkgKey",
            kind.table_name()
        ))?;

        let rows = stmt
            .query_map([name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            pkg_key: row.get(0)?,
            name: row.get(1)?,
            flags: row.get(2)?,
            epoch: row.get(3)?,
            version: row.get(4)?,
            release: row.get(5)?,
        })
    }
}

/// A row of the `files` table
#[derive(Debug, Clone)]
pub struct FileRow {
    pub pkg_key: i64,
    pub path: String,
    pub file_type: Option<String>,
}

impl FileRow {
    pub fn new(pkg_key: i64, path: String) -> Self {
        Self {
            pkg_key,
            path,
            file_type: Some("file".to_string()),
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO files (name, type, pkgKey) VALUES (?1, ?2, ?3)",
            params![&self.path, &self.file_type, self.pkg_key],
        )?;
        Ok(())
    }

    /// All files owned by one package
    pub fn find_by_package(conn: &Connection, pkg_key: i64) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT pkgKey, name, type FROM files WHERE pkgKey = ?1 ORDER BY name")?;

        let rows = stmt
            .query_map([pkg_key], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Keys of the packages owning `path`
    pub fn find_owners(conn: &Connection, path: &str) -> Result<Vec<i64>> {
        let mut stmt =
            conn.prepare("SELECT DISTINCT pkgKey FROM files WHERE name = ?1 ORDER BY pkgKey")?;

        let keys = stmt
            .query_map([path], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(keys)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            pkg_key: row.get(0)?,
            path: row.get(1)?,
            file_type: row.get(2)?,
        })
    }
}
