// src/repository/sqlite.rs

//! Repository backed by a yum-style primary metadata database
//!
//! Package rows are read eagerly per query; dependency and file lists are
//! only fetched when the resolver first looks at them.

use crate::db;
use crate::db::models::{DependencyKind, DependencyRow, FileRow, PackageRow};
use crate::error::{Error, Result};
use crate::packages::{Dependency, DetailsLoader, Package, PackageDetails, PackageRef};
use crate::repository::{PackageIter, Repository};
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Read-only view of a metadata database
pub struct SqliteRepo {
    id: String,
    name: String,
    enabled: bool,
    conn: Rc<Connection>,
}

/// Fetches one package's relations on first use
struct SqliteDetails {
    conn: Rc<Connection>,
    pkg_key: i64,
}

impl SqliteDetails {
    fn relation(&self, kind: DependencyKind) -> Result<Vec<Dependency>> {
        DependencyRow::find_by_package(&self.conn, kind, self.pkg_key)?
            .iter()
            .map(DependencyRow::to_dependency)
            .collect()
    }
}

impl DetailsLoader for SqliteDetails {
    fn load(&self) -> Result<PackageDetails> {
        debug!("Loading details for package key {}", self.pkg_key);

        Ok(PackageDetails {
            provides: self.relation(DependencyKind::Provides)?,
            requires: self.relation(DependencyKind::Requires)?,
            conflicts: self.relation(DependencyKind::Conflicts)?,
            obsoletes: self.relation(DependencyKind::Obsoletes)?,
            files: FileRow::find_by_package(&self.conn, self.pkg_key)?
                .into_iter()
                .map(|f| f.path)
                .collect(),
        })
    }
}

impl SqliteRepo {
    /// Open the database at `path`
    pub fn open(id: &str, name: &str, path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::ParseError(format!("Invalid path: {}", path.display())))?;
        let conn = db::open(path_str)?;

        Ok(Self::from_connection(id, name, conn))
    }

    pub fn from_connection(id: impl Into<String>, name: impl Into<String>, conn: Connection) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            conn: Rc::new(conn),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn to_package(&self, row: PackageRow) -> Result<PackageRef> {
        let pkg_key = row
            .pkg_key
            .ok_or_else(|| Error::NotFoundError(format!("{} has no package key", row.name)))?;

        let mut pkg = Package::new(row.name.clone(), row.arch.clone(), row.evr())
            .with_repo(self.id.clone())
            .with_loader(Box::new(SqliteDetails {
                conn: Rc::clone(&self.conn),
                pkg_key,
            }));
        pkg.summary = row.summary;
        pkg.description = row.description;
        pkg.url = row.url;
        pkg.license = row.license;
        pkg.size = row.size.unwrap_or(0).max(0) as u64;

        Ok(Rc::new(pkg))
    }

    fn to_packages(&self, rows: Vec<PackageRow>) -> Result<PackageIter<'_>> {
        let packages = rows
            .into_iter()
            .map(|row| self.to_package(row))
            .collect::<Result<Vec<_>>>()?;

        Ok(Box::new(packages.into_iter()))
    }

    fn packages_by_keys(&self, keys: impl IntoIterator<Item = i64>) -> Result<PackageIter<'_>> {
        let mut seen = HashSet::new();
        let mut rows = Vec::new();

        for key in keys {
            if !seen.insert(key) {
                continue;
            }
            if let Some(row) = PackageRow::find_by_key(&self.conn, key)? {
                rows.push(row);
            }
        }

        self.to_packages(rows)
    }

    /// Packages with an entry in `kind` that `query` matches
    fn search_relation(&self, kind: DependencyKind, query: &Dependency) -> Result<Vec<i64>> {
        let mut keys = Vec::new();

        for row in DependencyRow::find_by_name(&self.conn, kind, query.name())? {
            if query.satisfies(&row.to_dependency()?) {
                keys.push(row.pkg_key);
            }
        }

        Ok(keys)
    }
}

impl Repository for SqliteRepo {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn list_all(&self) -> Result<PackageIter<'_>> {
        self.to_packages(PackageRow::list_all(&self.conn)?)
    }

    fn list_by_name(&self, name: &str) -> Result<PackageIter<'_>> {
        self.to_packages(PackageRow::find_by_name(&self.conn, name)?)
    }

    fn search_provides(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        let mut keys = Vec::new();
        let mut named = HashSet::new();

        // Every package provides its own name, listed or not
        for row in PackageRow::find_by_name(&self.conn, dep.name())? {
            named.extend(row.pkg_key);
            if dep.satisfies(&Dependency::exact(&row.name, &row.evr())) {
                keys.extend(row.pkg_key);
            }
        }

        for row in DependencyRow::find_by_name(&self.conn, DependencyKind::Provides, dep.name())? {
            let provide = row.to_dependency()?;
            // An unversioned provide of the own name counts as `name = evr`
            if provide.evr().is_none() && named.contains(&row.pkg_key) {
                continue;
            }
            if dep.satisfies(&provide) {
                keys.push(row.pkg_key);
            }
        }

        self.packages_by_keys(keys)
    }

    fn search_requires(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        let keys = self.search_relation(DependencyKind::Requires, dep)?;
        self.packages_by_keys(keys)
    }

    fn search_conflicts(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        let keys = self.search_relation(DependencyKind::Conflicts, dep)?;
        self.packages_by_keys(keys)
    }

    fn search_obsoletes(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        let keys = self.search_relation(DependencyKind::Obsoletes, dep)?;
        self.packages_by_keys(keys)
    }

    fn search_files(&self, path: &str) -> Result<PackageIter<'_>> {
        let keys = FileRow::find_owners(&self.conn, path)?;
        self.packages_by_keys(keys)
    }

    fn search_details(&self, query: &str) -> Result<PackageIter<'_>> {
        self.to_packages(PackageRow::search(&self.conn, query)?)
    }
}
