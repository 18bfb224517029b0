// src/repository/memory.rs

//! In-memory repository and the JSON package index format

use crate::error::Result;
use crate::packages::{Dependency, Package, PackageDetails, PackageRef};
use crate::repository::{PackageIter, Repository};
use crate::version::Evr;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// JSON package index: `{"packages": [...]}`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RepositoryIndex {
    #[serde(default)]
    pub name: Option<String>,
    pub packages: Vec<PackageSpec>,
}

/// Package description in a JSON index or scenario file
///
/// Dependencies use the textual form (`foo`, `foo >= 1.0-1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default = "default_arch")]
    pub arch: String,
    pub evr: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub obsoletes: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

fn default_arch() -> String {
    "noarch".to_string()
}

fn parse_all(deps: &[String]) -> Result<Vec<Dependency>> {
    deps.iter().map(|d| Dependency::parse(d)).collect()
}

impl PackageSpec {
    /// Build a package; fails on the first malformed dependency
    pub fn to_package(&self) -> Result<Package> {
        let details = PackageDetails {
            provides: parse_all(&self.provides)?,
            requires: parse_all(&self.requires)?,
            conflicts: parse_all(&self.conflicts)?,
            obsoletes: parse_all(&self.obsoletes)?,
            files: self.files.clone(),
        };

        let mut pkg = Package::new(&self.name, &self.arch, Evr::parse(&self.evr));
        pkg.summary = self.summary.clone();
        pkg.description = self.description.clone();
        pkg.url = self.url.clone();
        pkg.license = self.license.clone();
        pkg.size = self.size;

        Ok(pkg.with_details(details))
    }
}

/// Repository holding its packages in memory
pub struct MemoryRepo {
    id: String,
    name: String,
    enabled: bool,
    packages: Vec<PackageRef>,
}

impl MemoryRepo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            packages: Vec::new(),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Build a repository from package descriptions
    pub fn from_specs(
        id: impl Into<String>,
        name: impl Into<String>,
        specs: &[PackageSpec],
    ) -> Result<Self> {
        let mut repo = Self::new(id, name);
        for spec in specs {
            repo.add(spec.to_package()?);
        }
        Ok(repo)
    }

    /// Load a JSON package index
    pub fn from_json_file(id: &str, name: &str, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let index: RepositoryIndex = serde_json::from_str(&content)?;

        debug!(
            "Read {} packages for repository {} from {}",
            index.packages.len(),
            id,
            path.display()
        );

        Self::from_specs(id, name, &index.packages)
    }

    /// Add a package, tagging it with this repository's id
    pub fn add(&mut self, pkg: Package) -> PackageRef {
        let pkg = Rc::new(pkg.with_repo(self.id.clone()));
        self.packages.push(Rc::clone(&pkg));
        pkg
    }

    pub fn packages(&self) -> &[PackageRef] {
        &self.packages
    }

    /// Packages matching `predicate`; the first failed detail lookup is
    /// returned as the error
    fn filter<F>(&self, predicate: F) -> Result<PackageIter<'_>>
    where
        F: Fn(&Package) -> Result<bool>,
    {
        let mut matched = Vec::new();
        for pkg in &self.packages {
            if predicate(pkg)? {
                matched.push(Rc::clone(pkg));
            }
        }

        Ok(Box::new(matched.into_iter()))
    }
}

fn any_satisfied(query: &Dependency, list: &[Dependency]) -> bool {
    list.iter().any(|entry| query.satisfies(entry))
}

impl Repository for MemoryRepo {
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
        Ok(Box::new(self.packages.iter().cloned()))
    }

    fn list_by_name(&self, name: &str) -> Result<PackageIter<'_>> {
        self.filter(|pkg| Ok(pkg.name == name))
    }

    fn search_provides(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        self.filter(|pkg| pkg.has_provide(dep))
    }

    fn search_requires(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        self.filter(|pkg| Ok(any_satisfied(dep, pkg.requires()?)))
    }

    fn search_conflicts(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        self.filter(|pkg| Ok(any_satisfied(dep, pkg.conflicts()?)))
    }

    fn search_obsoletes(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        self.filter(|pkg| Ok(any_satisfied(dep, pkg.obsoletes()?)))
    }

    fn search_files(&self, path: &str) -> Result<PackageIter<'_>> {
        self.filter(|pkg| Ok(pkg.files()?.iter().any(|f| f == path)))
    }

    fn search_details(&self, query: &str) -> Result<PackageIter<'_>> {
        self.filter(|pkg| Ok(pkg.matches_details(query)))
    }
}
