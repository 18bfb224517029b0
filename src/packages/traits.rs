// src/packages/traits.rs

//! Common traits for package metadata sources

use crate::error::Result;
use crate::packages::dependency::Dependency;

/// Dependency and file lists of a package
///
/// These are the expensive parts of a package's metadata, so repositories
/// may hand them out lazily through a `DetailsLoader`.
#[derive(Debug, Clone, Default)]
pub struct PackageDetails {
    pub provides: Vec<Dependency>,
    pub requires: Vec<Dependency>,
    pub conflicts: Vec<Dependency>,
    pub obsoletes: Vec<Dependency>,
    pub files: Vec<String>,
}

/// Deferred source of a package's details
///
/// Called at most once per package, the first time any dependency or file
/// list is asked for.
pub trait DetailsLoader {
    fn load(&self) -> Result<PackageDetails>;
}
