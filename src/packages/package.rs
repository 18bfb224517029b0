// src/packages/package.rs

//! Package identity and lazily loaded metadata

use crate::arch::Arch;
use crate::error::Result;
use crate::packages::dependency::Dependency;
use crate::packages::traits::{DetailsLoader, PackageDetails};
use crate::version::Evr;
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a package
///
/// Repositories hand these out and transaction members hold on to them;
/// the package is freed when the last handle goes away.
pub type PackageRef = Rc<Package>;

/// A package as seen by the resolver
pub struct Package {
    pub name: String,
    pub arch: String,
    pub evr: Evr,
    /// Id of the repository this package was read from
    pub repo_id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub license: Option<String>,
    pub size: u64,
    details: OnceCell<PackageDetails>,
    loader: Option<Box<dyn DetailsLoader>>,
}

impl Package {
    /// Create a new package with no dependencies
    pub fn new(name: impl Into<String>, arch: impl Into<String>, evr: Evr) -> Self {
        Self {
            name: name.into(),
            arch: arch.into(),
            evr,
            repo_id: String::new(),
            summary: None,
            description: None,
            url: None,
            license: None,
            size: 0,
            details: OnceCell::new(),
            loader: None,
        }
    }

    pub fn with_repo(mut self, repo_id: impl Into<String>) -> Self {
        self.repo_id = repo_id.into();
        self
    }

    /// Attach details that are already known
    pub fn with_details(mut self, details: PackageDetails) -> Self {
        self.details = OnceCell::from(self.pin_own_provides(details));
        self
    }

    /// Attach a loader that fetches details on first use
    pub fn with_loader(mut self, loader: Box<dyn DetailsLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Identity key: `name-[epoch:]version-release.arch`
    pub fn key(&self) -> String {
        format!("{}-{}.{}", self.name, self.evr, self.arch)
    }

    pub fn arch_kind(&self) -> Arch {
        Arch::from(self.arch.as_str())
    }

    fn details(&self) -> Result<&PackageDetails> {
        if let Some(details) = self.details.get() {
            return Ok(details);
        }

        let loaded = match &self.loader {
            Some(loader) => loader.load()?,
            None => PackageDetails::default(),
        };

        Ok(self.details.get_or_init(|| self.pin_own_provides(loaded)))
    }

    /// Read an unversioned provide of the package's own name as `name = evr`
    fn pin_own_provides(&self, mut details: PackageDetails) -> PackageDetails {
        for provide in &mut details.provides {
            if provide.name() == self.name && provide.evr().is_none() {
                *provide = self.self_provide();
            }
        }
        details
    }

    pub fn provides(&self) -> Result<&[Dependency]> {
        Ok(&self.details()?.provides)
    }

    pub fn requires(&self) -> Result<&[Dependency]> {
        Ok(&self.details()?.requires)
    }

    pub fn conflicts(&self) -> Result<&[Dependency]> {
        Ok(&self.details()?.conflicts)
    }

    pub fn obsoletes(&self) -> Result<&[Dependency]> {
        Ok(&self.details()?.obsoletes)
    }

    pub fn files(&self) -> Result<&[String]> {
        Ok(&self.details()?.files)
    }

    /// Implicit `name = evr` provide
    pub fn self_provide(&self) -> Dependency {
        Dependency::exact(&self.name, &self.evr)
    }

    /// Explicit provides plus the implicit self provide
    pub fn all_provides(&self) -> Result<Vec<Dependency>> {
        let mut all = vec![self.self_provide()];
        all.extend(self.provides()?.iter().cloned());
        Ok(all)
    }

    /// Whether one of the package's provides satisfies `need`
    pub fn has_provide(&self, need: &Dependency) -> Result<bool> {
        Ok(need.satisfies(&self.self_provide())
            || self.provides()?.iter().any(|have| need.satisfies(have)))
    }

    /// Whether the package satisfies `need` through its provides or files
    pub fn provides_dependency(&self, need: &Dependency) -> Result<bool> {
        if self.has_provide(need)? {
            return Ok(true);
        }

        Ok(need.is_file() && self.files()?.iter().any(|f| f == need.name()))
    }

    /// Case-insensitive match of `query` against the descriptive fields
    pub fn matches_details(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        let contains = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|value| value.to_lowercase().contains(&query))
        };

        self.name.to_lowercase().contains(&query)
            || contains(&self.summary)
            || contains(&self.description)
            || contains(&self.url)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("key", &self.key())
            .field("repo_id", &self.repo_id)
            .field("loaded", &self.details.get().is_some())
            .finish()
    }
}
