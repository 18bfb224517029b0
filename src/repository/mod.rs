// src/repository/mod.rs

//! Package sources queried by the resolver
//!
//! A repository answers queries with lazy iterators of packages. Two
//! implementations ship with the crate:
//! - `MemoryRepo`, filled in code or from a JSON package index
//! - `SqliteRepo`, reading a yum-style primary metadata database

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryRepo, PackageSpec, RepositoryIndex};
pub use sqlite::SqliteRepo;

use crate::config::{Config, RepoConfig, RepoFormat};
use crate::error::Result;
use crate::packages::{Dependency, PackageRef};
use std::path::Path;
use tracing::{debug, info};

/// Lazy sequence of packages returned by repository queries
pub type PackageIter<'a> = Box<dyn Iterator<Item = PackageRef> + 'a>;

/// A queryable set of packages
pub trait Repository {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Disabled repositories are skipped by `RepoSet` searches
    fn enabled(&self) -> bool {
        true
    }

    fn list_all(&self) -> Result<PackageIter<'_>>;

    fn list_by_name(&self, name: &str) -> Result<PackageIter<'_>>;

    /// Packages with a provide satisfying `dep`
    fn search_provides(&self, dep: &Dependency) -> Result<PackageIter<'_>>;

    /// Packages with a requirement satisfied by `dep`
    fn search_requires(&self, dep: &Dependency) -> Result<PackageIter<'_>>;

    /// Packages with a conflict matching `dep`
    fn search_conflicts(&self, dep: &Dependency) -> Result<PackageIter<'_>>;

    /// Packages with an obsolete matching `dep`
    fn search_obsoletes(&self, dep: &Dependency) -> Result<PackageIter<'_>>;

    /// Packages owning exactly `path`
    fn search_files(&self, path: &str) -> Result<PackageIter<'_>>;

    /// Case-insensitive substring match on name, summary, description and url
    fn search_details(&self, query: &str) -> Result<PackageIter<'_>>;
}

/// Ordered collection of repositories searched as one
#[derive(Default)]
pub struct RepoSet {
    repos: Vec<Box<dyn Repository>>,
}

impl RepoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open every repository listed in the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut set = Self::new();

        for (id, repo_config) in &config.repos {
            set.add(open_repo(id, repo_config)?);
        }

        info!(
            "Loaded {} repositories ({} enabled)",
            set.repos.len(),
            set.enabled().count()
        );
        Ok(set)
    }

    pub fn add(&mut self, repo: Box<dyn Repository>) {
        debug!("Adding repository {} ({})", repo.id(), repo.name());
        self.repos.push(repo);
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// All repositories, enabled or not
    pub fn iter(&self) -> impl Iterator<Item = &(dyn Repository + 'static)> {
        self.repos.iter().map(|r| r.as_ref())
    }

    pub fn enabled(&self) -> impl Iterator<Item = &(dyn Repository + 'static)> {
        self.iter().filter(|r| r.enabled())
    }

    /// Run `query` against every enabled repository and chain the results
    fn chain<'a, F>(&'a self, query: F) -> Result<PackageIter<'a>>
    where
        F: Fn(&'a dyn Repository) -> Result<PackageIter<'a>>,
    {
        let mut iters = Vec::new();
        for repo in self.repos.iter().filter(|r| r.enabled()) {
            iters.push(query(repo.as_ref())?);
        }

        Ok(Box::new(iters.into_iter().flatten()))
    }

    pub fn list_all(&self) -> Result<PackageIter<'_>> {
        self.chain(|repo| repo.list_all())
    }

    pub fn list_by_name(&self, name: &str) -> Result<PackageIter<'_>> {
        self.chain(|repo| repo.list_by_name(name))
    }

    pub fn search_provides(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        self.chain(|repo| repo.search_provides(dep))
    }

    pub fn search_requires(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        self.chain(|repo| repo.search_requires(dep))
    }

    pub fn search_conflicts(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        self.chain(|repo| repo.search_conflicts(dep))
    }

    pub fn search_obsoletes(&self, dep: &Dependency) -> Result<PackageIter<'_>> {
        self.chain(|repo| repo.search_obsoletes(dep))
    }

    pub fn search_files(&self, path: &str) -> Result<PackageIter<'_>> {
        self.chain(|repo| repo.search_files(path))
    }

    pub fn search_details(&self, query: &str) -> Result<PackageIter<'_>> {
        self.chain(|repo| repo.search_details(query))
    }
}

/// Open one configured repository, inferring its format from the path
pub fn open_repo(id: &str, config: &RepoConfig) -> Result<Box<dyn Repository>> {
    let name = config.name.as_deref().unwrap_or(id);
    let format = config
        .format
        .unwrap_or_else(|| RepoFormat::from_path(&config.path));

    debug!(
        "Opening repository {} from {} as {:?}",
        id,
        config.path.display(),
        format
    );

    let repo: Box<dyn Repository> = match format {
        RepoFormat::Json => Box::new(
            MemoryRepo::from_json_file(id, name, &config.path)?.with_enabled(config.enabled),
        ),
        RepoFormat::Sqlite => {
            Box::new(SqliteRepo::open(id, name, &config.path)?.with_enabled(config.enabled))
        }
    };

    Ok(repo)
}

/// Open a standalone repository file (used for the installed set)
pub fn open_path(id: &str, path: &Path) -> Result<Box<dyn Repository>> {
    open_repo(
        id,
        &RepoConfig {
            name: None,
            enabled: true,
            path: path.to_path_buf(),
            format: None,
        },
    )
}
