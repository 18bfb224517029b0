// src/config.rs
//! Configuration file parsing
//!
//! Supports TOML configuration files with the following sections:
//! - [main] - Install-only packages, retention limit, debug switch, installed set
//! - [repos.*] - Repository metadata files

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rpmsolve/rpmsolve.toml";

/// Package names for which several versions may be installed side by side
pub const DEFAULT_INSTALLONLY: &[&str] = &[
    "kernel",
    "kernel-smp",
    "kernel-bigmem",
    "kernel-enterprise",
    "kernel-debug",
    "kernel-unsupported",
    "kernel-source",
    "kernel-devel",
    "kernel-PAE",
    "kernel-PAE-debug",
];

/// Default number of install-only versions kept
pub const DEFAULT_INSTALLONLY_LIMIT: usize = 3;

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub main: MainSection,

    /// Repositories keyed by id, in id order
    #[serde(default)]
    pub repos: BTreeMap<String, RepoConfig>,
}

/// Resolver settings
#[derive(Debug, Deserialize)]
pub struct MainSection {
    #[serde(default = "default_installonly")]
    pub installonly: Vec<String>,

    /// Maximum installed versions of an install-only package (0 = unlimited)
    #[serde(default = "default_installonly_limit")]
    pub installonly_limit: usize,

    /// Verbose resolver logging
    #[serde(default)]
    pub debug: bool,

    /// Metadata file describing the installed packages
    #[serde(default)]
    pub installed: Option<PathBuf>,
}

impl Default for MainSection {
    fn default() -> Self {
        Self {
            installonly: default_installonly(),
            installonly_limit: DEFAULT_INSTALLONLY_LIMIT,
            debug: false,
            installed: None,
        }
    }
}

fn default_installonly() -> Vec<String> {
    DEFAULT_INSTALLONLY.iter().map(|s| s.to_string()).collect()
}

fn default_installonly_limit() -> usize {
    DEFAULT_INSTALLONLY_LIMIT
}

fn default_true() -> bool {
    true
}

/// One `[repos.<id>]` table
#[derive(Debug, Clone, Deserialize)]
pub struct RepoConfig {
    /// Display name; the id is used when absent
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metadata file (SQLite primary database or JSON index)
    pub path: PathBuf,

    /// Explicit format; inferred from the path when absent
    #[serde(default)]
    pub format: Option<RepoFormat>,
}

/// Storage format of a repository file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoFormat {
    Sqlite,
    Json,
}

impl RepoFormat {
    /// `.json` files are JSON indexes, everything else is SQLite
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => RepoFormat::Json,
            _ => RepoFormat::Sqlite,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = content.parse()?;

        // Relative repository paths are relative to the config file
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }

        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for repo in self.repos.values_mut() {
            if repo.path.is_relative() {
                repo.path = base.join(&repo.path);
            }
        }
        if let Some(installed) = self.main.installed.as_mut() {
            if installed.is_relative() {
                *installed = base.join(&*installed);
            }
        }
    }

    /// Check the configuration for problems
    pub fn validate(&self) -> Result<()> {
        if self.main.installonly.iter().any(|name| name.trim().is_empty()) {
            return Err(Error::ParseError(
                "installonly contains an empty package name".to_string(),
            ));
        }

        for (id, repo) in &self.repos {
            if repo.path.as_os_str().is_empty() {
                return Err(Error::ParseError(format!(
                    "Repository {} has an empty path",
                    id
                )));
            }
        }

        Ok(())
    }
}

impl std::str::FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
