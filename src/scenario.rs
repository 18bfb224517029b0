// src/scenario.rs

//! Self-contained resolution scenarios
//!
//! A scenario file lists installed and available packages, the operations
//! to request, and optionally the expected outcome:
//!
//! ```json
//! {
//!   "installed": [{"name": "bar", "evr": "1.0-1"}],
//!   "available": [{"name": "foo", "evr": "1.0-1", "requires": ["bar >= 2.0"]},
//!                 {"name": "bar", "evr": "2.0-1"}],
//!   "transaction": [{"install": "foo"}],
//!   "expect": {"result": "ok", "install": ["foo-1.0-1.noarch"],
//!              "update": ["bar-2.0-1.noarch"]}
//! }
//! ```

use crate::config::{DEFAULT_INSTALLONLY, DEFAULT_INSTALLONLY_LIMIT};
use crate::error::{Error, Result};
use crate::packages::PackageRef;
use crate::repository::{MemoryRepo, PackageIter, PackageSpec, RepoSet, Repository};
use crate::transaction::{Resolution, Resolver, Transaction};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// A requested operation, naming a package by name or full key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Install(String),
    Update(String),
    Remove(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok,
    Unresolved,
}

impl From<Resolution> for Outcome {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Ok => Outcome::Ok,
            Resolution::Unresolved => Outcome::Unresolved,
        }
    }
}

/// Expected outcome; collections left out are not checked
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Expectation {
    #[serde(default)]
    pub result: Option<Outcome>,
    #[serde(default)]
    pub install: Option<Vec<String>>,
    #[serde(default)]
    pub update: Option<Vec<String>>,
    #[serde(default)]
    pub updated: Option<Vec<String>>,
    #[serde(default)]
    pub remove: Option<Vec<String>>,
    #[serde(default)]
    pub unresolved: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub installed: Vec<PackageSpec>,
    #[serde(default)]
    pub available: Vec<PackageSpec>,
    #[serde(default)]
    pub installonly: Option<Vec<String>>,
    #[serde(default)]
    pub installonly_limit: Option<usize>,
    pub transaction: Vec<Operation>,
    #[serde(default)]
    pub expect: Option<Expectation>,
}

fn owned<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    keys.map(str::to_string).collect()
}

/// Sorted keys of every transaction collection after resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub result: Outcome,
    pub install: Vec<String>,
    pub update: Vec<String>,
    pub updated: Vec<String>,
    pub remove: Vec<String>,
    /// `(key, problem)` pairs
    pub unresolved: Vec<(String, String)>,
}

impl Report {
    pub fn new(resolution: Resolution, trans: &Transaction) -> Self {
        Self {
            result: resolution.into(),
            install: owned(trans.install().keys()),
            update: owned(trans.update().keys()),
            updated: owned(trans.updated().keys()),
            remove: owned(trans.remove().keys()),
            unresolved: trans
                .unresolved()
                .iter()
                .map(|m| (m.package.key(), m.related.to_string()))
                .collect(),
        }
    }

    /// Human-readable summary, one line per action
    pub fn render(&self) -> String {
        let mut out = String::new();

        for key in &self.install {
            out.push_str(&format!("install   {}\n", key));
        }
        for key in &self.update {
            out.push_str(&format!("update    {}\n", key));
        }
        for key in &self.updated {
            out.push_str(&format!("replace   {}\n", key));
        }
        for key in &self.remove {
            out.push_str(&format!("remove    {}\n", key));
        }
        for (key, problem) in &self.unresolved {
            out.push_str(&format!("problem   {}: {}\n", key, problem));
        }

        let result = match self.result {
            Outcome::Ok => "resolved",
            Outcome::Unresolved => "unresolved",
        };
        out.push_str(&format!("Transaction {}\n", result));
        out
    }
}

/// Pick the package an operation refers to
///
/// An exact key match wins; otherwise the newest package of that name.
pub fn find_package(packages: PackageIter<'_>, target: &str) -> Option<PackageRef> {
    let mut best: Option<PackageRef> = None;

    for pkg in packages {
        if pkg.key() == target {
            return Some(pkg);
        }
        if pkg.name == target && best.as_ref().is_none_or(|b| pkg.evr > b.evr) {
            best = Some(pkg);
        }
    }

    best
}

fn not_found(target: &str, source: &str) -> Error {
    Error::NotFoundError(format!("No package {} among {} packages", target, source))
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Resolve the scenario's transaction
    pub fn run(&self) -> Result<Report> {
        let installed = MemoryRepo::from_specs("installed", "Installed", &self.installed)?;
        let mut repos = RepoSet::new();
        repos.add(Box::new(MemoryRepo::from_specs(
            "available",
            "Available",
            &self.available,
        )?));

        let installonly = self
            .installonly
            .clone()
            .unwrap_or_else(|| DEFAULT_INSTALLONLY.iter().map(|s| s.to_string()).collect());
        let limit = self.installonly_limit.unwrap_or(DEFAULT_INSTALLONLY_LIMIT);

        let mut resolver = Resolver::new(&installed, &repos).with_installonly(installonly, limit);

        for op in &self.transaction {
            debug!("Scheduling {:?}", op);
            match op {
                Operation::Install(target) => {
                    let pkg = find_package(repos.list_all()?, target)
                        .ok_or_else(|| not_found(target, "available"))?;
                    resolver.add_install(pkg)?;
                }
                Operation::Update(target) => {
                    let pkg = find_package(installed.list_all()?, target)
                        .ok_or_else(|| not_found(target, "installed"))?;
                    resolver.add_update(pkg)?;
                }
                Operation::Remove(target) => {
                    let pkg = find_package(installed.list_all()?, target)
                        .ok_or_else(|| not_found(target, "installed"))?;
                    resolver.add_remove(pkg)?;
                }
            }
        }

        let resolution = resolver.resolve()?;
        info!("Scenario resolved: {:?}", resolution);

        Ok(Report::new(resolution, resolver.transaction()))
    }

    /// Differences between `report` and the expectation, if any
    pub fn check(&self, report: &Report) -> Vec<String> {
        let Some(expect) = &self.expect else {
            return Vec::new();
        };

        let mut mismatches = Vec::new();

        if let Some(result) = expect.result {
            if result != report.result {
                mismatches.push(format!(
                    "result: expected {:?}, got {:?}",
                    result, report.result
                ));
            }
        }

        let unresolved: Vec<String> = report.unresolved.iter().map(|(k, _)| k.clone()).collect();
        let collections = [
            ("install", &expect.install, &report.install),
            ("update", &expect.update, &report.update),
            ("updated", &expect.updated, &report.updated),
            ("remove", &expect.remove, &report.remove),
            ("unresolved", &expect.unresolved, &unresolved),
        ];

        for (name, expected, actual) in collections {
            let Some(expected) = expected else {
                continue;
            };

            let mut expected = expected.clone();
            expected.sort();
            if expected != *actual {
                mismatches.push(format!(
                    "{}: expected {:?}, got {:?}",
                    name, expected, actual
                ));
            }
        }

        mismatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(json: &str) -> Scenario {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_operation_format() {
        let ops: Vec<Operation> =
            serde_json::from_str(r#"[{"install": "foo"}, {"update": "bar"}, {"remove": "baz"}]"#)
                .unwrap();
        assert_eq!(
            ops,
            vec![
                Operation::Install("foo".to_string()),
                Operation::Update("bar".to_string()),
                Operation::Remove("baz".to_string()),
            ]
        );
    }

    #[test]
    fn test_find_package_prefers_key_then_newest() {
        let specs: Vec<PackageSpec> = serde_json::from_str(
            r#"[{"name": "foo", "evr": "1.0-1"}, {"name": "foo", "evr": "2.0-1"},
                {"name": "foo", "evr": "1.5-1"}]"#,
        )
        .unwrap();
        let repo = MemoryRepo::from_specs("r", "r", &specs).unwrap();

        let find = |target: &str| find_package(repo.list_all().unwrap(), target).map(|p| p.key());

        assert_eq!(find("foo").as_deref(), Some("foo-2.0-1.noarch"));
        assert_eq!(find("foo-1.5-1.noarch").as_deref(), Some("foo-1.5-1.noarch"));
        assert_eq!(find("bar"), None);
    }

    #[test]
    fn test_run_and_check() {
        let s = scenario(
            r#"{
                "installed": [{"name": "bar", "evr": "1.0-1"}],
                "available": [
                    {"name": "foo", "evr": "1.0-1", "requires": ["bar >= 2.0"]},
                    {"name": "bar", "evr": "2.0-1"}
                ],
                "transaction": [{"install": "foo"}],
                "expect": {"result": "ok", "install": ["foo-1.0-1.noarch"],
                           "update": ["bar-2.0-1.noarch"], "updated": ["bar-1.0-1.noarch"],
                           "remove": []}
            }"#,
        );

        let report = s.run().unwrap();
        assert_eq!(report.result, Outcome::Ok);
        assert!(s.check(&report).is_empty(), "{:?}", s.check(&report));
    }

    #[test]
    fn test_check_reports_mismatches() {
        let s = scenario(
            r#"{
                "available": [{"name": "foo", "evr": "1.0-1", "requires": ["nothing"]}],
                "transaction": [{"install": "foo"}],
                "expect": {"result": "ok", "install": ["foo-1.0-1.noarch"]}
            }"#,
        );

        let report = s.run().unwrap();
        assert_eq!(report.result, Outcome::Unresolved);
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].1, "nothing provides nothing");
        assert_eq!(s.check(&report).len(), 2);
    }

    #[test]
    fn test_unknown_package_is_an_error() {
        let s = scenario(r#"{"transaction": [{"remove": "ghost"}]}"#);
        assert!(matches!(s.run(), Err(Error::NotFoundError(_))));
    }

    #[test]
    fn test_render() {
        let report = Report {
            result: Outcome::Ok,
            install: vec!["foo-1.0-1.noarch".to_string()],
            update: vec![],
            updated: vec![],
            remove: vec!["bar-1.0-1.noarch".to_string()],
            unresolved: vec![],
        };

        assert_eq!(
            report.render(),
            "install   foo-1.0-1.noarch\nremove    bar-1.0-1.noarch\nTransaction resolved\n"
        );
    }
}
