// src/transaction/update.rs

//! Choosing between candidate packages
//!
//! Covers both picking the replacement for an installed package and picking
//! which available package should satisfy a requirement.

use super::resolve::Resolver;
use crate::arch::{self, Arch};
use crate::error::Result;
use crate::packages::{Dependency, DependencySense, PackageRef};
use std::cmp::Ordering;
use tracing::debug;

impl Resolver<'_> {
    /// Best available replacement for installed `pkg`
    ///
    /// Candidates are newer packages of the same name and packages that
    /// obsolete `name >= evr`. Returns `None` when nothing strictly better
    /// exists or when the winner's version is already installed.
    pub fn choose_best_for_update(&self, pkg: &PackageRef) -> Result<Option<PackageRef>> {
        let filter = Dependency::new(&pkg.name, DependencySense::Ge, Some(pkg.evr.to_string()))?;
        let target = pkg.arch_kind();

        let candidates: Vec<PackageRef> = self
            .repos
            .list_by_name(&pkg.name)?
            .chain(self.repos.search_obsoletes(&filter)?)
            .collect();

        let mut best: Option<PackageRef> = None;
        for candidate in candidates {
            if !target.is_compatible(candidate.arch_kind())
                || (candidate.name == pkg.name && candidate.evr <= pkg.evr)
                || self.transaction.is_unresolved(&candidate.key())
            {
                continue;
            }

            best = Some(match best {
                None => candidate,
                Some(current) => {
                    if self.prefer_update(target, &candidate, &current) == Ordering::Greater {
                        candidate
                    } else {
                        current
                    }
                }
            });
        }

        let Some(best) = best else {
            debug!("No update candidate for {}", pkg);
            return Ok(None);
        };

        let already_installed = self
            .installed
            .list_by_name(&best.name)?
            .any(|installed| installed.evr == best.evr);
        if already_installed {
            debug!("{} is already installed, not an update for {}", best, pkg);
            return Ok(None);
        }

        debug!("Best update for {} is {}", pkg, best);
        Ok(Some(best))
    }

    /// Ordering between two update candidates; `Greater` prefers `a`
    fn prefer_update(&self, target: Arch, a: &PackageRef, b: &PackageRef) -> Ordering {
        match (
            self.transaction.is_being_installed(&a.key()),
            self.transaction.is_being_installed(&b.key()),
        ) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }

        a.evr
            .cmp(&b.evr)
            .then_with(|| arch::choose_best(target, a.arch_kind(), b.arch_kind()))
            .then_with(|| b.name.cmp(&a.name))
    }

    /// Ordering between two providers of a requirement of `requirer`
    fn prefer_provider(&self, requirer: Arch, a: &PackageRef, b: &PackageRef) -> Ordering {
        match (
            self.transaction.is_being_installed(&a.key()),
            self.transaction.is_being_installed(&b.key()),
        ) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }

        match (
            requirer.is_compatible(a.arch_kind()),
            requirer.is_compatible(b.arch_kind()),
        ) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }

        a.evr
            .cmp(&b.evr)
            .then_with(|| arch::choose_best(requirer, a.arch_kind(), b.arch_kind()))
            .then_with(|| b.name.cmp(&a.name))
    }

    /// Best available package satisfying `dep` of `requirer`
    pub(super) fn choose_provider(
        &self,
        requirer: &PackageRef,
        dep: &Dependency,
    ) -> Result<Option<PackageRef>> {
        let mut candidates: Vec<PackageRef> = self.repos.search_provides(dep)?.collect();
        if candidates.is_empty() && dep.is_file() {
            candidates = self.repos.search_files(dep.name())?.collect();
        }

        let target = requirer.arch_kind();
        let mut best: Option<PackageRef> = None;
        for candidate in candidates {
            let key = candidate.key();
            if self.transaction.is_unresolved(&key) || self.transaction.is_being_removed(&key) {
                continue;
            }

            best = Some(match best {
                None => candidate,
                Some(current) => {
                    if self.prefer_provider(target, &candidate, &current) == Ordering::Greater {
                        candidate
                    } else {
                        current
                    }
                }
            });
        }

        Ok(best)
    }

    /// Install `pkg`, or update the installed older version of it
    ///
    /// Install-only packages are always installed side by side, and an older
    /// version already scheduled for removal is not updated.
    pub(super) fn add_install_or_update(&mut self, pkg: PackageRef) -> Result<bool> {
        if self.is_installonly(&pkg.name) {
            return self.add_installonly(pkg);
        }

        let target = pkg.arch_kind();
        let older: Vec<PackageRef> = self
            .installed
            .list_by_name(&pkg.name)?
            .filter(|old| {
                old.evr < pkg.evr
                    && old.arch_kind().is_compatible(target)
                    && !self.transaction.remove().contains(&old.key())
            })
            .collect();

        if older.is_empty() {
            return Ok(self.transaction.add_install(pkg));
        }

        let mut changed = false;
        for old in older {
            changed |= self.transaction.add_update(old, pkg.clone());
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::{MemoryRepo, PackageSpec, RepoSet, Repository};
    use crate::transaction::{Resolution, Resolver};

    fn repo(id: &str, specs: &[&str]) -> MemoryRepo {
        let specs: Vec<PackageSpec> = specs
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect();
        MemoryRepo::from_specs(id, id, &specs).unwrap()
    }

    fn single(r: MemoryRepo) -> RepoSet {
        let mut set = RepoSet::new();
        set.add(Box::new(r));
        set
    }

    fn best_update(installed: &MemoryRepo, repos: &RepoSet, name: &str) -> Option<String> {
        let resolver = Resolver::new(installed, repos);
        let pkg = installed.list_by_name(name).unwrap().next().unwrap();
        resolver
            .choose_best_for_update(&pkg)
            .unwrap()
            .map(|p| p.key())
    }

    #[test]
    fn test_newest_same_name_wins() {
        let installed = repo("installed", &[r#"{"name": "bar", "evr": "1.0-1"}"#]);
        let repos = single(repo(
            "base",
            &[
                r#"{"name": "bar", "evr": "2.0-1"}"#,
                r#"{"name": "bar", "evr": "3.0-1"}"#,
                r#"{"name": "bar", "evr": "0.9-1"}"#,
            ],
        ));

        assert_eq!(
            best_update(&installed, &repos, "bar").as_deref(),
            Some("bar-3.0-1.noarch")
        );
    }

    #[test]
    fn test_no_newer_version() {
        let installed = repo(
            "installed",
            &[r#"{"name": "bar", "evr": "2.0-1", "arch": "x86_64"}"#],
        );
        let repos = single(repo(
            "base",
            &[
                r#"{"name": "bar", "evr": "2.0-1", "arch": "x86_64"}"#,
                r#"{"name": "bar", "evr": "1:0.1-1", "arch": "ppc"}"#,
            ],
        ));

        assert_eq!(best_update(&installed, &repos, "bar"), None);
    }

    #[test]
    fn test_incompatible_arch_skipped() {
        let installed = repo(
            "installed",
            &[r#"{"name": "bar", "evr": "1.0-1", "arch": "x86_64"}"#],
        );
        let repos = single(repo(
            "base",
            &[
                r#"{"name": "bar", "evr": "3.0-1", "arch": "i686"}"#,
                r#"{"name": "bar", "evr": "2.0-1", "arch": "x86_64"}"#,
            ],
        ));

        assert_eq!(
            best_update(&installed, &repos, "bar").as_deref(),
            Some("bar-2.0-1.x86_64")
        );
    }

    #[test]
    fn test_obsoleting_package_is_a_candidate() {
        let installed = repo("installed", &[r#"{"name": "bar", "evr": "1.0-1"}"#]);
        let repos = single(repo(
            "base",
            &[r#"{"name": "bar-ng", "evr": "1.5-1", "obsoletes": ["bar < 2.0"]}"#],
        ));

        assert_eq!(
            best_update(&installed, &repos, "bar").as_deref(),
            Some("bar-ng-1.5-1.noarch")
        );
    }

    #[test]
    fn test_equal_versions_prefer_smaller_name() {
        let installed = repo("installed", &[r#"{"name": "bar", "evr": "1.0-1"}"#]);
        let repos = single(repo(
            "base",
            &[
                r#"{"name": "bar-z", "evr": "2.0-1", "obsoletes": ["bar"]}"#,
                r#"{"name": "bar-a", "evr": "2.0-1", "obsoletes": ["bar"]}"#,
            ],
        ));

        assert_eq!(
            best_update(&installed, &repos, "bar").as_deref(),
            Some("bar-a-2.0-1.noarch")
        );
    }

    #[test]
    fn test_winner_already_installed() {
        let installed = repo(
            "installed",
            &[
                r#"{"name": "bar", "evr": "1.0-1"}"#,
                r#"{"name": "bar-ng", "evr": "2.0-1"}"#,
            ],
        );
        let repos = single(repo(
            "base",
            &[r#"{"name": "bar-ng", "evr": "2.0-1", "obsoletes": ["bar"]}"#],
        ));

        assert_eq!(best_update(&installed, &repos, "bar"), None);
    }

    #[test]
    fn test_provider_prefers_compatible_arch_then_newest() {
        let installed = repo("installed", &[]);
        let repos = single(repo(
            "base",
            &[
                r#"{"name": "app", "evr": "1.0-1", "arch": "x86_64", "requires": ["libz"]}"#,
                r#"{"name": "zlib", "evr": "9.0-1", "arch": "ppc", "provides": ["libz"]}"#,
                r#"{"name": "zlib", "evr": "1.2-1", "arch": "x86_64", "provides": ["libz"]}"#,
                r#"{"name": "zlib", "evr": "1.3-1", "arch": "x86_64", "provides": ["libz"]}"#,
                r#"{"name": "zlib-compat", "evr": "1.3-1", "arch": "noarch", "provides": ["libz"]}"#,
            ],
        ));

        let resolver = Resolver::new(&installed, &repos);
        let app = repos.list_by_name("app").unwrap().next().unwrap();
        let dep = app.requires().unwrap()[0].clone();

        let provider = resolver.choose_provider(&app, &dep).unwrap().unwrap();
        assert_eq!(provider.key(), "zlib-1.3-1.x86_64");
    }

    #[test]
    fn test_install_becomes_update_of_older_version() {
        let installed = repo("installed", &[r#"{"name": "bar", "evr": "1.0-1"}"#]);
        let repos = single(repo("base", &[r#"{"name": "bar", "evr": "2.0-1"}"#]));

        let mut resolver = Resolver::new(&installed, &repos);
        let bar = repos.list_by_name("bar").unwrap().next().unwrap();
        assert!(resolver.add_install(bar.clone()).unwrap());
        assert!(!resolver.add_install(bar).unwrap());

        let trans = resolver.transaction();
        assert!(trans.install().is_empty());
        assert!(trans.update().contains("bar-2.0-1.noarch"));
        assert!(trans.updated().contains("bar-1.0-1.noarch"));
    }

    #[test]
    fn test_removed_package_is_not_updated() {
        let installed = repo("installed", &[r#"{"name": "bar", "evr": "1.0-1"}"#]);
        let repos = single(repo(
            "base",
            &[
                r#"{"name": "foo", "evr": "1.0-1", "requires": ["bar >= 2.0"]}"#,
                r#"{"name": "bar", "evr": "2.0-1"}"#,
            ],
        ));

        let mut resolver = Resolver::new(&installed, &repos);
        let old = installed.list_by_name("bar").unwrap().next().unwrap();
        let foo = repos.list_by_name("foo").unwrap().next().unwrap();
        assert!(resolver.add_remove(old).unwrap());
        assert!(resolver.add_install(foo).unwrap());
        assert_eq!(resolver.resolve().unwrap(), Resolution::Ok);

        let trans = resolver.transaction();
        assert!(trans.updated().is_empty());
        assert!(trans.update().is_empty());
        assert!(trans.remove().contains("bar-1.0-1.noarch"));
        assert!(trans.install().contains("bar-2.0-1.noarch"));
        assert!(trans.install().contains("foo-1.0-1.noarch"));
    }
}
