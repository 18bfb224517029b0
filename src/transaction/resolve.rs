// src/transaction/resolve.rs

//! Fixpoint resolution of a transaction
//!
//! Each pass checks pending installs for conflicts, then checks the
//! requirements of every member not yet looked at. Passes repeat while the
//! previous one added packages.

use super::{Problem, Transaction};
use crate::config::{DEFAULT_INSTALLONLY, DEFAULT_INSTALLONLY_LIMIT, MainSection};
use crate::error::Result;
use crate::packages::{Dependency, PackageRef};
use crate::repository::{RepoSet, Repository};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{Dispatch, debug, info};

/// Outcome of `Resolver::resolve`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Every requirement is met and nothing conflicts
    Ok,
    /// At least one package was moved to the unresolved collection
    Unresolved,
}

/// Progress notifications delivered during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// One more member was checked; carries the running count
    Step(u64),
    Done,
}

/// Result of one check, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Status {
    NoChange,
    PackagesAdded,
    Unresolvable,
}

impl Status {
    pub(super) fn merge(self, other: Status) -> Status {
        self.max(other)
    }

    pub(super) fn added(changed: bool) -> Status {
        if changed {
            Status::PackagesAdded
        } else {
            Status::NoChange
        }
    }
}

/// Why an installed package's requirements are being rechecked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemovalContext {
    Remove,
    Update,
}

/// Grows a transaction until it is consistent
pub struct Resolver<'a> {
    pub(super) installed: &'a dyn Repository,
    pub(super) repos: &'a RepoSet,
    pub(super) transaction: Transaction,
    pub(super) installonly: HashSet<String>,
    pub(super) installonly_limit: usize,
    progress: Option<Box<dyn FnMut(Progress) + 'a>>,
    dispatch: Option<Dispatch>,
    steps: u64,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over the installed set and the available repositories
    pub fn new(installed: &'a dyn Repository, repos: &'a RepoSet) -> Self {
        Self {
            installed,
            repos,
            transaction: Transaction::new(),
            installonly: DEFAULT_INSTALLONLY.iter().map(|s| s.to_string()).collect(),
            installonly_limit: DEFAULT_INSTALLONLY_LIMIT,
            progress: None,
            dispatch: None,
            steps: 0,
        }
    }

    /// Take install-only settings from the `[main]` configuration section
    pub fn with_config(self, main: &MainSection) -> Self {
        self.with_installonly(main.installonly.iter().cloned(), main.installonly_limit)
    }

    /// Replace the install-only names and limit (0 disables retention)
    pub fn with_installonly<I>(mut self, names: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.installonly = names.into_iter().collect();
        self.installonly_limit = limit;
        self
    }

    /// Receive a `Progress` notification per checked member
    pub fn with_progress(mut self, callback: impl FnMut(Progress) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Send resolver logging to `dispatch` instead of the global subscriber
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn into_transaction(self) -> Transaction {
        self.transaction
    }

    /// Request `pkg` be installed (or update an older installed version)
    pub fn add_install(&mut self, pkg: PackageRef) -> Result<bool> {
        self.in_dispatch(|this| this.add_install_or_update(pkg))
    }

    /// Request an update of installed `pkg` to the best available replacement
    ///
    /// Returns false if nothing better is available.
    pub fn add_update(&mut self, pkg: PackageRef) -> Result<bool> {
        self.in_dispatch(|this| {
            let Some(new) = this.choose_best_for_update(&pkg)? else {
                info!("No update available for {}", pkg);
                return Ok(false);
            };

            if this.is_installonly(&new.name) {
                return this.add_installonly(new);
            }

            Ok(this.transaction.add_update(pkg, new))
        })
    }

    /// Request installed `pkg` be removed
    pub fn add_remove(&mut self, pkg: PackageRef) -> Result<bool> {
        Ok(self.in_dispatch(|this| this.transaction.add_remove(pkg)))
    }

    /// Run conflict and requirement checks until nothing changes
    pub fn resolve(&mut self) -> Result<Resolution> {
        self.in_dispatch(Self::run)
    }

    fn in_dispatch<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        match self.dispatch.clone() {
            Some(dispatch) => tracing::dispatcher::with_default(&dispatch, || f(self)),
            None => f(self),
        }
    }

    fn run(&mut self) -> Result<Resolution> {
        debug!("Resolving transaction");
        let start = Instant::now();

        let mut status = Status::PackagesAdded;
        while status == Status::PackagesAdded {
            let conflicts = self.check_all_conflicts()?;
            let requires = self.check_all_requires()?;
            status = conflicts.merge(requires);
        }

        self.report(Progress::Done);
        info!(
            "Transaction resolved in {:.2}s",
            start.elapsed().as_secs_f64()
        );

        if status == Status::Unresolvable {
            info!("Unresolvable transaction");
            Ok(Resolution::Unresolved)
        } else {
            debug!("Transaction resolved successfully");
            Ok(Resolution::Ok)
        }
    }

    fn report(&mut self, progress: Progress) {
        if let Some(callback) = self.progress.as_mut() {
            callback(progress);
        }
    }

    fn step(&mut self) {
        self.steps += 1;
        let steps = self.steps;
        self.report(Progress::Step(steps));
    }

    /// An installed package satisfying `dep` that is not being removed
    pub(super) fn installed_provider(&self, dep: &Dependency) -> Result<Option<PackageRef>> {
        let survives = |pkg: &PackageRef| !self.transaction.is_being_removed(&pkg.key());

        if let Some(pkg) = self.installed.search_provides(dep)?.find(survives) {
            return Ok(Some(pkg));
        }
        if dep.is_file() {
            return Ok(self.installed.search_files(dep.name())?.find(survives));
        }
        Ok(None)
    }

    /// Whether `dep` of `pkg` is met without looking at repositories
    fn is_satisfied_locally(&self, pkg: &PackageRef, dep: &Dependency) -> Result<bool> {
        Ok(dep.is_rpmlib()
            || pkg.provides_dependency(dep)?
            || self.installed_provider(dep)?.is_some()
            || self.transaction.find_provider(dep)?.is_some())
    }

    fn check_all_conflicts(&mut self) -> Result<Status> {
        let mut status = Status::NoChange;
        let candidates: Vec<PackageRef> = self.transaction.install.packages().cloned().collect();

        for pkg in candidates {
            if !self.transaction.install.contains(&pkg.key()) {
                continue;
            }

            if let Some(with) = self.find_conflict(&pkg)? {
                info!("{} conflicts with {}", pkg, with);
                self.transaction
                    .mark_unresolved(pkg, Problem::Conflict { with });
                status = Status::Unresolvable;
            }
        }

        Ok(status)
    }

    /// Key of the first package conflicting with install candidate `pkg`
    fn find_conflict(&self, pkg: &PackageRef) -> Result<Option<String>> {
        let key = pkg.key();
        let is_other_installed =
            |other: &PackageRef| other.key() != key && !self.transaction.is_being_removed(&other.key());
        let others: Vec<&PackageRef> = self
            .transaction
            .installing()
            .filter(|other| other.key() != key)
            .collect();

        debug!("Checking for packages that conflict with {}", pkg);
        for provide in pkg.all_provides()? {
            if let Some(other) = self.installed.search_conflicts(&provide)?.find(is_other_installed) {
                return Ok(Some(other.key()));
            }
            for other in &others {
                if other.conflicts()?.iter().any(|c| c.satisfies(&provide)) {
                    return Ok(Some(other.key()));
                }
            }
        }

        debug!("Checking for packages {} conflicts with", pkg);
        for conflict in pkg.conflicts()? {
            if let Some(other) = self.installed.search_provides(conflict)?.find(is_other_installed) {
                return Ok(Some(other.key()));
            }
            for other in &others {
                if other.has_provide(conflict)? {
                    return Ok(Some(other.key()));
                }
            }
        }

        Ok(None)
    }

    fn check_all_requires(&mut self) -> Result<Status> {
        let mut status = Status::NoChange;

        for pkg in self.transaction.install.pending() {
            status = status.merge(self.check_package_requires(&pkg)?);
            self.transaction.install.set_resolved(&pkg.key());
            self.step();
        }

        for pkg in self.transaction.update.pending() {
            status = status.merge(self.check_package_requires(&pkg)?);
            self.transaction.update.set_resolved(&pkg.key());
            self.step();
        }

        for pkg in self.transaction.remove.pending() {
            status = status.merge(self.check_removal(&pkg, RemovalContext::Remove)?);
            self.transaction.remove.set_resolved(&pkg.key());
            self.step();
        }

        for pkg in self.transaction.updated.pending() {
            status = status.merge(self.check_removal(&pkg, RemovalContext::Update)?);
            self.transaction.updated.set_resolved(&pkg.key());
            self.step();
        }

        Ok(status)
    }

    fn check_package_requires(&mut self, pkg: &PackageRef) -> Result<Status> {
        // Dropped by an earlier check in this pass
        if !self.transaction.is_being_installed(&pkg.key()) {
            return Ok(Status::NoChange);
        }

        debug!("Checking requires for {}", pkg);
        let mut status = Status::NoChange;

        for dep in pkg.requires()? {
            if self.is_satisfied_locally(pkg, dep)? {
                debug!("{} already provided", dep);
                continue;
            }

            match self.choose_provider(pkg, dep)? {
                Some(provider) => {
                    debug!("{} provided by {}", dep, provider);
                    let changed = self.add_install_or_update(provider)?;
                    status = status.merge(Status::added(changed));
                }
                None => {
                    info!("{} requires {}, which nothing provides", pkg, dep);
                    self.transaction
                        .mark_unresolved(pkg.clone(), Problem::MissingRequirement(dep.clone()));
                    return Ok(Status::Unresolvable);
                }
            }
        }

        Ok(status)
    }

    /// Recheck installed packages that depended on something `pkg` provided
    fn check_removal(&mut self, pkg: &PackageRef, context: RemovalContext) -> Result<Status> {
        debug!("Checking removal of {}", pkg);
        let mut status = Status::NoChange;

        let mut lost = pkg.all_provides()?;
        lost.extend(pkg.files()?.iter().map(|f| Dependency::unversioned(f.as_str())));

        for provide in &lost {
            let dependents: Vec<PackageRef> = self.installed.search_requires(provide)?.collect();

            for dependent in dependents {
                let key = dependent.key();
                if key == pkg.key()
                    || self.transaction.is_being_removed(&key)
                    || self.transaction.is_unresolved(&key)
                {
                    continue;
                }

                if !self.lost_requirement(&dependent, provide)? {
                    continue;
                }

                status = status.merge(match context {
                    RemovalContext::Remove => {
                        debug!("Adding {} for removal, it needs {}", dependent, provide);
                        Status::added(self.transaction.add_remove(dependent))
                    }
                    RemovalContext::Update => self.update_dependent(dependent, pkg)?,
                });
            }
        }

        Ok(status)
    }

    /// Whether one of `dependent`'s requirements on `provide` is now unmet
    fn lost_requirement(&self, dependent: &PackageRef, provide: &Dependency) -> Result<bool> {
        for dep in dependent.requires()? {
            if dep.satisfies(provide) && !self.is_satisfied_locally(dependent, dep)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn update_dependent(&mut self, dependent: PackageRef, updated: &PackageRef) -> Result<Status> {
        match self.choose_best_for_update(&dependent)? {
            Some(new) => {
                debug!("Updating {} to {} along with {}", dependent, new, updated);
                Ok(Status::added(self.transaction.add_update(dependent, new)))
            }
            None => {
                info!("{} needs an update to follow {}, none found", dependent, updated);
                self.transaction.mark_unresolved(
                    dependent,
                    Problem::NoUpdate {
                        required_by: updated.key(),
                    },
                );
                Ok(Status::Unresolvable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryRepo, PackageSpec};
    use crate::transaction::MemberSet;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn repo(id: &str, specs: &[&str]) -> MemoryRepo {
        let specs: Vec<PackageSpec> = specs
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect();
        MemoryRepo::from_specs(id, id, &specs).unwrap()
    }

    fn repo_set(repos: Vec<MemoryRepo>) -> RepoSet {
        let mut set = RepoSet::new();
        for r in repos {
            set.add(Box::new(r));
        }
        set
    }

    fn first(repo: &dyn Repository, name: &str) -> PackageRef {
        repo.list_by_name(name).unwrap().next().unwrap()
    }

    fn keys<R>(set: &MemberSet<R>) -> Vec<&str> {
        set.keys().collect()
    }

    #[test]
    fn test_status_merge() {
        assert_eq!(
            Status::NoChange.merge(Status::PackagesAdded),
            Status::PackagesAdded
        );
        assert_eq!(
            Status::Unresolvable.merge(Status::PackagesAdded),
            Status::Unresolvable
        );
        assert_eq!(Status::NoChange.merge(Status::NoChange), Status::NoChange);
    }

    #[test]
    fn test_empty_transaction_resolves() {
        let installed = repo("installed", &[]);
        let repos = RepoSet::new();
        let mut resolver = Resolver::new(&installed, &repos);

        assert_eq!(resolver.resolve().unwrap(), Resolution::Ok);
        assert!(resolver.transaction().is_empty());
    }

    #[test]
    fn test_requirement_pulled_from_repository() {
        let installed = repo("installed", &[]);
        let repos = repo_set(vec![repo(
            "base",
            &[
                r#"{"name": "foo", "evr": "1.0-1", "requires": ["libbar.so.1", "rpmlib(PayloadIsXz) <= 5.2-1"]}"#,
                r#"{"name": "bar", "evr": "1.0-1", "provides": ["libbar.so.1"]}"#,
            ],
        )]);

        let mut resolver = Resolver::new(&installed, &repos);
        let foo = repos.list_by_name("foo").unwrap().next().unwrap();
        assert!(resolver.add_install(foo).unwrap());

        assert_eq!(resolver.resolve().unwrap(), Resolution::Ok);
        assert_eq!(
            keys(resolver.transaction().install()),
            vec!["bar-1.0-1.noarch", "foo-1.0-1.noarch"]
        );
        assert!(resolver.transaction().install().iter().all(|m| m.resolved));
    }

    #[test]
    fn test_self_provided_requirement() {
        let installed = repo("installed", &[]);
        let repos = repo_set(vec![repo(
            "base",
            &[r#"{"name": "foo", "evr": "1.0-1", "requires": ["foo-libs", "/usr/bin/foo"],
                  "provides": ["foo-libs"], "files": ["/usr/bin/foo"]}"#],
        )]);

        let mut resolver = Resolver::new(&installed, &repos);
        resolver.add_install(first(repos.iter().next().unwrap(), "foo")).unwrap();

        assert_eq!(resolver.resolve().unwrap(), Resolution::Ok);
        assert_eq!(resolver.transaction().install().len(), 1);
    }

    #[test]
    fn test_installed_file_provider() {
        let installed = repo(
            "installed",
            &[r#"{"name": "bash", "evr": "5.2-1", "files": ["/bin/sh"]}"#],
        );
        let repos = repo_set(vec![repo(
            "base",
            &[r#"{"name": "foo", "evr": "1.0-1", "requires": ["/bin/sh"]}"#],
        )]);

        let mut resolver = Resolver::new(&installed, &repos);
        resolver.add_install(first(repos.iter().next().unwrap(), "foo")).unwrap();

        assert_eq!(resolver.resolve().unwrap(), Resolution::Ok);
        assert_eq!(keys(resolver.transaction().install()), vec!["foo-1.0-1.noarch"]);
    }

    #[test]
    fn test_missing_requirement() {
        let installed = repo("installed", &[]);
        let repos = repo_set(vec![repo(
            "base",
            &[r#"{"name": "foo", "evr": "1.0-1", "requires": ["missing >= 2"]}"#],
        )]);

        let mut resolver = Resolver::new(&installed, &repos);
        resolver.add_install(first(repos.iter().next().unwrap(), "foo")).unwrap();

        assert_eq!(resolver.resolve().unwrap(), Resolution::Unresolved);
        let trans = resolver.transaction();
        assert!(trans.install().is_empty());
        assert_eq!(
            trans.unresolved().get("foo-1.0-1.noarch").unwrap().related,
            Problem::MissingRequirement(Dependency::parse("missing >= 2").unwrap())
        );
    }

    #[test]
    fn test_conflict_with_installed() {
        let installed = repo(
            "installed",
            &[r#"{"name": "baz", "evr": "1.0-1", "conflicts": ["foo"]}"#],
        );
        let repos = repo_set(vec![repo("base", &[r#"{"name": "foo", "evr": "1.0-1"}"#])]);

        let mut resolver = Resolver::new(&installed, &repos);
        resolver.add_install(first(repos.iter().next().unwrap(), "foo")).unwrap();

        assert_eq!(resolver.resolve().unwrap(), Resolution::Unresolved);
        let trans = resolver.transaction();
        assert!(trans.install().is_empty());
        assert_eq!(
            trans.unresolved().get("foo-1.0-1.noarch").unwrap().related,
            Problem::Conflict {
                with: "baz-1.0-1.noarch".to_string()
            }
        );
    }

    #[test]
    fn test_conflict_with_package_being_removed_is_ignored() {
        let installed = repo(
            "installed",
            &[r#"{"name": "baz", "evr": "1.0-1", "provides": ["mta"]}"#],
        );
        let repos = repo_set(vec![repo(
            "base",
            &[r#"{"name": "foo", "evr": "1.0-1", "conflicts": ["mta"]}"#],
        )]);

        let mut resolver = Resolver::new(&installed, &repos);
        resolver.add_remove(first(&installed, "baz")).unwrap();
        resolver.add_install(first(repos.iter().next().unwrap(), "foo")).unwrap();

        assert_eq!(resolver.resolve().unwrap(), Resolution::Ok);
        assert_eq!(resolver.transaction().install().len(), 1);
        assert_eq!(resolver.transaction().remove().len(), 1);
    }

    #[test]
    fn test_conflict_between_candidates() {
        let installed = repo("installed", &[]);
        let repos = repo_set(vec![repo(
            "base",
            &[
                r#"{"name": "a", "evr": "1.0-1", "conflicts": ["b"]}"#,
                r#"{"name": "b", "evr": "1.0-1"}"#,
            ],
        )]);

        let base = repos.iter().next().unwrap();
        let mut resolver = Resolver::new(&installed, &repos);
        resolver.add_install(first(base, "a")).unwrap();
        resolver.add_install(first(base, "b")).unwrap();

        assert_eq!(resolver.resolve().unwrap(), Resolution::Unresolved);
        let trans = resolver.transaction();
        assert!(trans.is_unresolved("a-1.0-1.noarch"));
        assert_eq!(keys(trans.install()), vec!["b-1.0-1.noarch"]);
    }

    #[test]
    fn test_cascading_removal() {
        let installed = repo(
            "installed",
            &[
                r#"{"name": "a", "evr": "1.0-1", "provides": ["liba"]}"#,
                r#"{"name": "b", "evr": "1.0-1", "requires": ["liba"], "provides": ["libb"]}"#,
                r#"{"name": "c", "evr": "1.0-1", "requires": ["libb"]}"#,
                r#"{"name": "d", "evr": "1.0-1"}"#,
            ],
        );
        let repos = RepoSet::new();

        let mut resolver = Resolver::new(&installed, &repos);
        resolver.add_remove(first(&installed, "a")).unwrap();

        assert_eq!(resolver.resolve().unwrap(), Resolution::Ok);
        assert_eq!(
            keys(resolver.transaction().remove()),
            vec!["a-1.0-1.noarch", "b-1.0-1.noarch", "c-1.0-1.noarch"]
        );
    }

    #[test]
    fn test_removal_keeps_dependents_with_other_providers() {
        let installed = repo(
            "installed",
            &[
                r#"{"name": "postfix", "evr": "3.0-1", "provides": ["MTA"]}"#,
                r#"{"name": "sendmail", "evr": "8.0-1", "provides": ["MTA"]}"#,
                r#"{"name": "mailx", "evr": "1.0-1", "requires": ["MTA"]}"#,
            ],
        );
        let repos = RepoSet::new();

        let mut resolver = Resolver::new(&installed, &repos);
        resolver.add_remove(first(&installed, "postfix")).unwrap();

        assert_eq!(resolver.resolve().unwrap(), Resolution::Ok);
        assert_eq!(keys(resolver.transaction().remove()), vec!["postfix-3.0-1.noarch"]);
    }

    #[test]
    fn test_update_drags_dependent_along() {
        let installed = repo(
            "installed",
            &[
                r#"{"name": "lib", "evr": "1.0-1"}"#,
                r#"{"name": "app", "evr": "1.0-1", "requires": ["lib = 1.0"]}"#,
            ],
        );
        let repos = repo_set(vec![repo(
            "updates",
            &[
                r#"{"name": "lib", "evr": "2.0-1"}"#,
                r#"{"name": "app", "evr": "2.0-1", "requires": ["lib = 2.0"]}"#,
            ],
        )]);

        let mut resolver = Resolver::new(&installed, &repos);
        assert!(resolver.add_update(first(&installed, "lib")).unwrap());

        assert_eq!(resolver.resolve().unwrap(), Resolution::Ok);
        let trans = resolver.transaction();
        assert_eq!(
            keys(trans.update()),
            vec!["app-2.0-1.noarch", "lib-2.0-1.noarch"]
        );
        assert_eq!(
            keys(trans.updated()),
            vec!["app-1.0-1.noarch", "lib-1.0-1.noarch"]
        );
    }

    #[test]
    fn test_update_without_dependent_update_is_unresolved() {
        let installed = repo(
            "installed",
            &[
                r#"{"name": "lib", "evr": "1.0-1"}"#,
                r#"{"name": "app", "evr": "1.0-1", "requires": ["lib = 1.0"]}"#,
            ],
        );
        let repos = repo_set(vec![repo("updates", &[r#"{"name": "lib", "evr": "2.0-1"}"#])]);

        let mut resolver = Resolver::new(&installed, &repos);
        resolver.add_update(first(&installed, "lib")).unwrap();

        assert_eq!(resolver.resolve().unwrap(), Resolution::Unresolved);
        assert_eq!(
            resolver.transaction().unresolved().get("app-1.0-1.noarch").unwrap().related,
            Problem::NoUpdate {
                required_by: "lib-1.0-1.noarch".to_string()
            }
        );
    }

    #[test]
    fn test_progress_reports_each_member_and_done() {
        let installed = repo("installed", &[]);
        let repos = repo_set(vec![repo(
            "base",
            &[
                r#"{"name": "foo", "evr": "1.0-1", "requires": ["bar"]}"#,
                r#"{"name": "bar", "evr": "1.0-1"}"#,
            ],
        )]);

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let mut resolver =
            Resolver::new(&installed, &repos).with_progress(move |p| sink.borrow_mut().push(p));
        resolver.add_install(first(repos.iter().next().unwrap(), "foo")).unwrap();
        resolver.resolve().unwrap();

        assert_eq!(
            *events.borrow(),
            vec![Progress::Step(1), Progress::Step(2), Progress::Done]
        );
    }

    #[test]
    fn test_resolve_under_injected_dispatch() {
        let installed = repo("installed", &[]);
        let repos = RepoSet::new();
        let dispatch = Dispatch::new(tracing_subscriber::fmt().with_test_writer().finish());

        let mut resolver = Resolver::new(&installed, &repos).with_dispatch(dispatch);
        assert_eq!(resolver.resolve().unwrap(), Resolution::Ok);
    }
}
