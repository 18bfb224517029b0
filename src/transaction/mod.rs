// src/transaction/mod.rs

//! Transaction state and resolution
//!
//! A `Transaction` holds five keyed collections: packages to install, new
//! packages that update installed ones, the installed packages they replace,
//! packages to remove, and packages that could not be resolved. The
//! `Resolver` grows these collections until every requirement is met or a
//! problem is found.

mod installonly;
mod resolve;
mod update;

pub use resolve::{Progress, Resolution, Resolver};

use crate::packages::{Dependency, PackageRef};
use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// The installed package a new package replaces
#[derive(Debug, Clone)]
pub struct Replaces(pub PackageRef);

/// The new package an installed package is replaced by
#[derive(Debug, Clone)]
pub struct ReplacedBy(pub PackageRef);

/// Why a package ended up unresolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// No installed, pending or available package provides the requirement
    MissingRequirement(Dependency),
    /// Conflicts with another installed or pending package
    Conflict { with: String },
    /// Needs an update because of `required_by`, and none exists
    NoUpdate { required_by: String },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::MissingRequirement(dep) => write!(f, "nothing provides {}", dep),
            Problem::Conflict { with } => write!(f, "conflicts with {}", with),
            Problem::NoUpdate { required_by } => {
                write!(f, "no update available, required by change to {}", required_by)
            }
        }
    }
}

/// A package in one of the transaction collections
#[derive(Debug, Clone)]
pub struct Member<R> {
    pub package: PackageRef,
    /// Set once the resolver has checked this member
    pub resolved: bool,
    pub related: R,
}

/// Members keyed by package key
#[derive(Debug)]
pub struct MemberSet<R> {
    members: BTreeMap<String, Member<R>>,
}

impl<R> Default for MemberSet<R> {
    fn default() -> Self {
        Self {
            members: BTreeMap::new(),
        }
    }
}

impl<R> MemberSet<R> {
    pub fn contains(&self, key: &str) -> bool {
        self.members.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Member<R>> {
        self.members.get(key)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member<R>> {
        self.members.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn packages(&self) -> impl Iterator<Item = &PackageRef> {
        self.members.values().map(|m| &m.package)
    }

    /// Insert unless the key is taken; returns whether it was inserted
    fn insert(&mut self, package: PackageRef, related: R) -> bool {
        let key = package.key();
        if self.members.contains_key(&key) {
            return false;
        }

        self.members.insert(
            key,
            Member {
                package,
                resolved: false,
                related,
            },
        );
        true
    }

    fn remove(&mut self, key: &str) -> Option<Member<R>> {
        self.members.remove(key)
    }

    fn retain(&mut self, keep: impl FnMut(&String, &mut Member<R>) -> bool) {
        self.members.retain(keep);
    }

    /// Members not yet checked by the resolver
    fn pending(&self) -> Vec<PackageRef> {
        self.members
            .values()
            .filter(|m| !m.resolved)
            .map(|m| m.package.clone())
            .collect()
    }

    fn set_resolved(&mut self, key: &str) {
        if let Some(member) = self.members.get_mut(key) {
            member.resolved = true;
        }
    }
}

/// The working set of pending changes
#[derive(Debug, Default)]
pub struct Transaction {
    install: MemberSet<()>,
    update: MemberSet<Replaces>,
    updated: MemberSet<ReplacedBy>,
    remove: MemberSet<()>,
    unresolved: MemberSet<Problem>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self) -> &MemberSet<()> {
        &self.install
    }

    pub fn update(&self) -> &MemberSet<Replaces> {
        &self.update
    }

    pub fn updated(&self) -> &MemberSet<ReplacedBy> {
        &self.updated
    }

    pub fn remove(&self) -> &MemberSet<()> {
        &self.remove
    }

    pub fn unresolved(&self) -> &MemberSet<Problem> {
        &self.unresolved
    }

    /// Schedule `pkg` for install
    ///
    /// Returns false if it is already pending install or update, or if it
    /// was found unresolvable.
    pub fn add_install(&mut self, pkg: PackageRef) -> bool {
        let key = pkg.key();
        if self.unresolved.contains(&key) || self.update.contains(&key) {
            debug!("Not adding {} for install", key);
            return false;
        }

        if self.install.insert(pkg, ()) {
            debug!("Adding for install: {}", key);
            true
        } else {
            debug!("Not adding already added pkg for install: {}", key);
            false
        }
    }

    /// Schedule installed `old` to be replaced by `new`
    ///
    /// The `old -> new` pairing is recorded even when `new` is already
    /// pending as the update of another package. A `new` pending install is
    /// moved to `update`, so every `updated` member has its counterpart
    /// there. Refused when `old` is being removed. Returns whether either
    /// collection changed.
    pub fn add_update(&mut self, old: PackageRef, new: PackageRef) -> bool {
        let new_key = new.key();
        if self.unresolved.contains(&new_key) {
            debug!("Not adding unresolved {} for update", new_key);
            return false;
        }

        let old_key = old.key();
        if self.remove.contains(&old_key) {
            debug!("Not updating {}, it is being removed", old_key);
            return false;
        }

        let mut changed = self.updated.insert(old.clone(), ReplacedBy(new.clone()));

        if changed && self.install.remove(&new_key).is_some() {
            debug!("Moving {} from install to update", new_key);
        }
        if !self.install.contains(&new_key) && self.update.insert(new, Replaces(old)) {
            changed = true;
        }

        if changed {
            debug!("Adding for update: {} -> {}", old_key, new_key);
        } else {
            debug!("Not adding already added pkg for update: {}", new_key);
        }
        changed
    }

    /// Schedule installed `pkg` for removal
    pub fn add_remove(&mut self, pkg: PackageRef) -> bool {
        let key = pkg.key();
        if self.unresolved.contains(&key) || self.updated.contains(&key) {
            debug!("Not adding {} for remove", key);
            return false;
        }

        if self.remove.insert(pkg, ()) {
            debug!("Adding for remove: {}", key);
            true
        } else {
            debug!("Not adding already added pkg for remove: {}", key);
            false
        }
    }

    /// Move `pkg` to the unresolved collection
    ///
    /// Drops it from install and update, and drops any `updated` pairing
    /// that pointed at it.
    pub fn mark_unresolved(&mut self, pkg: PackageRef, problem: Problem) {
        let key = pkg.key();
        debug!("Adding to unresolved: {} ({})", key, problem);

        self.install.remove(&key);
        self.update.remove(&key);
        self.updated.retain(|_, member| member.related.0.key() != key);
        self.unresolved.insert(pkg, problem);
    }

    pub fn is_unresolved(&self, key: &str) -> bool {
        self.unresolved.contains(key)
    }

    /// Pending removal, either directly or as the old half of an update
    pub fn is_being_removed(&self, key: &str) -> bool {
        self.remove.contains(key) || self.updated.contains(key)
    }

    /// Pending install, either directly or as the new half of an update
    pub fn is_being_installed(&self, key: &str) -> bool {
        self.install.contains(key) || self.update.contains(key)
    }

    /// Packages pending install or update
    pub fn installing(&self) -> impl Iterator<Item = &PackageRef> {
        self.install.packages().chain(self.update.packages())
    }

    /// A package pending install or update that satisfies `dep`
    pub fn find_provider(&self, dep: &Dependency) -> Result<Option<PackageRef>> {
        for pkg in self.installing() {
            if pkg.provides_dependency(dep)? {
                return Ok(Some(pkg.clone()));
            }
        }
        Ok(None)
    }

    /// No changes pending
    pub fn is_empty(&self) -> bool {
        self.install.is_empty()
            && self.update.is_empty()
            && self.updated.is_empty()
            && self.remove.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::{Package, PackageDetails};
    use crate::version::Evr;
    use std::rc::Rc;

    fn pkg(name: &str, evr: &str) -> PackageRef {
        Rc::new(Package::new(name, "x86_64", Evr::parse(evr)))
    }

    #[test]
    fn test_add_install_twice() {
        let mut trans = Transaction::new();
        let foo = pkg("foo", "1.0-1");

        assert!(trans.add_install(foo.clone()));
        assert!(!trans.add_install(foo));
        assert_eq!(trans.install().len(), 1);
        assert!(trans.is_being_installed("foo-1.0-1.x86_64"));
    }

    #[test]
    fn test_add_remove_twice() {
        let mut trans = Transaction::new();
        let foo = pkg("foo", "1.0-1");

        assert!(trans.add_remove(foo.clone()));
        assert!(!trans.add_remove(foo));
        assert_eq!(trans.remove().len(), 1);
        assert!(trans.is_being_removed("foo-1.0-1.x86_64"));
    }

    #[test]
    fn test_add_update_records_every_old_package() {
        let mut trans = Transaction::new();
        let new = pkg("bar", "2.0-1");
        let old = pkg("bar", "1.0-1");
        let obsoleted = pkg("bar-compat", "1.0-1");

        assert!(trans.add_update(old.clone(), new.clone()));
        assert!(!trans.add_update(old.clone(), new.clone()));

        // Same new package, second old package: only `updated` changes
        assert!(trans.add_update(obsoleted.clone(), new.clone()));
        assert_eq!(trans.update().len(), 1);
        assert_eq!(trans.updated().len(), 2);

        let member = trans.update().get("bar-2.0-1.x86_64").unwrap();
        assert_eq!(member.related.0.key(), old.key());
        let member = trans.updated().get("bar-compat-1.0-1.x86_64").unwrap();
        assert_eq!(member.related.0.key(), new.key());

        assert!(trans.is_being_removed("bar-1.0-1.x86_64"));
        assert!(trans.is_being_installed("bar-2.0-1.x86_64"));
    }

    #[test]
    fn test_install_and_update_are_exclusive() {
        let mut trans = Transaction::new();
        let new = pkg("bar", "2.0-1");

        assert!(trans.add_update(pkg("bar", "1.0-1"), new.clone()));
        assert!(!trans.add_install(new));
        assert!(trans.install().is_empty());
    }

    #[test]
    fn test_update_of_removed_package_is_refused() {
        let mut trans = Transaction::new();
        let old = pkg("bar", "1.0-1");

        assert!(trans.add_remove(old.clone()));
        assert!(!trans.add_update(old, pkg("bar", "2.0-1")));

        assert!(trans.updated().is_empty());
        assert!(trans.update().is_empty());
        assert_eq!(trans.remove().len(), 1);
    }

    #[test]
    fn test_update_takes_over_pending_install() {
        let mut trans = Transaction::new();
        let new = pkg("bar", "2.0-1");

        assert!(trans.add_install(new.clone()));
        assert!(trans.add_update(pkg("bar", "1.0-1"), new));

        assert!(trans.install().is_empty());
        let member = trans.update().get("bar-2.0-1.x86_64").unwrap();
        assert_eq!(member.related.0.key(), "bar-1.0-1.x86_64");
        assert_eq!(
            trans.updated().get("bar-1.0-1.x86_64").unwrap().related.0.key(),
            "bar-2.0-1.x86_64"
        );
    }

    #[test]
    fn test_unresolved_keys_are_never_re_added() {
        let mut trans = Transaction::new();
        let foo = pkg("foo", "1.0-1");

        trans.add_install(foo.clone());
        trans.mark_unresolved(foo.clone(), Problem::Conflict { with: "bar".to_string() });

        assert!(trans.install().is_empty());
        assert!(trans.is_unresolved("foo-1.0-1.x86_64"));
        assert!(!trans.add_install(foo.clone()));
        assert!(!trans.add_remove(foo.clone()));
        assert!(!trans.add_update(pkg("foo", "0.9-1"), foo));
        assert!(trans.updated().is_empty());
    }

    #[test]
    fn test_mark_unresolved_drops_pairings() {
        let mut trans = Transaction::new();
        let new = pkg("bar", "2.0-1");
        let old = pkg("bar", "1.0-1");

        trans.add_update(old, new.clone());
        trans.mark_unresolved(
            new,
            Problem::MissingRequirement(Dependency::unversioned("libfoo")),
        );

        assert!(trans.update().is_empty());
        assert!(trans.updated().is_empty());
        assert!(!trans.is_being_removed("bar-1.0-1.x86_64"));
        assert_eq!(
            trans.unresolved().get("bar-2.0-1.x86_64").unwrap().related,
            Problem::MissingRequirement(Dependency::unversioned("libfoo"))
        );
    }

    #[test]
    fn test_find_provider() {
        let mut trans = Transaction::new();
        let libs = Rc::new(
            Package::new("libs", "x86_64", Evr::parse("1.0-1")).with_details(PackageDetails {
                provides: vec![Dependency::parse("libfoo.so.1").unwrap()],
                files: vec!["/usr/lib64/libfoo.so.1".to_string()],
                ..Default::default()
            }),
        );
        trans.add_install(libs);

        let found = trans
            .find_provider(&Dependency::unversioned("libfoo.so.1"))
            .unwrap();
        assert_eq!(found.unwrap().name, "libs");
        assert!(
            trans
                .find_provider(&Dependency::unversioned("/usr/lib64/libfoo.so.1"))
                .unwrap()
                .is_some()
        );
        assert!(
            trans
                .find_provider(&Dependency::unversioned("libbar.so.1"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_pending_and_resolved() {
        let mut set: MemberSet<()> = MemberSet::default();
        set.insert(pkg("foo", "1.0-1"), ());
        set.insert(pkg("bar", "1.0-1"), ());

        assert_eq!(set.pending().len(), 2);
        set.set_resolved("foo-1.0-1.x86_64");
        let pending = set.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name, "bar");
    }
}
