// src/transaction/installonly.rs

//! Retention of install-only packages
//!
//! Packages such as kernels are installed next to older versions instead of
//! replacing them. Installing one more version removes the oldest ones so
//! that at most `installonly_limit` remain.

use super::resolve::Resolver;
use crate::error::Result;
use crate::packages::PackageRef;
use tracing::{debug, info};

impl Resolver<'_> {
    pub(super) fn is_installonly(&self, name: &str) -> bool {
        self.installonly.contains(name)
    }

    /// Install `pkg` side by side, then enforce the retention limit
    pub(super) fn add_installonly(&mut self, pkg: PackageRef) -> Result<bool> {
        let name = pkg.name.clone();
        if !self.transaction.add_install(pkg) {
            return Ok(false);
        }

        self.enforce_limit(&name)?;
        Ok(true)
    }

    /// Schedule the oldest installed `name` packages for removal until the
    /// survivors plus the pending installs of `name` fit within the limit
    fn enforce_limit(&mut self, name: &str) -> Result<()> {
        if self.installonly_limit == 0 {
            return Ok(());
        }

        let mut survivors: Vec<PackageRef> = self
            .installed
            .list_by_name(name)?
            .filter(|pkg| !self.transaction.is_being_removed(&pkg.key()))
            .collect();
        survivors.sort_by(|a, b| a.evr.cmp(&b.evr));

        let pending = self
            .transaction
            .install()
            .packages()
            .filter(|pkg| pkg.name == name)
            .count();

        debug!(
            "{} installed and {} pending versions of {}, limit {}",
            survivors.len(),
            pending,
            name,
            self.installonly_limit
        );

        let excess = (survivors.len() + pending).saturating_sub(self.installonly_limit);
        for oldest in survivors.into_iter().take(excess) {
            info!("Removing {} to stay within the install-only limit", oldest);
            self.transaction.add_remove(oldest);
        }

        Ok(())
    }
}
