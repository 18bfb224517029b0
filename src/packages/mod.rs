// src/packages/mod.rs

//! Package model for the resolver
//!
//! A `Package` carries its identity (name, EVR, architecture) up front and
//! loads its dependency and file lists on demand.

pub mod dependency;
pub mod package;
pub mod traits;

pub use dependency::{Dependency, DependencySense};
pub use package::{Package, PackageRef};
pub use traits::{DetailsLoader, PackageDetails};
