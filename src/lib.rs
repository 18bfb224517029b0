// src/lib.rs

//! rpmsolve: dependency resolution for RPM packages
//!
//! Given the installed package set and a set of repositories, computes which
//! packages must be installed, updated or removed to carry out a requested
//! change, and which requests cannot be satisfied.
//!
//! # Architecture
//!
//! - `version`: EVR parsing and rpmvercmp ordering
//! - `arch`: architecture compatibility and preference
//! - `packages`: packages and their dependency relations
//! - `repository`: in-memory and SQLite package sources
//! - `transaction`: the transaction collections and the resolver loop
//! - `scenario`: self-contained resolution scenarios

pub mod arch;
pub mod config;
pub mod db;
mod error;
pub mod packages;
pub mod repository;
pub mod scenario;
pub mod transaction;
pub mod version;

pub use error::{Error, Result};
