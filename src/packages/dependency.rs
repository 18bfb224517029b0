// src/packages/dependency.rs

//! Dependencies and capability satisfaction
//!
//! The same `Dependency` type describes both sides of a match: what a
//! package requires (or conflicts with, or obsoletes) and what a package
//! provides.

use crate::error::{Error, Result};
use crate::version::Evr;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Prefix of the capabilities rpm itself provides at install time
const RPMLIB_PREFIX: &str = "rpmlib(";

/// Comparison attached to a versioned dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DependencySense {
    #[default]
    None,
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl DependencySense {
    pub fn as_str(&self) -> &str {
        match self {
            DependencySense::None => "",
            DependencySense::Eq => "=",
            DependencySense::Lt => "<",
            DependencySense::Le => "<=",
            DependencySense::Gt => ">",
            DependencySense::Ge => ">=",
        }
    }

    /// Parse the flag spelling used by yum metadata (`EQ`, `LT`, ...)
    pub fn from_flags(flags: Option<&str>) -> Result<Self> {
        match flags {
            None | Some("") => Ok(DependencySense::None),
            Some("EQ") => Ok(DependencySense::Eq),
            Some("LT") => Ok(DependencySense::Lt),
            Some("LE") => Ok(DependencySense::Le),
            Some("GT") => Ok(DependencySense::Gt),
            Some("GE") => Ok(DependencySense::Ge),
            Some(other) => Err(Error::ParseError(format!(
                "Unknown dependency flags: {}",
                other
            ))),
        }
    }

    pub fn as_flags(&self) -> Option<&str> {
        match self {
            DependencySense::None => None,
            DependencySense::Eq => Some("EQ"),
            DependencySense::Lt => Some("LT"),
            DependencySense::Le => Some("LE"),
            DependencySense::Gt => Some("GT"),
            DependencySense::Ge => Some("GE"),
        }
    }

    fn includes_equal(&self) -> bool {
        matches!(
            self,
            DependencySense::Eq | DependencySense::Le | DependencySense::Ge
        )
    }

    fn includes_less(&self) -> bool {
        matches!(self, DependencySense::Lt | DependencySense::Le)
    }

    fn includes_greater(&self) -> bool {
        matches!(self, DependencySense::Gt | DependencySense::Ge)
    }
}

impl FromStr for DependencySense {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(DependencySense::None),
            "=" | "==" => Ok(DependencySense::Eq),
            "<" => Ok(DependencySense::Lt),
            "<=" | "=<" => Ok(DependencySense::Le),
            ">" => Ok(DependencySense::Gt),
            ">=" | "=>" => Ok(DependencySense::Ge),
            other => Err(Error::InvalidDependency(format!(
                "Unknown comparison operator: {}",
                other
            ))),
        }
    }
}

/// A named capability with an optional version constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    name: String,
    sense: DependencySense,
    evr: Option<String>,
}

impl Dependency {
    /// Create a dependency
    ///
    /// A version must be given exactly when the sense is not `None`.
    pub fn new(
        name: impl Into<String>,
        sense: DependencySense,
        evr: Option<String>,
    ) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(Error::InvalidDependency(
                "Dependency name is empty".to_string(),
            ));
        }

        match (sense, &evr) {
            (DependencySense::None, Some(evr)) => Err(Error::InvalidDependency(format!(
                "{}: version {} given without a comparison",
                name, evr
            ))),
            (DependencySense::None, None) => Ok(Self {
                name,
                sense,
                evr: None,
            }),
            (_, None) => Err(Error::InvalidDependency(format!(
                "{}: comparison {} given without a version",
                name,
                sense.as_str()
            ))),
            (_, Some(v)) if v.is_empty() => Err(Error::InvalidDependency(format!(
                "{}: comparison {} given with an empty version",
                name,
                sense.as_str()
            ))),
            (_, Some(_)) => Ok(Self { name, sense, evr }),
        }
    }

    /// Create an unversioned dependency
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sense: DependencySense::None,
            evr: None,
        }
    }

    /// The `name = evr` capability every package provides for itself
    pub(crate) fn exact(name: &str, evr: &Evr) -> Self {
        Self {
            name: name.to_string(),
            sense: DependencySense::Eq,
            evr: Some(evr.to_string()),
        }
    }

    /// Parse a textual dependency such as `foo`, `foo >= 1.0` or `foo=1:2-3`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        let Some(op_start) = s.find(['<', '>', '=']) else {
            return Self::new(s, DependencySense::None, None);
        };

        let name = s[..op_start].trim();
        let rest = &s[op_start..];
        let op_end = rest
            .find(|c| !matches!(c, '<' | '>' | '='))
            .unwrap_or(rest.len());

        let sense: DependencySense = rest[..op_end].parse()?;
        let evr = rest[op_end..].trim();

        if evr.is_empty() {
            return Err(Error::InvalidDependency(format!(
                "Missing version in dependency '{}'",
                s
            )));
        }

        Self::new(name, sense, Some(evr.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sense(&self) -> DependencySense {
        self.sense
    }

    pub fn evr(&self) -> Option<&str> {
        self.evr.as_deref()
    }

    /// File dependencies name an absolute path
    pub fn is_file(&self) -> bool {
        self.name.starts_with('/')
    }

    /// Capabilities provided by rpm itself, never by a package
    pub fn is_rpmlib(&self) -> bool {
        self.name.starts_with(RPMLIB_PREFIX)
    }

    /// Check whether the capability `have` satisfies this requirement
    ///
    /// Names must match. If either side is unversioned the match succeeds;
    /// otherwise the two version ranges must overlap.
    pub fn satisfies(&self, have: &Dependency) -> bool {
        if self.name != have.name {
            return false;
        }

        let (Some(need_evr), Some(have_evr)) = (self.evr(), have.evr()) else {
            return true;
        };

        match Evr::parse(need_evr).range_cmp(&Evr::parse(have_evr)) {
            Ordering::Less => self.sense.includes_greater() || have.sense.includes_less(),
            Ordering::Greater => self.sense.includes_less() || have.sense.includes_greater(),
            Ordering::Equal => {
                (self.sense.includes_equal() && have.sense.includes_equal())
                    || (self.sense.includes_less() && have.sense.includes_less())
                    || (self.sense.includes_greater() && have.sense.includes_greater())
            }
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.evr {
            Some(evr) => write!(f, "{} {} {}", self.name, self.sense.as_str(), evr),
            None => write!(f, "{}", self.name),
        }
    }
}
