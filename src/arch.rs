// src/arch.rs

//! Architecture compatibility and preference rules
//!
//! Only the architectures a typical x86 system cares about are modelled.
//! Everything else maps to `Arch::Unknown`, which is compatible only with
//! itself and `noarch`.

use std::cmp::Ordering;
use std::fmt;

/// Architecture tag of a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Noarch,
    X86_64,
    I386,
    I586,
    I686,
    Unknown,
}

impl Arch {
    pub fn as_str(&self) -> &str {
        match self {
            Arch::Noarch => "noarch",
            Arch::X86_64 => "x86_64",
            Arch::I386 => "i386",
            Arch::I586 => "i586",
            Arch::I686 => "i686",
            Arch::Unknown => "unknown",
        }
    }

    /// Whether this is one of the 32-bit x86 variants
    pub fn is_ix86(&self) -> bool {
        matches!(self, Arch::I386 | Arch::I586 | Arch::I686)
    }

    /// Position among the i-variants; higher is newer
    fn ix86_rank(&self) -> u8 {
        match self {
            Arch::I386 => 3,
            Arch::I586 => 5,
            Arch::I686 => 6,
            _ => 0,
        }
    }

    /// Whether a package of `other` architecture can go on a `self` system
    pub fn is_compatible(&self, other: Arch) -> bool {
        if self.is_ix86() && other.is_ix86() {
            return true;
        }

        *self == other || *self == Arch::Noarch || other == Arch::Noarch
    }
}

impl From<&str> for Arch {
    fn from(s: &str) -> Self {
        match s {
            "noarch" => Arch::Noarch,
            "x86_64" => Arch::X86_64,
            "i386" => Arch::I386,
            "i586" => Arch::I586,
            "i686" => Arch::I686,
            _ => Arch::Unknown,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the better of two architectures for a `target` system
///
/// `Greater` prefers `arch1`, `Less` prefers `arch2`, `Equal` means the two
/// are the same architecture.
pub fn choose_best(target: Arch, arch1: Arch, arch2: Arch) -> Ordering {
    if arch1 == arch2 {
        return Ordering::Equal;
    }

    if target.is_ix86() {
        return choose_best_for_x86(arch1, arch2);
    }

    if target == arch1 {
        return Ordering::Greater;
    }
    if target == arch2 {
        return Ordering::Less;
    }

    if arch1 == Arch::Noarch {
        return Ordering::Greater;
    }
    if arch2 == Arch::Noarch {
        return Ordering::Less;
    }

    choose_best_for_system(arch1, arch2)
}

fn choose_best_for_x86(arch1: Arch, arch2: Arch) -> Ordering {
    match (arch1.is_ix86(), arch2.is_ix86()) {
        (true, true) => {
            if arch1.ix86_rank() >= arch2.ix86_rank() {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => choose_best_for_system(arch1, arch2),
    }
}

/// System-wide architecture preference, used as the last tie-break
///
/// x86_64 beats an i-variant only when it is the second argument; in every
/// other unmatched case the first argument wins. There is no rule for
/// `Unknown`.
pub fn choose_best_for_system(arch1: Arch, arch2: Arch) -> Ordering {
    if arch1 == arch2 {
        return Ordering::Equal;
    }

    if arch2 == Arch::X86_64 && arch1.is_ix86() {
        return Ordering::Less;
    }

    if arch1.is_ix86() && arch2.is_ix86() {
        return if arch1.ix86_rank() > arch2.ix86_rank() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    Ordering::Greater
}
