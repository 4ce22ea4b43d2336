//! Versions and versioned package names.
//!
//! A [`Version`] is a `major.minor` pair; a [`VersionedName`] ties it to a
//! package. Both order lexicographically (package, then major, then minor)
//! and are used as map keys throughout the analyzer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Largest minor version accepted from text. Every minor below a declared one
/// is an obligation, so the bound also caps per-declaration expansion.
pub const MAX_MINOR_VERSION: u64 = 1000;

/// A `major.minor` interface version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64) -> Self {
        Version { major, minor }
    }

    /// True iff both versions share a major version and `self.minor >= other.minor`.
    pub fn minor_at_least(&self, other: &Version) -> bool {
        self.major == other.major && self.minor >= other.minor
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| CoreError::invalid_name(s, "version must be <major>.<minor>"))?;
        let major = parse_component(s, major)?;
        let minor = parse_component(s, minor)?;
        if minor > MAX_MINOR_VERSION {
            return Err(CoreError::invalid_name(
                s,
                format!("minor version exceeds {}", MAX_MINOR_VERSION),
            ));
        }
        Ok(Version { major, minor })
    }
}

fn parse_component(whole: &str, part: &str) -> Result<u64, CoreError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::invalid_name(
            whole,
            format!("'{}' is not a non-negative integer", part),
        ));
    }
    part.parse::<u64>()
        .map_err(|e| CoreError::invalid_name(whole, e.to_string()))
}

/// A package at a specific version, e.g. `android.hardware.foo@1.2`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionedName {
    pub package: String,
    pub version: Version,
}

impl VersionedName {
    pub fn new(package: impl Into<String>, major: u64, minor: u64) -> Self {
        VersionedName {
            package: package.into(),
            version: Version::new(major, minor),
        }
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }

    pub fn minor(&self) -> u64 {
        self.version.minor
    }

    /// The same package one minor version lower.
    ///
    /// Fails with [`CoreError::Precision`] at minor 0.
    pub fn down_rev(&self) -> Result<VersionedName, CoreError> {
        if self.version.minor == 0 {
            return Err(CoreError::Precision {
                name: self.to_string(),
            });
        }
        Ok(self.with_minor(self.version.minor - 1))
    }

    pub fn with_minor(&self, minor: u64) -> VersionedName {
        VersionedName::new(self.package.clone(), self.version.major, minor)
    }

    /// Same package and major, and at least `other`'s minor version.
    ///
    /// Differing packages or majors are simply unrelated: this returns false.
    pub fn minor_at_least(&self, other: &VersionedName) -> bool {
        self.package == other.package && self.version.minor_at_least(&other.version)
    }

    /// Every version from `major.0` up to and including this one.
    pub fn lower_minors_inclusive(&self) -> Vec<VersionedName> {
        (0..=self.version.minor)
            .rev()
            .map(|minor| self.with_minor(minor))
            .collect()
    }
}

impl fmt::Display for VersionedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package, self.version)
    }
}

impl FromStr for VersionedName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (package, version) = s
            .split_once('@')
            .ok_or_else(|| CoreError::invalid_name(s, "missing '@'"))?;
        crate::fqname::validate_package(s, package)?;
        Ok(VersionedName {
            package: package.to_string(),
            version: version.parse()?,
        })
    }
}
