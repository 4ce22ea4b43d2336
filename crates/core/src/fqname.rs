//! Fully-qualified interface and instance names.
//!
//! Grammar:
//!
//! - `package@major.minor::Interface` ([`FqName`])
//! - `package@major.minor::Interface/instance` ([`FqInstance`])
//! - `@major.minor::Interface/instance`, relative to a manifest HAL entry
//! - `package.Interface/instance`, the flat-RPC form (see [`flat_instance_name`])

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::version::{Version, VersionedName};

/// Interface every versioned-RPC service inherits from.
pub const IBASE_DESCRIPTOR: &str = "android.hidl.base@1.0::IBase";

/// A versioned interface, e.g. `android.hardware.foo@1.2::IFoo`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FqName {
    pub name: VersionedName,
    pub interface: String,
}

impl FqName {
    pub fn new(name: VersionedName, interface: impl Into<String>) -> Self {
        FqName {
            name,
            interface: interface.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.name.package
    }

    pub fn version(&self) -> Version {
        self.name.version
    }

    /// Same package and interface at another minor version.
    pub fn with_minor(&self, minor: u64) -> FqName {
        FqName::new(self.name.with_minor(minor), self.interface.clone())
    }

    pub fn down_rev(&self) -> Result<FqName, CoreError> {
        Ok(FqName::new(self.name.down_rev()?, self.interface.clone()))
    }

    pub fn is_base_interface(&self) -> bool {
        self.to_string() == IBASE_DESCRIPTOR
    }

    /// True iff the package is `prefix` or nested under it.
    pub fn in_package(&self, prefix: &str) -> bool {
        let package = self.package();
        package == prefix
            || (package.starts_with(prefix) && package[prefix.len()..].starts_with('.'))
    }

    pub fn instance(&self, instance: impl Into<String>) -> FqInstance {
        FqInstance {
            fq_name: self.clone(),
            instance: instance.into(),
        }
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.name, self.interface)
    }
}

impl FromStr for FqName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (versioned, interface) = s
            .split_once("::")
            .ok_or_else(|| CoreError::invalid_name(s, "missing '::<Interface>'"))?;
        validate_identifier(s, interface)?;
        let name: VersionedName = versioned
            .parse()
            .map_err(|_| CoreError::invalid_name(s, "expected <package>@<major>.<minor>"))?;
        Ok(FqName::new(name, interface))
    }
}

/// A versioned interface served under an instance name,
/// e.g. `android.hardware.foo@1.2::IFoo/default`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FqInstance {
    pub fq_name: FqName,
    pub instance: String,
}

impl FqInstance {
    pub fn new(name: VersionedName, interface: impl Into<String>, instance: impl Into<String>) -> Self {
        FqInstance {
            fq_name: FqName::new(name, interface),
            instance: instance.into(),
        }
    }

    pub fn package(&self) -> &str {
        self.fq_name.package()
    }

    pub fn version(&self) -> Version {
        self.fq_name.version()
    }

    pub fn interface(&self) -> &str {
        &self.fq_name.interface
    }

    pub fn with_minor(&self, minor: u64) -> FqInstance {
        self.fq_name.with_minor(minor).instance(self.instance.clone())
    }

    /// Parse `@major.minor::Interface/instance` relative to `package`.
    pub fn parse_relative(package: &str, relative: &str) -> Result<FqInstance, CoreError> {
        if !relative.starts_with('@') {
            return Err(CoreError::invalid_name(
                relative,
                "relative names must start with '@'",
            ));
        }
        format!("{}{}", package, relative).parse()
    }
}

impl fmt::Display for FqInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.fq_name, self.instance)
    }
}

impl FromStr for FqInstance {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (fq_name, instance) = s
            .rsplit_once('/')
            .ok_or_else(|| CoreError::invalid_name(s, "missing '/<instance>'"))?;
        validate_instance(s, instance)?;
        Ok(FqInstance {
            fq_name: fq_name.parse()?,
            instance: instance.to_string(),
        })
    }
}

/// Flat-RPC service name: `package.Interface/instance`.
pub fn flat_instance_name(package: &str, interface: &str, instance: &str) -> String {
    format!("{}.{}/{}", package, interface, instance)
}

/// Replace every non-alphanumeric character so a name can label a test case.
pub fn sanitize_case_name(original: &str) -> String {
    original
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub(crate) fn validate_package(whole: &str, package: &str) -> Result<(), CoreError> {
    if package.is_empty() {
        return Err(CoreError::invalid_name(whole, "empty package"));
    }
    for component in package.split('.') {
        validate_identifier(whole, component)?;
    }
    Ok(())
}

fn validate_identifier(whole: &str, ident: &str) -> Result<(), CoreError> {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => {
            return Err(CoreError::invalid_name(
                whole,
                format!("'{}' is not a valid identifier", ident),
            ))
        }
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(CoreError::invalid_name(
            whole,
            format!("'{}' is not a valid identifier", ident),
        ))
    }
}

fn validate_instance(whole: &str, instance: &str) -> Result<(), CoreError> {
    if instance.is_empty() || instance.chars().any(char::is_whitespace) {
        return Err(CoreError::invalid_name(whole, "invalid instance name"));
    }
    Ok(())
}
