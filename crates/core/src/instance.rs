//! Declared HAL instances and the enums that classify them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fqname::{flat_instance_name, sanitize_case_name, FqInstance, FqName};
use crate::version::VersionedName;

/// How a HAL is reached by its clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Transport {
    /// Served by another process over the binder-like RPC transport.
    #[serde(rename = "hwbinder", alias = "remote")]
    Remote,
    /// Loaded into the client process from a library.
    #[serde(rename = "passthrough", alias = "inprocess")]
    InProcess,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Remote => write!(f, "hwbinder"),
            Transport::InProcess => write!(f, "passthrough"),
        }
    }
}

/// Wire format of a declared HAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HalFormat {
    /// `package@major.minor::Interface`, one entry per minor revision.
    #[serde(rename = "hidl")]
    VersionedRpc,
    /// `package.Interface`, a single integer version.
    #[serde(rename = "aidl")]
    FlatRpc,
    /// A shared library loaded by name.
    #[serde(rename = "native")]
    NativeLib,
}

impl fmt::Display for HalFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalFormat::VersionedRpc => write!(f, "hidl"),
            HalFormat::FlatRpc => write!(f, "aidl"),
            HalFormat::NativeLib => write!(f, "native"),
        }
    }
}

/// Which side of the system/vendor boundary a document or process belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    System,
    Vendor,
    #[default]
    Unknown,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::System => write!(f, "system"),
            Partition::Vendor => write!(f, "vendor"),
            Partition::Unknown => write!(f, "unknown"),
        }
    }
}

/// Origin of a manifest or matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Device,
    Framework,
}

impl SchemaType {
    /// Device documents describe vendor HALs, framework documents system HALs.
    pub fn expected_partition(&self) -> Partition {
        match self {
            SchemaType::Device => Partition::Vendor,
            SchemaType::Framework => Partition::System,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::Device => write!(f, "device"),
            SchemaType::Framework => write!(f, "framework"),
        }
    }
}

/// Flat-RPC versions are carried in `minor` under this fixed major.
pub const FLAT_RPC_MAJOR: u64 = 1;

/// Version assumed for flat-RPC HALs that declare or report none.
pub const DEFAULT_FLAT_RPC_VERSION: u64 = 1;

/// One declared (version, interface, instance) surface from a manifest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclaredInstance {
    pub name: VersionedName,
    pub interface: String,
    pub instance: String,
    pub transport: Transport,
    pub format: HalFormat,
    pub updatable_unit: Option<String>,
}

impl DeclaredInstance {
    pub fn package(&self) -> &str {
        &self.name.package
    }

    pub fn fq_name(&self) -> FqName {
        FqName::new(self.name.clone(), self.interface.clone())
    }

    pub fn fq_instance(&self) -> FqInstance {
        self.fq_name().instance(self.instance.clone())
    }

    /// The single integer version of a flat-RPC declaration.
    pub fn flat_version(&self) -> u64 {
        self.name.minor()
    }

    /// The name this instance is registered under in the live registry.
    pub fn registry_name(&self) -> String {
        match self.format {
            HalFormat::VersionedRpc => self.fq_instance().to_string(),
            HalFormat::FlatRpc => flat_instance_name(self.package(), &self.interface, &self.instance),
            HalFormat::NativeLib => format!("{}.{}", self.package(), self.instance),
        }
    }

    pub fn case_name(&self) -> String {
        match self.format {
            HalFormat::VersionedRpc => sanitize_case_name(&self.registry_name()),
            HalFormat::FlatRpc | HalFormat::NativeLib => sanitize_case_name(&format!(
                "{}_V{}",
                flat_instance_name(self.package(), &self.interface, &self.instance),
                self.name.version
            )),
        }
    }
}

impl fmt::Display for DeclaredInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format {
            HalFormat::VersionedRpc => write!(f, "{} HAL {}", self.transport, self.fq_instance()),
            HalFormat::FlatRpc => {
                write!(f, "{}, Version {}", self.registry_name(), self.flat_version())?;
                if let Some(unit) = &self.updatable_unit {
                    write!(f, ", updatable_via_apex = {}", unit)?;
                }
                Ok(())
            }
            HalFormat::NativeLib => write!(
                f,
                "Native HAL {{ package: {} version: {} interface: {} instance: {} }}",
                self.package(),
                self.name.version,
                self.interface,
                self.instance
            ),
        }
    }
}
