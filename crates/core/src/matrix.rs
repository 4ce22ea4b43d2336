//! Compatibility matrix documents.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::instance::{HalFormat, SchemaType, FLAT_RPC_MAJOR};
use crate::manifest::HalInterface;
use crate::version::Version;

/// A device or framework compatibility matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixDocument {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    #[serde(default)]
    pub level: Option<u64>,
    #[serde(default)]
    pub hals: Vec<MatrixHal>,
    #[serde(default)]
    pub kernel: Vec<KernelRequirement>,
    #[serde(default)]
    pub sepolicy: Option<SepolicyRequirement>,
    #[serde(default)]
    pub avb: Option<AvbRequirement>,
    #[serde(default)]
    pub vendor_ndk_version: Option<String>,
}

/// One required (or optional) HAL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixHal {
    #[serde(default = "default_format")]
    pub format: HalFormat,
    pub name: String,
    #[serde(default)]
    pub optional: bool,
    /// `"major.min"` or `"major.min-max"`; flat RPC uses `"min"` or `"min-max"`.
    #[serde(default)]
    pub versions: Vec<String>,
    /// Empty means every interface of the package.
    #[serde(default)]
    pub interfaces: Vec<HalInterface>,
    /// Versions (`"major.minor"`) that must be superseded wherever present.
    #[serde(default)]
    pub deprecated: Vec<String>,
}

fn default_format() -> HalFormat {
    HalFormat::VersionedRpc
}

/// Kernel line requirement, e.g. version `4.19.0` with its config table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelRequirement {
    pub version: String,
    #[serde(default)]
    pub configs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SepolicyRequirement {
    pub kernel_sepolicy_version: u64,
    #[serde(default)]
    pub sepolicy_versions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvbRequirement {
    pub vbmeta_version: String,
}

/// A supported version range: one major, minors from `min_minor` to `max_minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRange {
    pub major: u64,
    pub min_minor: u64,
    pub max_minor: u64,
}

impl VersionRange {
    pub fn min_version(&self) -> Version {
        Version::new(self.major, self.min_minor)
    }

    /// Same major and at least the minimum minor; `max_minor` does not bound support.
    pub fn supported_by(&self, version: &Version) -> bool {
        version.minor_at_least(&self.min_version())
    }

    /// Parse the flat-RPC form, `"2"` or `"1-3"`.
    pub fn parse_flat(s: &str) -> Result<VersionRange, CoreError> {
        let (min, max) = match s.split_once('-') {
            Some((min, max)) => (parse_u64(s, min)?, parse_u64(s, max)?),
            None => {
                let v = parse_u64(s, s)?;
                (v, v)
            }
        };
        build(s, FLAT_RPC_MAJOR, min, max)
    }
}

impl FromStr for VersionRange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, max) = match s.split_once('-') {
            Some((base, max)) => (base, Some(max)),
            None => (s, None),
        };
        let min: Version = base.parse()?;
        let max_minor = match max {
            Some(max) => parse_u64(s, max)?,
            None => min.minor,
        };
        build(s, min.major, min.minor, max_minor)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min_minor == self.max_minor {
            write!(f, "{}.{}", self.major, self.min_minor)
        } else {
            write!(f, "{}.{}-{}", self.major, self.min_minor, self.max_minor)
        }
    }
}

fn build(s: &str, major: u64, min_minor: u64, max_minor: u64) -> Result<VersionRange, CoreError> {
    if max_minor < min_minor {
        return Err(CoreError::InvalidName {
            name: s.to_string(),
            reason: "range maximum is below its minimum".to_string(),
        });
    }
    Ok(VersionRange {
        major,
        min_minor,
        max_minor,
    })
}

fn parse_u64(whole: &str, part: &str) -> Result<u64, CoreError> {
    part.trim().parse::<u64>().map_err(|_| CoreError::InvalidName {
        name: whole.to_string(),
        reason: format!("'{}' is not a non-negative integer", part),
    })
}

impl MatrixHal {
    pub fn version_ranges(&self) -> Result<Vec<VersionRange>, CoreError> {
        self.versions
            .iter()
            .map(|v| match self.format {
                HalFormat::FlatRpc => VersionRange::parse_flat(v),
                HalFormat::VersionedRpc | HalFormat::NativeLib => v.parse(),
            })
            .collect()
    }

    pub fn deprecated_versions(&self) -> Result<Vec<Version>, CoreError> {
        self.deprecated.iter().map(|v| v.parse()).collect()
    }
}

impl MatrixDocument {
    pub fn new(schema_type: SchemaType) -> Self {
        MatrixDocument {
            schema_type,
            level: None,
            hals: Vec::new(),
            kernel: Vec::new(),
            sepolicy: None,
            avb: None,
            vendor_ndk_version: None,
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value.clone()).map_err(|e| CoreError::Document(e.to_string()))
    }
}
