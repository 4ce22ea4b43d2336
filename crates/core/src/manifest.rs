//! HAL manifest documents.
//!
//! The core never parses the on-device document format; it consumes the
//! structured form below (JSON via serde). Expansion into declared
//! instances lives in the analyzer's catalog.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::instance::{HalFormat, SchemaType, Transport};

/// A device or framework HAL manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDocument {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    /// Target FCM level declared by a device manifest.
    #[serde(default)]
    pub target_level: Option<u64>,
    #[serde(default)]
    pub hals: Vec<ManifestHal>,
}

/// One `<hal>` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestHal {
    #[serde(default = "default_format")]
    pub format: HalFormat,
    pub name: String,
    #[serde(default)]
    pub transport: Option<Transport>,
    /// `"major.minor"` for versioned RPC and native, a bare integer for flat RPC.
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<HalInterface>,
    /// Relative `@major.minor::Interface/instance` names.
    #[serde(default)]
    pub fqnames: Vec<String>,
    #[serde(default)]
    pub updatable_via_apex: Option<String>,
    #[serde(default, rename = "override")]
    pub is_override: bool,
}

/// Interface name plus the instances it is served under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalInterface {
    pub name: String,
    #[serde(default)]
    pub instances: Vec<String>,
}

fn default_format() -> HalFormat {
    HalFormat::VersionedRpc
}

impl ManifestDocument {
    pub fn new(schema_type: SchemaType) -> Self {
        ManifestDocument {
            schema_type,
            target_level: None,
            hals: Vec::new(),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value.clone()).map_err(|e| CoreError::Document(e.to_string()))
    }
}

impl ManifestHal {
    /// Total number of (interface, instance) and fqname entries.
    pub fn instance_count(&self) -> usize {
        self.interfaces.iter().map(|i| i.instances.len()).sum::<usize>() + self.fqnames.len()
    }

    /// A HAL with no instances that does not override a lower-layer entry.
    pub fn is_disabled(&self) -> bool {
        !self.is_override && self.instance_count() == 0
    }
}
