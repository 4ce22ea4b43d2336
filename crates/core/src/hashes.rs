//! Catalog of released interface hashes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::fqname::FqName;

/// Hash reported for an interface that was never frozen.
pub const NOT_FROZEN_HASH: &str = "notfrozen";

/// True for the empty hash: an empty string or all hex zeros.
pub fn is_empty_hash(hash: &str) -> bool {
    hash.bytes().all(|b| b == b'0')
}

/// Metadata for one flat-RPC interface module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlatModuleMetadata {
    pub name: String,
    /// Fully-qualified type names, e.g. `android.hardware.power.IPower`.
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub versions: Vec<u64>,
    #[serde(default)]
    pub hashes: Vec<String>,
}

impl FlatModuleMetadata {
    pub fn has_version(&self, version: u64) -> bool {
        self.versions.contains(&version)
    }

    pub fn has_hash(&self, hash: &str) -> bool {
        self.hashes.iter().any(|h| h == hash)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HashCatalog {
    /// `package@major.minor::Interface` to its released hashes.
    #[serde(default)]
    pub versioned: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub flat: Vec<FlatModuleMetadata>,
}

impl HashCatalog {
    pub fn released_hashes(&self, fq_name: &FqName) -> Option<&BTreeSet<String>> {
        self.versioned.get(&fq_name.to_string())
    }

    pub fn is_released(&self, fq_name: &FqName, hash: &str) -> bool {
        self.released_hashes(fq_name)
            .is_some_and(|hashes| hashes.contains(hash))
    }

    /// The module declaring `type_name`, if any.
    pub fn flat_metadata(&self, type_name: &str) -> Option<&FlatModuleMetadata> {
        self.flat
            .iter()
            .find(|module| module.types.iter().any(|t| t == type_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_hash_detection() {
        assert!(is_empty_hash(""));
        assert!(is_empty_hash(&"0".repeat(64)));
        assert!(!is_empty_hash("00ab"));
    }

    #[test]
    fn lookups() {
        let catalog: HashCatalog = serde_json::from_value(json!({
            "versioned": {"android.hardware.foo@1.0::IFoo": ["aa", "bb"]},
            "flat": [{
                "name": "android.hardware.power",
                "types": ["android.hardware.power.IPower"],
                "versions": [1, 2],
                "hashes": ["h1", "h2"]
            }]
        }))
        .unwrap();

        let fq: FqName = "android.hardware.foo@1.0::IFoo".parse().unwrap();
        assert!(catalog.is_released(&fq, "bb"));
        assert!(!catalog.is_released(&fq, "cc"));
        assert!(!catalog.is_released(&fq.with_minor(1), "aa"));

        let power = catalog.flat_metadata("android.hardware.power.IPower").unwrap();
        assert!(power.has_version(2));
        assert!(!power.has_version(3));
        assert!(power.has_hash("h1"));
        assert!(catalog.flat_metadata("android.hardware.power.IOther").is_none());
    }
}
