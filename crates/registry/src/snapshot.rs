//! JSON device snapshot.
//!
//! A snapshot captures everything a verification run reads from a device:
//! both manifests and matrices, runtime facts, properties, the hash catalog,
//! updated APEX names, installed native libraries and the live registry.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vintf_core::{
    DeviceProperties, HalFormat, HashCatalog, ManifestDocument, MatrixDocument, Partition,
    RuntimeFacts, Transport,
};

use crate::error::RegistryError;
use crate::memory::{InMemoryRegistry, StaticHandle};
use crate::traits::{ManifestProvider, MatrixProvider, RuntimeInfoProvider};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    #[serde(default)]
    pub device_manifest: Option<ManifestDocument>,
    #[serde(default)]
    pub framework_manifest: Option<ManifestDocument>,
    #[serde(default)]
    pub device_matrix: Option<MatrixDocument>,
    #[serde(default)]
    pub framework_matrix: Option<MatrixDocument>,
    #[serde(default)]
    pub runtime: Option<RuntimeFacts>,
    #[serde(default)]
    pub properties: DeviceProperties,
    #[serde(default)]
    pub hashes: HashCatalog,
    #[serde(default)]
    pub updated_apexes: Vec<String>,
    /// File names of installed native HAL libraries, e.g. `mapper.minigbm.so`.
    #[serde(default)]
    pub native_libraries: Vec<String>,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

/// One live registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    #[serde(default = "default_transport")]
    pub transport: Transport,
    #[serde(default = "default_format")]
    pub format: HalFormat,
    #[serde(default)]
    pub remote: Option<bool>,
    #[serde(default)]
    pub partition: Partition,
    #[serde(default)]
    pub interface_chain: Vec<String>,
    #[serde(default)]
    pub hash_chain: Vec<String>,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

fn default_transport() -> Transport {
    Transport::Remote
}

fn default_format() -> HalFormat {
    HalFormat::VersionedRpc
}

impl From<&ServiceEntry> for StaticHandle {
    fn from(entry: &ServiceEntry) -> Self {
        StaticHandle {
            name: entry.name.clone(),
            transport: entry.transport,
            format: entry.format,
            remote: entry
                .remote
                .unwrap_or(entry.transport == Transport::Remote),
            partition: entry.partition,
            interface_chain: entry.interface_chain.clone(),
            hash_chain: entry.hash_chain.clone(),
            version: entry.version,
            delay: entry.delay_ms.map(Duration::from_millis),
        }
    }
}

impl DeviceSnapshot {
    pub fn from_json_str(source: &str) -> Result<Self, RegistryError> {
        serde_json::from_str(source)
            .map_err(|e| RegistryError::Backend(format!("invalid device snapshot: {}", e)))
    }

    /// The live registry described by `services`.
    pub fn registry(&self) -> InMemoryRegistry {
        let mut registry = InMemoryRegistry::new();
        for entry in &self.services {
            registry.register(StaticHandle::from(entry));
        }
        registry
    }

    pub fn is_apex_updated(&self, apex: &str) -> bool {
        self.updated_apexes.iter().any(|a| a == apex)
    }
}

fn require<T: Clone>(doc: &Option<T>, what: &str) -> Result<T, RegistryError> {
    doc.clone()
        .ok_or_else(|| RegistryError::Unavailable(format!("{} is missing from the snapshot", what)))
}

#[async_trait]
impl ManifestProvider for DeviceSnapshot {
    async fn device_manifest(&self) -> Result<ManifestDocument, RegistryError> {
        require(&self.device_manifest, "device manifest")
    }

    async fn framework_manifest(&self) -> Result<ManifestDocument, RegistryError> {
        require(&self.framework_manifest, "framework manifest")
    }
}

#[async_trait]
impl MatrixProvider for DeviceSnapshot {
    async fn device_matrix(&self) -> Result<MatrixDocument, RegistryError> {
        require(&self.device_matrix, "device compatibility matrix")
    }

    async fn framework_matrix(&self) -> Result<MatrixDocument, RegistryError> {
        require(&self.framework_matrix, "framework compatibility matrix")
    }
}

#[async_trait]
impl RuntimeInfoProvider for DeviceSnapshot {
    async fn runtime_facts(&self) -> Result<RuntimeFacts, RegistryError> {
        require(&self.runtime, "runtime info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ServiceRegistry;

    const SNAPSHOT: &str = r#"{
        "device_manifest": {"type": "device", "hals": []},
        "properties": {"ro.build.version.codename": "REL"},
        "updated_apexes": ["com.android.hardware.power"],
        "services": [
            {"name": "android.hardware.foo@1.0::IFoo/default", "partition": "vendor",
             "interface_chain": ["android.hardware.foo@1.0::IFoo", "android.hidl.base@1.0::IBase"]},
            {"name": "android.hardware.foo@1.0::IFoo/default", "transport": "passthrough"},
            {"name": "android.hardware.power.IPower/default", "format": "aidl", "version": 2}
        ]
    }"#;

    #[tokio::test]
    async fn loads_snapshot_and_builds_registry() {
        let snapshot = DeviceSnapshot::from_json_str(SNAPSHOT).unwrap();
        assert!(snapshot.properties.is_release());
        assert!(snapshot.is_apex_updated("com.android.hardware.power"));

        let registry = snapshot.registry();
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.list_all().await.unwrap(),
            vec!["android.hardware.foo@1.0::IFoo/default"]
        );
        let loaded = registry
            .get_handle("android.hardware.foo@1.0::IFoo", "default", Transport::InProcess)
            .await
            .unwrap()
            .unwrap();
        assert!(!loaded.is_remote());
        let power = registry
            .get_handle("android.hardware.power.IPower", "default", Transport::Remote)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(power.reported_version().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn missing_documents_are_unavailable() {
        let snapshot = DeviceSnapshot::from_json_str(SNAPSHOT).unwrap();
        assert!(snapshot.device_manifest().await.is_ok());
        assert!(matches!(
            snapshot.framework_manifest().await,
            Err(RegistryError::Unavailable(_))
        ));
        assert!(matches!(
            snapshot.runtime_facts().await,
            Err(RegistryError::Unavailable(_))
        ));
    }

    #[test]
    fn rejects_malformed_snapshot() {
        assert!(matches!(
            DeviceSnapshot::from_json_str("{\"services\": 3}"),
            Err(RegistryError::Backend(_))
        ));
    }
}
