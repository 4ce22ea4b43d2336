//! The collaborators and settings of one verification run.
//!
//! Built once per run and passed by reference to every check; nothing here
//! is process-global.

use std::collections::BTreeSet;
use std::sync::Arc;

use vintf_core::{DeviceProperties, FqName, HashCatalog, ManifestDocument};
use vintf_registry::{
    BoundedLookup, DeviceSnapshot, LookupConfig, ManifestProvider, MatrixProvider,
    RegistryError, RuntimeInfoProvider, ServiceRegistry,
};

use crate::catalog::{expand, Catalog};
use crate::policy::Policy;

pub struct VerifyContext {
    pub manifests: Arc<dyn ManifestProvider>,
    pub matrices: Arc<dyn MatrixProvider>,
    pub runtime: Arc<dyn RuntimeInfoProvider>,
    pub lookup: BoundedLookup,
    pub properties: DeviceProperties,
    pub hashes: HashCatalog,
    pub updated_apexes: BTreeSet<String>,
    pub native_libraries: Vec<String>,
    pub policy: Policy,
}

impl VerifyContext {
    /// A context whose every collaborator is backed by `snapshot`.
    ///
    /// A `None` multiplier falls back to `ro.hw_timeout_multiplier`.
    pub fn from_snapshot(
        snapshot: DeviceSnapshot,
        policy: Policy,
        base: std::time::Duration,
        multiplier: Option<u32>,
    ) -> Self {
        let multiplier = multiplier.unwrap_or_else(|| snapshot.properties.timeout_multiplier());
        let registry: Arc<dyn ServiceRegistry> = Arc::new(snapshot.registry());
        let properties = snapshot.properties.clone();
        let hashes = snapshot.hashes.clone();
        let updated_apexes = snapshot.updated_apexes.iter().cloned().collect();
        let native_libraries = snapshot.native_libraries.clone();
        let shared = Arc::new(snapshot);
        VerifyContext {
            manifests: shared.clone(),
            matrices: shared.clone(),
            runtime: shared,
            lookup: BoundedLookup::new(registry, LookupConfig::new(base, multiplier)),
            properties,
            hashes,
            updated_apexes,
            native_libraries,
            policy,
        }
    }

    pub fn registry(&self) -> &dyn ServiceRegistry {
        self.lookup.registry()
    }

    pub fn is_apex_updated(&self, apex: &str) -> bool {
        self.updated_apexes.contains(apex)
    }

    /// Non-platform HALs on boards at or below the legacy API level.
    pub fn legacy_exempt(&self, fq_name: &FqName) -> bool {
        self.properties.board_api_level() <= self.policy.legacy_api_level
            && !self.policy.is_platform_interface(fq_name)
    }

    /// Both manifests, device first.
    pub async fn load_manifests(&self) -> Result<Vec<ManifestDocument>, RegistryError> {
        Ok(vec![
            self.manifests.device_manifest().await?,
            self.manifests.framework_manifest().await?,
        ])
    }

    /// Both manifests expanded, device first.
    pub async fn load_catalogs(&self) -> Result<Vec<Catalog>, RegistryError> {
        Ok(self.load_manifests().await?.iter().map(expand).collect())
    }
}
