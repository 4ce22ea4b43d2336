use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use vintf_core::{ManifestDocument, MatrixDocument, Partition, RuntimeFacts, Transport};

use crate::error::RegistryError;

// ──────────────────────────────────────────────
// Documents
// ──────────────────────────────────────────────

/// Supplies the device and framework HAL manifests.
///
/// Either call fails with [`RegistryError::Unavailable`] when the document
/// cannot be loaded.
#[async_trait]
pub trait ManifestProvider: Send + Sync {
    async fn device_manifest(&self) -> Result<ManifestDocument, RegistryError>;

    async fn framework_manifest(&self) -> Result<ManifestDocument, RegistryError>;
}

#[async_trait]
pub trait MatrixProvider: Send + Sync {
    async fn device_matrix(&self) -> Result<MatrixDocument, RegistryError>;

    async fn framework_matrix(&self) -> Result<MatrixDocument, RegistryError>;
}

#[async_trait]
pub trait RuntimeInfoProvider: Send + Sync {
    async fn runtime_facts(&self) -> Result<RuntimeFacts, RegistryError>;
}

// ──────────────────────────────────────────────
// Live registry
// ──────────────────────────────────────────────

/// A live handle to a served (or loaded) HAL.
///
/// Every query may block on the serving process; callers bound them with
/// [`crate::BoundedLookup`].
#[async_trait]
pub trait HalHandle: Send + Sync + fmt::Debug {
    /// True if the handle reaches another process rather than a loaded library.
    fn is_remote(&self) -> bool;

    /// Partition of the serving process, if the handle itself knows it.
    fn partition_hint(&self) -> Option<Partition> {
        None
    }

    /// Most-derived interface first, base interface last.
    async fn interface_chain(&self) -> Result<Vec<String>, RegistryError>;

    /// Aligned 1:1 with [`HalHandle::interface_chain`]. Flat-RPC handles
    /// report their single interface hash as the only entry.
    async fn hash_chain(&self) -> Result<Vec<String>, RegistryError>;

    /// The version reported by a flat-RPC service, if it reports one.
    async fn reported_version(&self) -> Result<Option<u64>, RegistryError>;
}

/// The service registry of the device under test.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Every registered versioned-RPC instance name, `package@M.m::Interface/instance`.
    ///
    /// A failure here is fatal to the calling check.
    async fn list_all(&self) -> Result<Vec<String>, RegistryError>;

    /// Fetch a handle for `fq_name/instance` over `transport`.
    ///
    /// `fq_name` is either `package@M.m::Interface` or, for flat RPC,
    /// `package.Interface`. `Ok(None)` means definitively not served.
    async fn get_handle(
        &self,
        fq_name: &str,
        instance: &str,
        transport: Transport,
    ) -> Result<Option<Arc<dyn HalHandle>>, RegistryError>;

    /// The partition owning the process behind `handle`.
    async fn owning_partition(&self, handle: &dyn HalHandle) -> Partition {
        handle.partition_hint().unwrap_or(Partition::Unknown)
    }
}
