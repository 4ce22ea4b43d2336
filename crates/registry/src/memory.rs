//! In-memory service registry.
//!
//! Backs the device snapshot and the test suites. Handles can be given an
//! artificial delay to exercise lookup deadlines.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vintf_core::{HalFormat, Partition, Transport};

use crate::error::RegistryError;
use crate::traits::{HalHandle, ServiceRegistry};

// ──────────────────────────────────────────────
// StaticHandle
// ──────────────────────────────────────────────

/// A handle whose answers are fixed at construction.
#[derive(Debug, Clone)]
pub struct StaticHandle {
    pub name: String,
    pub transport: Transport,
    pub format: HalFormat,
    pub remote: bool,
    pub partition: Partition,
    pub interface_chain: Vec<String>,
    pub hash_chain: Vec<String>,
    pub version: Option<u64>,
    /// Applied to handle resolution and to every query.
    pub delay: Option<Duration>,
}

impl StaticHandle {
    /// A remote versioned-RPC service registered as `name`
    /// (`package@M.m::Interface/instance`).
    pub fn remote(name: impl Into<String>) -> Self {
        StaticHandle {
            name: name.into(),
            transport: Transport::Remote,
            format: HalFormat::VersionedRpc,
            remote: true,
            partition: Partition::Unknown,
            interface_chain: Vec::new(),
            hash_chain: Vec::new(),
            version: None,
            delay: None,
        }
    }

    /// An in-process module loadable as `name`.
    pub fn in_process(name: impl Into<String>) -> Self {
        StaticHandle {
            transport: Transport::InProcess,
            remote: false,
            ..StaticHandle::remote(name)
        }
    }

    /// A flat-RPC service registered as `package.Interface/instance`.
    pub fn flat(name: impl Into<String>) -> Self {
        StaticHandle {
            format: HalFormat::FlatRpc,
            ..StaticHandle::remote(name)
        }
    }

    pub fn with_chain<I, S>(mut self, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interface_chain = chain.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hashes<I, S>(mut self, hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hash_chain = hashes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reports as an in-process object even though it is registered remotely.
    pub fn not_remote(mut self) -> Self {
        self.remote = false;
        self
    }

    /// A remote service also answers to every interface in its chain.
    fn answers_to(&self, fq_name: &str, instance: &str) -> bool {
        self.transport == Transport::Remote
            && self.name.rsplit_once('/').map(|(_, inst)| inst) == Some(instance)
            && self.interface_chain.iter().any(|entry| entry == fq_name)
    }

    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl HalHandle for StaticHandle {
    fn is_remote(&self) -> bool {
        self.remote
    }

    fn partition_hint(&self) -> Option<Partition> {
        Some(self.partition)
    }

    async fn interface_chain(&self) -> Result<Vec<String>, RegistryError> {
        self.wait().await;
        Ok(self.interface_chain.clone())
    }

    async fn hash_chain(&self) -> Result<Vec<String>, RegistryError> {
        self.wait().await;
        Ok(self.hash_chain.clone())
    }

    async fn reported_version(&self) -> Result<Option<u64>, RegistryError> {
        self.wait().await;
        Ok(self.version)
    }
}

// ──────────────────────────────────────────────
// InMemoryRegistry
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    services: BTreeMap<(String, Transport), Arc<StaticHandle>>,
    unavailable: Option<String>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        InMemoryRegistry::default()
    }

    /// Register `handle` under its name and transport, replacing any previous entry.
    pub fn register(&mut self, handle: StaticHandle) {
        self.services
            .insert((handle.name.clone(), handle.transport), Arc::new(handle));
    }

    pub fn with_service(mut self, handle: StaticHandle) -> Self {
        self.register(handle);
        self
    }

    /// Make every `list_all` call fail with [`RegistryError::Unavailable`].
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[async_trait]
impl ServiceRegistry for InMemoryRegistry {
    async fn list_all(&self) -> Result<Vec<String>, RegistryError> {
        if let Some(reason) = &self.unavailable {
            return Err(RegistryError::Unavailable(reason.clone()));
        }
        Ok(self
            .services
            .values()
            .filter(|h| h.transport == Transport::Remote && h.format == HalFormat::VersionedRpc)
            .map(|h| h.name.clone())
            .collect())
    }

    async fn get_handle(
        &self,
        fq_name: &str,
        instance: &str,
        transport: Transport,
    ) -> Result<Option<Arc<dyn HalHandle>>, RegistryError> {
        let key = (format!("{}/{}", fq_name, instance), transport);
        let handle = self.services.get(&key).or_else(|| match transport {
            Transport::Remote => self.services.values().find(|h| h.answers_to(fq_name, instance)),
            Transport::InProcess => None,
        });
        match handle {
            Some(handle) => {
                handle.wait().await;
                Ok(Some(handle.clone() as Arc<dyn HalHandle>))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_only_remote_versioned_services() {
        let registry = InMemoryRegistry::new()
            .with_service(StaticHandle::remote("a.b@1.0::IFoo/default"))
            .with_service(StaticHandle::in_process("a.b@1.0::IFoo/default"))
            .with_service(StaticHandle::flat("a.b.IBar/default"));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.list_all().await.unwrap(), vec!["a.b@1.0::IFoo/default"]);
    }

    #[tokio::test]
    async fn get_handle_matches_transport() {
        let registry = InMemoryRegistry::new().with_service(
            StaticHandle::in_process("a.b@1.0::IFoo/default").with_chain(["a.b@1.0::IFoo"]),
        );
        assert!(registry
            .get_handle("a.b@1.0::IFoo", "default", Transport::Remote)
            .await
            .unwrap()
            .is_none());
        let handle = registry
            .get_handle("a.b@1.0::IFoo", "default", Transport::InProcess)
            .await
            .unwrap()
            .unwrap();
        assert!(!handle.is_remote());
        assert_eq!(handle.interface_chain().await.unwrap(), vec!["a.b@1.0::IFoo"]);
    }

    #[tokio::test]
    async fn remote_service_answers_to_its_chain() {
        let registry = InMemoryRegistry::new().with_service(
            StaticHandle::remote("a.b@1.2::IFoo/default")
                .with_chain(["a.b@1.2::IFoo", "a.b@1.0::IFoo", "android.hidl.base@1.0::IBase"]),
        );
        assert!(registry
            .get_handle("a.b@1.0::IFoo", "default", Transport::Remote)
            .await
            .unwrap()
            .is_some());
        assert!(registry
            .get_handle("a.b@1.0::IFoo", "other", Transport::Remote)
            .await
            .unwrap()
            .is_none());
        assert!(registry
            .get_handle("a.b@1.1::IFoo", "default", Transport::Remote)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unavailable_registry_fails_listing() {
        let registry = InMemoryRegistry::new().unavailable("no manager");
        assert!(matches!(
            registry.list_all().await,
            Err(RegistryError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn partition_comes_from_handle() {
        let registry = InMemoryRegistry::new().with_service(
            StaticHandle::remote("a.b@1.0::IFoo/default").with_partition(Partition::Vendor),
        );
        let handle = registry
            .get_handle("a.b@1.0::IFoo", "default", Transport::Remote)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(registry.owning_partition(handle.as_ref()).await, Partition::Vendor);
    }
}
