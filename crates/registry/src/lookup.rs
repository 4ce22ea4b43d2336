//! Per-lookup deadlines.
//!
//! Every live call is raced against a deadline with `tokio::time::timeout`.
//! On expiry the pending future is dropped, so a late answer is discarded
//! rather than delivered to a check that has moved on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use vintf_core::Transport;

use crate::error::RegistryError;
use crate::traits::{HalHandle, ServiceRegistry};

/// Default per-lookup deadline before the device slowdown multiplier.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupConfig {
    pub base: Duration,
    pub multiplier: u32,
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            base: DEFAULT_LOOKUP_TIMEOUT,
            multiplier: 1,
        }
    }
}

impl LookupConfig {
    pub fn new(base: Duration, multiplier: u32) -> Self {
        LookupConfig {
            base,
            multiplier: multiplier.max(1),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.base.saturating_mul(self.multiplier.max(1))
    }
}

/// Result of one bounded call.
#[derive(Debug, Clone)]
pub enum LookupOutcome<T> {
    Found(T),
    /// The collaborator answered: nothing is there.
    Missing,
    /// No answer within the deadline. Not the same as `Missing`.
    TimedOut(Duration),
}

impl<T> LookupOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            LookupOutcome::Found(value) => Some(value),
            LookupOutcome::Missing | LookupOutcome::TimedOut(_) => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, LookupOutcome::TimedOut(_))
    }
}

/// Issues deadline-bounded calls against a [`ServiceRegistry`].
#[derive(Clone)]
pub struct BoundedLookup {
    registry: Arc<dyn ServiceRegistry>,
    config: LookupConfig,
}

impl BoundedLookup {
    pub fn new(registry: Arc<dyn ServiceRegistry>, config: LookupConfig) -> Self {
        BoundedLookup { registry, config }
    }

    pub fn registry(&self) -> &dyn ServiceRegistry {
        self.registry.as_ref()
    }

    pub fn config(&self) -> LookupConfig {
        self.config
    }

    /// Run `call` under the configured deadline.
    pub async fn bounded<T, F>(&self, name: &str, call: F) -> Result<LookupOutcome<T>, RegistryError>
    where
        F: Future<Output = Result<Option<T>, RegistryError>> + Send,
    {
        let after = self.config.timeout();
        match tokio::time::timeout(after, call).await {
            Ok(Ok(Some(value))) => Ok(LookupOutcome::Found(value)),
            Ok(Ok(None)) => {
                tracing::debug!(name, "lookup found nothing");
                Ok(LookupOutcome::Missing)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(name, ?after, "lookup timed out");
                Ok(LookupOutcome::TimedOut(after))
            }
        }
    }

    /// Fetch a handle for `fq_name/instance`.
    pub async fn handle(
        &self,
        fq_name: &str,
        instance: &str,
        transport: Transport,
    ) -> Result<LookupOutcome<Arc<dyn HalHandle>>, RegistryError> {
        let name = format!("{}/{}", fq_name, instance);
        tracing::debug!(%name, %transport, "looking up handle");
        self.bounded(&name, self.registry.get_handle(fq_name, instance, transport))
            .await
    }

    pub async fn interface_chain(
        &self,
        name: &str,
        handle: &dyn HalHandle,
    ) -> Result<LookupOutcome<Vec<String>>, RegistryError> {
        self.bounded(name, async { handle.interface_chain().await.map(Some) })
            .await
    }

    pub async fn hash_chain(
        &self,
        name: &str,
        handle: &dyn HalHandle,
    ) -> Result<LookupOutcome<Vec<String>>, RegistryError> {
        self.bounded(name, async { handle.hash_chain().await.map(Some) })
            .await
    }

    /// A service that reports no version yields `Found(None)`.
    pub async fn reported_version(
        &self,
        name: &str,
        handle: &dyn HalHandle,
    ) -> Result<LookupOutcome<Option<u64>>, RegistryError> {
        self.bounded(name, async { handle.reported_version().await.map(Some) })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_scales_with_multiplier() {
        let config = LookupConfig::new(Duration::from_millis(1000), 3);
        assert_eq!(config.timeout(), Duration::from_millis(3000));
        let zero = LookupConfig::new(Duration::from_millis(500), 0);
        assert_eq!(zero.timeout(), Duration::from_millis(500));
        assert_eq!(LookupConfig::default().timeout(), DEFAULT_LOOKUP_TIMEOUT);
    }

    #[test]
    fn outcome_accessors() {
        assert_eq!(LookupOutcome::Found(3).found(), Some(3));
        assert_eq!(LookupOutcome::<u8>::Missing.found(), None);
        assert!(LookupOutcome::<u8>::TimedOut(Duration::from_secs(1)).is_timed_out());
    }
}
