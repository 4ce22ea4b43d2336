use std::time::Duration;

/// All errors that can be returned by a collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// A required document or the registry itself could not be obtained.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A bounded call did not complete in time.
    #[error("timed out after {after:?} waiting for {name}")]
    Timeout { name: String, after: Duration },

    /// A backend-specific failure (transport error, malformed snapshot, etc.).
    #[error("registry backend error: {0}")]
    Backend(String),
}
