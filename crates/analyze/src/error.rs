use vintf_registry::RegistryError;

/// Errors that abort a whole check or a whole run.
///
/// Per-instance problems are never errors; they become verdicts.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// A collaborator could not supply what the check needs.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("unknown check '{0}'")]
    UnknownCheck(String),
}
