/// Errors raised while building or decomposing VINTF values.
///
/// All of these are structural: the offending entry is excluded from the
/// working set and reported, the enclosing run continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A name could not be decomposed into package / version / interface / instance.
    #[error("'{name}' is not a valid name: {reason}")]
    InvalidName { name: String, reason: String },

    /// `down_rev` was asked to go below minor version 0.
    #[error("cannot lower the minor version of {name}: already at minor 0")]
    Precision { name: String },

    /// A manifest or matrix document is internally inconsistent.
    #[error("invalid document: {0}")]
    Document(String),
}

impl CoreError {
    pub(crate) fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
