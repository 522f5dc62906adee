use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while parsing references and digests
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid reference format {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("invalid digest {digest:?}: {reason}")]
    InvalidDigest { digest: String, reason: String },
}

impl CoreError {
    pub(crate) fn reference(reference: &str, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn digest(digest: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDigest {
            digest: digest.to_string(),
            reason: reason.into(),
        }
    }
}
