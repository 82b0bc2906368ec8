//! Error types for the licensing module.

use thiserror::Error;

/// Licensing-specific errors.
///
/// None of these cross into the host application: the protection gate folds
/// every variant into a [`crate::Decision`].
#[derive(Debug, Error)]
pub enum LicenseError {
    /// License key or domain cannot be determined.
    #[error("configuration error: {0}")]
    Config(String),

    /// The persisted record's tamper hash does not match.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// The authority could not be reached or answered with a non-200 status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The authority answered with a body that is not a valid response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The authority explicitly denied the license.
    #[error("license rejected by authority: {message}")]
    Rejected { message: String },

    /// The resolved request domain is not the bound domain.
    #[error("license is bound to {bound}, not valid for {actual:?}")]
    DomainMismatch { bound: String, actual: String },

    /// The local record is marked inactive.
    #[error("license is inactive or has been revoked")]
    Inactive,

    /// Local storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Returns true if the grace window may cover this failure.
    ///
    /// Only an unreachable or incoherent authority qualifies. Rejections and
    /// local failures never do.
    #[must_use]
    pub fn is_grace_eligible(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Protocol(_))
    }
}

impl From<reqwest::Error> for LicenseError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Transport(format!("request timed out: {e}"))
        } else if e.is_decode() {
            Self::Protocol(format!("invalid response from license server: {e}"))
        } else {
            Self::Transport(format!("failed to connect to license server: {e}"))
        }
    }
}

impl From<domainlock_types::Error> for LicenseError {
    fn from(e: domainlock_types::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
