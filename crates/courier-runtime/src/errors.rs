//! Error types for the gateway runtime.

use thiserror::Error;

use courier_core::AddressError;
use courier_provider::ProviderError;
use courier_store::StoreError;

/// Errors surfaced to callers of the gateway runtime.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The identity has no active session.
    #[error("identity {0} has no active session")]
    NotConnected(i64),

    /// The identity does not exist.
    #[error("identity {0} not found")]
    IdentityNotFound(i64),

    /// The destination address could not be parsed.
    #[error("invalid destination: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Inline media content could not be decoded.
    #[error("invalid media payload: {0}")]
    InvalidMedia(String),

    /// The poll does not exist or belongs to another identity.
    #[error("poll {0} not found")]
    PollNotFound(String),

    /// The platform client failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Persistence failed.
    #[error(transparent)]
    Persistence(#[from] StoreError),

    /// The startup reconnect sweep could not bring an identity back.
    #[error("startup reconnect failed for identity {identity_id}: {message}")]
    FatalStartup {
        /// Identity that failed to restart.
        identity_id: i64,
        /// Underlying cause.
        message: String,
    },
}

impl GatewayError {
    /// Stable category label for log fields.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotConnected(_) => "not_connected",
            Self::IdentityNotFound(_) => "identity_not_found",
            Self::InvalidAddress(_) => "invalid_address",
            Self::InvalidMedia(_) => "invalid_media",
            Self::PollNotFound(_) => "poll_not_found",
            Self::Provider(_) => "provider",
            Self::Persistence(_) => "persistence",
            Self::FatalStartup { .. } => "fatal_startup",
        }
    }
}

/// Convenience type alias for runtime results.
pub type Result<T> = std::result::Result<T, GatewayError>;
