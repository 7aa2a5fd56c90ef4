//! Error types for the provider boundary.

use thiserror::Error;

/// Errors raised by a platform client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Establishing the platform connection failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The client holds no live connection.
    #[error("client is not connected")]
    NotConnected,

    /// The client holds no stored credentials.
    #[error("client is not logged in")]
    NotLoggedIn,

    /// Transmission to the platform failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Media upload failed.
    #[error("upload failed: {0}")]
    Upload(String),

    /// Poll-vote ciphertext could not be decrypted.
    #[error("vote decryption failed: {0}")]
    Decrypt(String),

    /// The pairing stream could not be opened.
    #[error("pairing unavailable: {0}")]
    Pairing(String),
}

impl ProviderError {
    /// Stable category label for log fields.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::NotConnected => "not_connected",
            Self::NotLoggedIn => "not_logged_in",
            Self::Transport(_) => "transport",
            Self::Upload(_) => "upload",
            Self::Decrypt(_) => "decrypt",
            Self::Pairing(_) => "pairing",
        }
    }
}

/// Convenience type alias for provider results.
pub type Result<T> = std::result::Result<T, ProviderError>;
