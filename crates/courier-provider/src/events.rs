//! Asynchronous events raised by a platform client.
//!
//! [`PlatformEvent`] is a closed enum: the dispatcher matches it
//! exhaustively, and anything the client cannot map onto a known variant
//! arrives as [`PlatformEvent::Unrecognized`] so new platform event kinds
//! degrade to a log line instead of a crash or a silent drop.

use chrono::{DateTime, Utc};

use courier_core::PlatformAddress;

/// An asynchronous event from the platform, delivered in per-identity
/// arrival order through the channel returned by
/// [`crate::ClientFactory::create`].
#[derive(Clone, Debug)]
pub enum PlatformEvent {
    /// The connection is up and presence can be announced.
    Connected,

    /// QR pairing completed; the platform assigned an address.
    PairSuccess {
        /// Address the identity is now bound to.
        address: PlatformAddress,
    },

    /// The recipient read one or more of our messages.
    ReadReceipt {
        /// Platform message IDs covered by this receipt.
        message_ids: Vec<String>,
        /// When the messages were read.
        read_at: DateTime<Utc>,
    },

    /// An encrypted poll vote arrived.
    PollVote {
        /// Message ID of the poll-creation message being answered.
        poll_message_id: String,
        /// Vote ciphertext, decrypted via
        /// [`crate::PlatformClient::decrypt_poll_vote`].
        ciphertext: Vec<u8>,
        /// When the vote was cast.
        voted_at: DateTime<Utc>,
    },

    /// The platform revoked our credentials (device unlinked).
    LoggedOut,

    /// Any event kind the client does not map. Logged, never acted on.
    Unrecognized {
        /// Client-side name of the event kind.
        kind: String,
    },
}

impl PlatformEvent {
    /// Stable kind label for log fields.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Connected => "connected",
            Self::PairSuccess { .. } => "pair_success",
            Self::ReadReceipt { .. } => "read_receipt",
            Self::PollVote { .. } => "poll_vote",
            Self::LoggedOut => "logged_out",
            Self::Unrecognized { kind } => kind,
        }
    }
}

/// Events on the one-way pairing stream opened for a new identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PairingEvent {
    /// A fresh QR pairing code. Each code supersedes the previous one.
    Code(String),
    /// The user scanned the code; pairing is complete.
    Success,
    /// The pairing window elapsed without a scan.
    Timeout,
    /// Any other stream event. Logged and ignored.
    Other(String),
}

impl PairingEvent {
    /// Whether this event ends the pairing sub-protocol.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Timeout)
    }
}

/// A decrypted poll vote.
#[derive(Clone, Debug)]
pub struct DecryptedVote {
    /// Hex SHA-256 of the selected option's text.
    pub selected_sha256: String,
}
