//! The client traits the gateway core programs against.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use courier_core::{IdentityId, MessageId, PlatformAddress};

use crate::errors::Result;
use crate::events::{DecryptedVote, PairingEvent, PlatformEvent};
use crate::types::{ChatPresence, MediaKind, MediaUpload, OutboundPayload, Presence};

/// One live platform connection for one identity.
///
/// Implementations own the wire protocol and encryption. All methods are
/// callable from any task; the client raises asynchronous events through the
/// channel handed out by [`ClientFactory::create`], in arrival order.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Establish the platform connection. For an identity with stored
    /// credentials this resumes the existing login; completion of the
    /// connection is signaled by [`PlatformEvent::Connected`].
    async fn connect(&self) -> Result<()>;

    /// Whether stored credentials exist (paired before).
    fn is_logged_in(&self) -> bool;

    /// Whether the connection is currently up.
    fn is_connected(&self) -> bool;

    /// Open the one-way QR pairing stream for a new identity. At most one
    /// stream per client; ends with a terminal [`PairingEvent`] or when the
    /// client disconnects.
    async fn pairing_stream(&self) -> Result<mpsc::Receiver<PairingEvent>>;

    /// Submit a payload tagged with the caller-generated message ID.
    async fn send(
        &self,
        message_id: &MessageId,
        to: &PlatformAddress,
        payload: &OutboundPayload,
    ) -> Result<()>;

    /// Upload a media blob, returning the handle a media send carries.
    async fn upload(&self, kind: MediaKind, bytes: &[u8], mime_type: &str) -> Result<MediaUpload>;

    /// Decrypt a poll-vote ciphertext for the given poll-creation message.
    async fn decrypt_poll_vote(
        &self,
        poll_message_id: &str,
        ciphertext: &[u8],
    ) -> Result<DecryptedVote>;

    /// Announce global presence. Best-effort from the caller's perspective.
    async fn send_presence(&self, presence: Presence) -> Result<()>;

    /// Set the typing indicator in one chat.
    async fn chat_presence(&self, to: &PlatformAddress, state: ChatPresence) -> Result<()>;

    /// Tear down the connection. Idempotent.
    async fn disconnect(&self);
}

/// Builds platform clients, one per identity.
pub trait ClientFactory: Send + Sync {
    /// Create a client for an identity. `known_address` is the previously
    /// paired platform address, if any; with it the client restores the
    /// stored device login instead of starting a fresh pairing.
    ///
    /// Returns the client together with the bounded event channel it pushes
    /// [`PlatformEvent`]s into.
    fn create(
        &self,
        identity_id: IdentityId,
        known_address: Option<&PlatformAddress>,
    ) -> Result<(Arc<dyn PlatformClient>, mpsc::Receiver<PlatformEvent>)>;
}
