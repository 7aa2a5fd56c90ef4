//! Value types crossing the provider boundary.

use courier_core::PlatformAddress;

/// Media category for uploads and media sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    /// Inline-rendered image.
    Image,
    /// File/document attachment.
    Document,
}

/// Handle to uploaded media, returned by [`crate::PlatformClient::upload`]
/// and passed back in a media send. Opaque to the gateway core.
#[derive(Clone, Debug)]
pub struct MediaUpload {
    /// Provider-side reference to the stored blob.
    pub reference: String,
    /// MIME type the blob was uploaded as.
    pub mime_type: String,
    /// Blob size in bytes.
    pub size: u64,
}

/// Payload of one outbound send, already fully resolved (media uploaded,
/// poll options ordered).
#[derive(Clone, Debug)]
pub enum OutboundPayload {
    /// Plain text.
    Text {
        /// Message body.
        body: String,
    },
    /// Uploaded media with an optional caption.
    Media {
        /// Media category.
        kind: MediaKind,
        /// Upload handle from [`crate::PlatformClient::upload`].
        upload: MediaUpload,
        /// Caption shown with the media.
        caption: String,
        /// File name presented to the recipient (documents only).
        file_name: Option<String>,
    },
    /// Poll creation with an ordered option list.
    Poll {
        /// Poll question.
        question: String,
        /// Options in presentation order.
        options: Vec<String>,
    },
}

/// Global presence announced to the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    /// Online and reachable.
    Available,
    /// Going offline.
    Unavailable,
}

/// Per-chat typing state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatPresence {
    /// Typing indicator on.
    Composing,
    /// Typing indicator off.
    Paused,
}

/// One recorded chat-presence update (used by the mock client).
#[derive(Clone, Debug)]
pub struct ChatPresenceUpdate {
    /// Chat the update was sent to.
    pub to: PlatformAddress,
    /// Announced state.
    pub state: ChatPresence,
}
