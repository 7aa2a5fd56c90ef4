//! Database row types mapping `SQLite` rows to Rust structs.
//!
//! These represent the raw row shape. Timestamps are stored as RFC 3339
//! strings; boolean flags as integers, surfaced here as `bool`.

use serde::{Deserialize, Serialize};

/// Raw identity row from the `identities` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityRow {
    /// Identity ID.
    pub id: i64,
    /// Unique short code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Auth token (opaque to this subsystem).
    pub token: String,
    /// Webhook URL for event delivery, if configured.
    pub webhook: Option<String>,
    /// Platform address; null until paired.
    pub platform_address: Option<String>,
    /// Transient pairing code; null outside an active pairing.
    pub pairing_code: Option<String>,
    /// Whether the identity currently holds a live session.
    pub connected: bool,
    /// Comma-separated event subscription list.
    pub subscriptions: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

impl IdentityRow {
    /// Split the subscription list into its entries.
    #[must_use]
    pub fn subscription_list(&self) -> Vec<String> {
        self.subscriptions
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Raw message row from the `messages` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRow {
    /// Globally unique generated message ID (also the platform message ID).
    pub message_id: String,
    /// Owning identity.
    pub identity_id: i64,
    /// Destination address (bare user).
    pub destination: String,
    /// Payload body.
    pub body: String,
    /// Payload kind (text/image/file/poll).
    pub kind: String,
    /// Delivery flags.
    pub sent: bool,
    /// Read flag.
    pub read: bool,
    /// Failure flag.
    pub failed: bool,
    /// When the provider accepted the message.
    pub sent_at: Option<String>,
    /// When a read receipt arrived.
    pub read_at: Option<String>,
    /// When transmission failed.
    pub failed_at: Option<String>,
    /// Resolved file name (file sends only).
    pub file_name: Option<String>,
    /// Linked poll (poll sends only).
    pub poll_id: Option<String>,
    /// Resolved poll option after a vote.
    pub poll_detail_id: Option<String>,
    /// When the latest vote arrived.
    pub answered_at: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Raw poll row from the `polls` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollRow {
    /// Poll ID.
    pub id: String,
    /// Owning identity.
    pub identity_id: i64,
    /// Poll question.
    pub question: String,
    /// Creation timestamp.
    pub created_at: String,
}

/// Raw poll option row from the `poll_details` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollDetailRow {
    /// Option ID.
    pub id: String,
    /// Owning poll.
    pub poll_id: String,
    /// Option text.
    pub option_text: String,
    /// Hex SHA-256 of the option text, matched against inbound votes.
    pub option_sha256: String,
    /// Creation timestamp.
    pub created_at: String,
}

/// Raw vote audit row from the `poll_history` table. Append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollHistoryRow {
    /// Audit row ID.
    pub id: String,
    /// Poll the vote belongs to.
    pub poll_id: String,
    /// Identity that owns the poll message.
    pub identity_id: i64,
    /// Resolved option.
    pub poll_detail_id: String,
    /// Poll-creation message the vote answered.
    pub message_id: String,
    /// Destination of the original poll message.
    pub destination: String,
    /// Vote timestamp (from the platform event).
    pub answered_at: String,
    /// Row creation timestamp.
    pub created_at: String,
}
