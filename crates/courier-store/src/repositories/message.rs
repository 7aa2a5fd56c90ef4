//! Message repository — pending rows and delivery-state updates.
//!
//! A message row is inserted synchronously at send time with all flags
//! cleared, then flipped by the background transmission (sent/failed) and by
//! inbound receipts (read). Flags are updated by platform message ID with
//! targeted single-row statements.

use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::Result;
use crate::row_types::MessageRow;

/// Fields for a new pending message. The message ID is generated by the
/// caller before this struct exists; the repository never assigns IDs.
pub struct NewMessage<'a> {
    /// Pre-generated globally unique message ID.
    pub message_id: &'a str,
    /// Owning identity.
    pub identity_id: i64,
    /// Destination address (bare user).
    pub destination: &'a str,
    /// Payload body.
    pub body: &'a str,
    /// Payload kind.
    pub kind: &'a str,
    /// Linked poll, for poll-creation messages.
    pub poll_id: Option<&'a str>,
}

/// Message repository.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert a pending message row (sent/read/failed all false).
    pub fn create(conn: &Connection, new: &NewMessage<'_>) -> Result<MessageRow> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO messages (message_id, identity_id, destination, body, kind, poll_id,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                new.message_id,
                new.identity_id,
                new.destination,
                new.body,
                new.kind,
                new.poll_id,
                now,
            ],
        )?;

        Ok(MessageRow {
            message_id: new.message_id.to_owned(),
            identity_id: new.identity_id,
            destination: new.destination.to_owned(),
            body: new.body.to_owned(),
            kind: new.kind.to_owned(),
            sent: false,
            read: false,
            failed: false,
            sent_at: None,
            read_at: None,
            failed_at: None,
            file_name: None,
            poll_id: new.poll_id.map(str::to_owned),
            poll_detail_id: None,
            answered_at: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a message by platform message ID.
    pub fn get_by_id(conn: &Connection, message_id: &str) -> Result<Option<MessageRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM messages WHERE message_id = ?1",
                params![message_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Mark a message sent (provider accepted it).
    pub fn mark_sent(conn: &Connection, message_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE messages SET sent = 1, sent_at = ?1, updated_at = ?1 WHERE message_id = ?2",
            params![now, message_id],
        )?;
        Ok(changed > 0)
    }

    /// Mark a message sent and record the resolved file name (file sends).
    pub fn mark_sent_with_file_name(
        conn: &Connection,
        message_id: &str,
        file_name: &str,
    ) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE messages SET sent = 1, sent_at = ?1, file_name = ?2, updated_at = ?1
             WHERE message_id = ?3",
            params![now, file_name, message_id],
        )?;
        Ok(changed > 0)
    }

    /// Mark a message failed (provider rejected transmission).
    pub fn mark_failed(conn: &Connection, message_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE messages SET failed = 1, failed_at = ?1, updated_at = ?1 WHERE message_id = ?2",
            params![now, message_id],
        )?;
        Ok(changed > 0)
    }

    /// Mark a message read with the receipt timestamp.
    pub fn mark_read(conn: &Connection, message_id: &str, read_at: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE messages SET read = 1, read_at = ?1, updated_at = ?2 WHERE message_id = ?3",
            params![read_at, now, message_id],
        )?;
        Ok(changed > 0)
    }

    /// Record the latest vote on a poll-creation message (last-vote-wins).
    ///
    /// Called inside the poll-vote transaction only.
    pub fn record_answer(
        conn: &Connection,
        message_id: &str,
        poll_detail_id: &str,
        answered_at: &str,
    ) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE messages SET poll_detail_id = ?1, answered_at = ?2, updated_at = ?3
             WHERE message_id = ?4",
            params![poll_detail_id, answered_at, now, message_id],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            message_id: row.get("message_id")?,
            identity_id: row.get("identity_id")?,
            destination: row.get("destination")?,
            body: row.get("body")?,
            kind: row.get("kind")?,
            sent: row.get("sent")?,
            read: row.get("read")?,
            failed: row.get("failed")?,
            sent_at: row.get("sent_at")?,
            read_at: row.get("read_at")?,
            failed_at: row.get("failed_at")?,
            file_name: row.get("file_name")?,
            poll_id: row.get("poll_id")?,
            poll_detail_id: row.get("poll_detail_id")?,
            answered_at: row.get("answered_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
