//! Vote audit repository. Append-only; one row per received vote.

use rusqlite::{params, Connection};

use courier_core::PollHistoryId;

use crate::errors::Result;
use crate::row_types::PollHistoryRow;

/// Fields for one vote audit row.
pub struct NewPollHistory<'a> {
    /// Poll the vote belongs to.
    pub poll_id: &'a str,
    /// Identity that owns the poll message.
    pub identity_id: i64,
    /// Resolved option.
    pub poll_detail_id: &'a str,
    /// Poll-creation message the vote answered.
    pub message_id: &'a str,
    /// Destination of the original poll message.
    pub destination: &'a str,
    /// Vote timestamp from the platform event.
    pub answered_at: &'a str,
}

/// Vote audit repository.
pub struct PollHistoryRepo;

impl PollHistoryRepo {
    /// Append one vote audit row.
    pub fn insert(conn: &Connection, new: &NewPollHistory<'_>) -> Result<PollHistoryRow> {
        let id = PollHistoryId::generate();
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO poll_history
             (id, poll_id, identity_id, poll_detail_id, message_id, destination, answered_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.as_str(),
                new.poll_id,
                new.identity_id,
                new.poll_detail_id,
                new.message_id,
                new.destination,
                new.answered_at,
                now,
            ],
        )?;
        Ok(PollHistoryRow {
            id: id.into_inner(),
            poll_id: new.poll_id.to_owned(),
            identity_id: new.identity_id,
            poll_detail_id: new.poll_detail_id.to_owned(),
            message_id: new.message_id.to_owned(),
            destination: new.destination.to_owned(),
            answered_at: new.answered_at.to_owned(),
            created_at: now,
        })
    }

    /// All votes recorded against one poll message, oldest first.
    pub fn list_by_message(conn: &Connection, message_id: &str) -> Result<Vec<PollHistoryRow>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM poll_history WHERE message_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map(params![message_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PollHistoryRow> {
        Ok(PollHistoryRow {
            id: row.get("id")?,
            poll_id: row.get("poll_id")?,
            identity_id: row.get("identity_id")?,
            poll_detail_id: row.get("poll_detail_id")?,
            message_id: row.get("message_id")?,
            destination: row.get("destination")?,
            answered_at: row.get("answered_at")?,
            created_at: row.get("created_at")?,
        })
    }
}
