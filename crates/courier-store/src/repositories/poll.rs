//! Poll repository — polls and their selectable options.
//!
//! Option content hashes are computed by [`NewPollDetail::new`] before the
//! row reaches persistence; inbound votes carry the hash of the selected
//! option text and are matched against `option_sha256`.

use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use courier_core::{PollDetailId, PollId};

use crate::errors::Result;
use crate::row_types::{PollDetailRow, PollRow};

/// Fields for a new poll.
pub struct NewPoll<'a> {
    /// Pre-generated poll ID.
    pub id: &'a PollId,
    /// Owning identity.
    pub identity_id: i64,
    /// Poll question.
    pub question: &'a str,
}

/// A fully constructed poll option, content hash included.
pub struct NewPollDetail {
    /// Pre-generated option ID.
    pub id: PollDetailId,
    /// Owning poll.
    pub poll_id: PollId,
    /// Option text.
    pub option_text: String,
    /// Hex SHA-256 of the option text.
    pub option_sha256: String,
}

impl NewPollDetail {
    /// Build an option for a poll, computing the content hash up front.
    #[must_use]
    pub fn new(poll_id: PollId, option_text: impl Into<String>) -> Self {
        let option_text = option_text.into();
        Self {
            id: PollDetailId::generate(),
            poll_id,
            option_sha256: hash_option(&option_text),
            option_text,
        }
    }
}

/// Hex SHA-256 of an option text, as matched against inbound votes.
#[must_use]
pub fn hash_option(option_text: &str) -> String {
    let digest = Sha256::digest(option_text.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Poll repository.
pub struct PollRepo;

impl PollRepo {
    /// Insert a new poll.
    pub fn create(conn: &Connection, new: &NewPoll<'_>) -> Result<PollRow> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO polls (id, identity_id, question, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![new.id.as_str(), new.identity_id, new.question, now],
        )?;
        Ok(PollRow {
            id: new.id.as_str().to_owned(),
            identity_id: new.identity_id,
            question: new.question.to_owned(),
            created_at: now,
        })
    }

    /// Insert one poll option.
    pub fn add_detail(conn: &Connection, detail: &NewPollDetail) -> Result<PollDetailRow> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO poll_details (id, poll_id, option_text, option_sha256, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                detail.id.as_str(),
                detail.poll_id.as_str(),
                detail.option_text,
                detail.option_sha256,
                now,
            ],
        )?;
        Ok(PollDetailRow {
            id: detail.id.as_str().to_owned(),
            poll_id: detail.poll_id.as_str().to_owned(),
            option_text: detail.option_text.clone(),
            option_sha256: detail.option_sha256.clone(),
            created_at: now,
        })
    }

    /// Get a poll by ID, scoped to an identity.
    pub fn get_for_identity(
        conn: &Connection,
        poll_id: &str,
        identity_id: i64,
    ) -> Result<Option<PollRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM polls WHERE id = ?1 AND identity_id = ?2",
                params![poll_id, identity_id],
                Self::map_poll,
            )
            .optional()?;
        Ok(row)
    }

    /// Options of a poll in insertion order.
    pub fn list_details(conn: &Connection, poll_id: &str) -> Result<Vec<PollDetailRow>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM poll_details WHERE poll_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map(params![poll_id], Self::map_detail)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Find the option of a poll whose content hash matches (first match).
    pub fn find_detail_by_hash(
        conn: &Connection,
        poll_id: &str,
        option_sha256: &str,
    ) -> Result<Option<PollDetailRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM poll_details
                 WHERE poll_id = ?1 AND option_sha256 = ?2
                 ORDER BY created_at, id LIMIT 1",
                params![poll_id, option_sha256],
                Self::map_detail,
            )
            .optional()?;
        Ok(row)
    }

    fn map_poll(row: &rusqlite::Row<'_>) -> rusqlite::Result<PollRow> {
        Ok(PollRow {
            id: row.get("id")?,
            identity_id: row.get("identity_id")?,
            question: row.get("question")?,
            created_at: row.get("created_at")?,
        })
    }

    fn map_detail(row: &rusqlite::Row<'_>) -> rusqlite::Result<PollDetailRow> {
        Ok(PollDetailRow {
            id: row.get("id")?,
            poll_id: row.get("poll_id")?,
            option_text: row.get("option_text")?,
            option_sha256: row.get("option_sha256")?,
            created_at: row.get("created_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
