//! Identity repository — registered devices/accounts and their session state.
//!
//! The identity row is mutated only from that identity's supervisor task
//! (pairing code, connected flag, platform address), so all updates here are
//! targeted single-row statements.

use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::Result;
use crate::row_types::IdentityRow;

/// Fields for registering a new identity (used by the administration layer
/// and test fixtures; the runtime only reads and updates).
pub struct NewIdentity<'a> {
    /// Unique short code.
    pub code: &'a str,
    /// Display name.
    pub name: &'a str,
    /// Auth token.
    pub token: &'a str,
    /// Optional webhook URL.
    pub webhook: Option<&'a str>,
    /// Event subscription list (comma-separated); `None` means `"All"`.
    pub subscriptions: Option<&'a str>,
}

/// Identity repository.
pub struct IdentityRepo;

impl IdentityRepo {
    /// Insert a new identity and return the stored row.
    pub fn create(conn: &Connection, new: &NewIdentity<'_>) -> Result<IdentityRow> {
        let now = chrono::Utc::now().to_rfc3339();
        let subscriptions = new.subscriptions.unwrap_or("All");
        let _ = conn.execute(
            "INSERT INTO identities (code, name, token, webhook, subscriptions, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![new.code, new.name, new.token, new.webhook, subscriptions, now],
        )?;
        let id = conn.last_insert_rowid();

        Ok(IdentityRow {
            id,
            code: new.code.to_owned(),
            name: new.name.to_owned(),
            token: new.token.to_owned(),
            webhook: new.webhook.map(str::to_owned),
            platform_address: None,
            pairing_code: None,
            connected: false,
            subscriptions: subscriptions.to_owned(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get identity by ID.
    pub fn get_by_id(conn: &Connection, identity_id: i64) -> Result<Option<IdentityRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM identities WHERE id = ?1",
                params![identity_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All identities currently marked connected (startup reconnect query).
    pub fn list_connected(conn: &Connection) -> Result<Vec<IdentityRow>> {
        let mut stmt =
            conn.prepare("SELECT * FROM identities WHERE connected = 1 ORDER BY id")?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Overwrite the transient pairing code (last-code-wins).
    pub fn set_pairing_code(conn: &Connection, identity_id: i64, code: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE identities SET pairing_code = ?1, updated_at = ?2 WHERE id = ?3",
            params![code, now, identity_id],
        )?;
        Ok(changed > 0)
    }

    /// Clear the transient pairing code.
    pub fn clear_pairing_code(conn: &Connection, identity_id: i64) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE identities SET pairing_code = NULL, updated_at = ?1 WHERE id = ?2",
            params![now, identity_id],
        )?;
        Ok(changed > 0)
    }

    /// Set or clear the connected flag.
    pub fn set_connected(conn: &Connection, identity_id: i64, connected: bool) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE identities SET connected = ?1, updated_at = ?2 WHERE id = ?3",
            params![connected, now, identity_id],
        )?;
        Ok(changed > 0)
    }

    /// Persist the resolved platform address and mark the identity connected
    /// (pairing success).
    pub fn record_pairing(conn: &Connection, identity_id: i64, address: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE identities
             SET platform_address = ?1, connected = 1, pairing_code = NULL, updated_at = ?2
             WHERE id = ?3",
            params![address, now, identity_id],
        )?;
        Ok(changed > 0)
    }

    /// Clear the persisted platform address (explicit logout only).
    pub fn clear_platform_address(conn: &Connection, identity_id: i64) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE identities SET platform_address = NULL, updated_at = ?1 WHERE id = ?2",
            params![now, identity_id],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IdentityRow> {
        Ok(IdentityRow {
            id: row.get("id")?,
            code: row.get("code")?,
            name: row.get("name")?,
            token: row.get("token")?,
            webhook: row.get("webhook")?,
            platform_address: row.get("platform_address")?,
            pairing_code: row.get("pairing_code")?,
            connected: row.get("connected")?,
            subscriptions: row.get("subscriptions")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
