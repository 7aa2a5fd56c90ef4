//! High-level store facade over the connection pool and repositories.
//!
//! The runtime talks to [`Store`] exclusively. Most operations are targeted
//! single-row statements delegated to a repository; poll creation and the
//! poll-vote commit are the multi-statement transactions, composed here.

use tracing::debug;

use courier_core::PollId;

use crate::connection::{self, ConnectionConfig, ConnectionPool};
use crate::errors::{Result, StoreError};
use crate::migrations::run_migrations;
use crate::repositories::{
    IdentityRepo, MessageRepo, NewMessage, NewPoll, NewPollDetail, NewPollHistory, PollHistoryRepo,
    PollRepo,
};
use crate::repositories::identity::NewIdentity;
use crate::row_types::{IdentityRow, MessageRow, PollDetailRow, PollHistoryRow, PollRow};

/// Store facade. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Store {
    pool: ConnectionPool,
}

impl Store {
    /// Wrap an existing pool. Migrations must already have been applied.
    #[must_use]
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open a file-backed store and apply pending migrations.
    pub fn open(path: &str, config: &ConnectionConfig) -> Result<Self> {
        let pool = connection::new_file(path, config)?;
        let conn = pool.get()?;
        let _ = run_migrations(&conn)?;
        drop(conn);
        Ok(Self { pool })
    }

    /// In-memory store with migrations applied (tests).
    pub fn in_memory() -> Result<Self> {
        let pool = connection::new_in_memory(&ConnectionConfig::default())?;
        let conn = pool.get()?;
        let _ = run_migrations(&conn)?;
        drop(conn);
        Ok(Self { pool })
    }

    // ── Identities ──────────────────────────────────────────────────────────

    /// Get an identity, failing if it does not exist.
    pub fn get_identity(&self, identity_id: i64) -> Result<IdentityRow> {
        let conn = self.pool.get()?;
        IdentityRepo::get_by_id(&conn, identity_id)?
            .ok_or(StoreError::IdentityNotFound(identity_id))
    }

    /// Identities marked connected, for the startup reconnect sweep.
    pub fn connected_identities(&self) -> Result<Vec<IdentityRow>> {
        let conn = self.pool.get()?;
        IdentityRepo::list_connected(&conn)
    }

    /// Overwrite the transient pairing code.
    pub fn set_pairing_code(&self, identity_id: i64, code: &str) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = IdentityRepo::set_pairing_code(&conn, identity_id, code)?;
        Ok(())
    }

    /// Clear the transient pairing code.
    pub fn clear_pairing_code(&self, identity_id: i64) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = IdentityRepo::clear_pairing_code(&conn, identity_id)?;
        Ok(())
    }

    /// Set or clear the connected flag.
    pub fn set_connected(&self, identity_id: i64, connected: bool) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = IdentityRepo::set_connected(&conn, identity_id, connected)?;
        Ok(())
    }

    /// Persist the paired platform address and mark the identity connected.
    pub fn record_pairing(&self, identity_id: i64, address: &str) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = IdentityRepo::record_pairing(&conn, identity_id, address)?;
        Ok(())
    }

    /// Forget the platform address after an explicit logout.
    pub fn clear_platform_address(&self, identity_id: i64) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = IdentityRepo::clear_platform_address(&conn, identity_id)?;
        Ok(())
    }

    // ── Messages ────────────────────────────────────────────────────────────

    /// Insert a pending message row.
    pub fn insert_message(&self, new: &NewMessage<'_>) -> Result<MessageRow> {
        let conn = self.pool.get()?;
        MessageRepo::create(&conn, new)
    }

    /// Get a message by platform message ID.
    pub fn get_message(&self, message_id: &str) -> Result<Option<MessageRow>> {
        let conn = self.pool.get()?;
        MessageRepo::get_by_id(&conn, message_id)
    }

    /// Mark a message sent.
    pub fn mark_sent(&self, message_id: &str) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = MessageRepo::mark_sent(&conn, message_id)?;
        Ok(())
    }

    /// Mark a message sent, recording the resolved file name.
    pub fn mark_sent_with_file_name(&self, message_id: &str, file_name: &str) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = MessageRepo::mark_sent_with_file_name(&conn, message_id, file_name)?;
        Ok(())
    }

    /// Mark a message failed.
    pub fn mark_failed(&self, message_id: &str) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = MessageRepo::mark_failed(&conn, message_id)?;
        Ok(())
    }

    /// Mark a batch of messages read with the receipt timestamp. IDs that do
    /// not match a stored row are skipped. Returns the number updated.
    pub fn mark_read(&self, message_ids: &[String], read_at: &str) -> Result<usize> {
        let conn = self.pool.get()?;
        let mut updated = 0;
        for message_id in message_ids {
            if MessageRepo::mark_read(&conn, message_id, read_at)? {
                updated += 1;
            }
        }
        Ok(updated)
    }

    // ── Polls ───────────────────────────────────────────────────────────────

    /// Create a poll with its options in one transaction. Option hashes are
    /// computed by [`NewPollDetail::new`] before any row is written.
    pub fn create_poll(
        &self,
        identity_id: i64,
        question: &str,
        options: &[String],
    ) -> Result<(PollRow, Vec<PollDetailRow>)> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let poll_id = PollId::generate();
        let poll = PollRepo::create(
            &tx,
            &NewPoll {
                id: &poll_id,
                identity_id,
                question,
            },
        )?;
        let mut details = Vec::with_capacity(options.len());
        for option in options {
            let detail = PollRepo::add_detail(&tx, &NewPollDetail::new(poll_id.clone(), option))?;
            details.push(detail);
        }

        tx.commit()?;
        Ok((poll, details))
    }

    /// A poll and its options, scoped to the owning identity.
    pub fn poll_with_details(
        &self,
        poll_id: &str,
        identity_id: i64,
    ) -> Result<(PollRow, Vec<PollDetailRow>)> {
        let conn = self.pool.get()?;
        let poll = PollRepo::get_for_identity(&conn, poll_id, identity_id)?
            .ok_or_else(|| StoreError::PollNotFound(poll_id.to_owned()))?;
        let details = PollRepo::list_details(&conn, poll_id)?;
        Ok((poll, details))
    }

    /// Commit one decrypted poll vote.
    ///
    /// Resolves the poll-creation message, its linked poll, and the option
    /// whose content hash matches, then in a single transaction updates the
    /// message's latest answer and appends a vote audit row. Returns the
    /// audit row, or `Ok(None)` with no rows written when the message is
    /// unknown, carries no poll, or no option hash matches.
    pub fn record_poll_vote(
        &self,
        poll_message_id: &str,
        selected_sha256: &str,
        voted_at: &str,
    ) -> Result<Option<PollHistoryRow>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let Some(message) = MessageRepo::get_by_id(&tx, poll_message_id)? else {
            debug!(message_id = poll_message_id, "vote for unknown message, dropped");
            return Ok(None);
        };
        let Some(poll_id) = message.poll_id.as_deref() else {
            debug!(message_id = poll_message_id, "vote for non-poll message, dropped");
            return Ok(None);
        };
        let Some(detail) = PollRepo::find_detail_by_hash(&tx, poll_id, selected_sha256)? else {
            debug!(
                message_id = poll_message_id,
                poll_id, "vote hash matched no option, dropped"
            );
            return Ok(None);
        };

        let _ = MessageRepo::record_answer(&tx, poll_message_id, &detail.id, voted_at)?;
        let history = PollHistoryRepo::insert(
            &tx,
            &NewPollHistory {
                poll_id,
                identity_id: message.identity_id,
                poll_detail_id: &detail.id,
                message_id: poll_message_id,
                destination: &message.destination,
                answered_at: voted_at,
            },
        )?;

        tx.commit()?;
        Ok(Some(history))
    }

    /// Votes recorded against one poll message, oldest first.
    pub fn vote_history(&self, message_id: &str) -> Result<Vec<PollHistoryRow>> {
        let conn = self.pool.get()?;
        PollHistoryRepo::list_by_message(&conn, message_id)
    }

    /// Register an identity (administration layer and test fixtures).
    pub fn create_identity(&self, new: &NewIdentity<'_>) -> Result<IdentityRow> {
        let conn = self.pool.get()?;
        IdentityRepo::create(&conn, new)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::repositories::poll::hash_option;

    fn setup() -> (Store, i64) {
        let store = Store::in_memory().unwrap();
        let identity = store
            .create_identity(&NewIdentity {
                code: "dev-01",
                name: "Front desk",
                token: "secret-token-0001",
                webhook: None,
                subscriptions: None,
            })
            .unwrap();
        (store, identity.id)
    }

    fn create_poll_message(store: &Store, identity_id: i64, message_id: &str) -> String {
        let (poll, _) = store
            .create_poll(identity_id, "Lunch?", &["Pizza".into(), "Sushi".into()])
            .unwrap();
        store
            .insert_message(&NewMessage {
                message_id,
                identity_id,
                destination: "491700000000",
                body: "Lunch?",
                kind: "poll",
                poll_id: Some(&poll.id),
            })
            .unwrap();
        poll.id
    }

    #[test]
    fn get_identity_missing_is_error() {
        let (store, _) = setup();
        let err = store.get_identity(404).unwrap_err();
        assert!(matches!(err, StoreError::IdentityNotFound(404)));
    }

    #[test]
    fn create_poll_round_trip() {
        let (store, identity_id) = setup();
        let (poll, details) = store
            .create_poll(identity_id, "Lunch?", &["Pizza".into(), "Sushi".into()])
            .unwrap();

        let (found, found_details) = store.poll_with_details(&poll.id, identity_id).unwrap();
        assert_eq!(found.question, "Lunch?");
        assert_eq!(found_details.len(), 2);
        assert_eq!(found_details[0].id, details[0].id);
        assert_eq!(found_details[0].option_sha256, hash_option("Pizza"));
    }

    #[test]
    fn poll_scoped_to_identity() {
        let (store, identity_id) = setup();
        let (poll, _) = store
            .create_poll(identity_id, "Lunch?", &["Pizza".into()])
            .unwrap();
        let err = store.poll_with_details(&poll.id, identity_id + 1).unwrap_err();
        assert!(matches!(err, StoreError::PollNotFound(_)));
    }

    #[test]
    fn mark_read_batch_skips_unknown() {
        let (store, identity_id) = setup();
        store
            .insert_message(&NewMessage {
                message_id: "msg_a",
                identity_id,
                destination: "491700000000",
                body: "hello",
                kind: "text",
                poll_id: None,
            })
            .unwrap();

        let updated = store
            .mark_read(
                &["msg_a".into(), "msg_missing".into()],
                "2026-08-24T12:00:00Z",
            )
            .unwrap();
        assert_eq!(updated, 1);

        let msg = store.get_message("msg_a").unwrap().unwrap();
        assert!(msg.read);
        assert_eq!(msg.read_at.as_deref(), Some("2026-08-24T12:00:00Z"));
    }

    #[test]
    fn vote_commit_updates_message_and_history() {
        let (store, identity_id) = setup();
        create_poll_message(&store, identity_id, "msg_poll");

        let history = store
            .record_poll_vote("msg_poll", &hash_option("Sushi"), "2026-08-24T10:00:00Z")
            .unwrap()
            .unwrap();
        assert_eq!(history.message_id, "msg_poll");
        assert_eq!(history.destination, "491700000000");

        let msg = store.get_message("msg_poll").unwrap().unwrap();
        assert_eq!(msg.poll_detail_id.as_deref(), Some(history.poll_detail_id.as_str()));
        assert_eq!(msg.answered_at.as_deref(), Some("2026-08-24T10:00:00Z"));
    }

    #[test]
    fn vote_with_unmatched_hash_writes_nothing() {
        let (store, identity_id) = setup();
        create_poll_message(&store, identity_id, "msg_poll");

        let result = store
            .record_poll_vote("msg_poll", &hash_option("Burger"), "2026-08-24T10:00:00Z")
            .unwrap();
        assert!(result.is_none());

        let msg = store.get_message("msg_poll").unwrap().unwrap();
        assert!(msg.poll_detail_id.is_none());
        assert!(msg.answered_at.is_none());
        assert!(store.vote_history("msg_poll").unwrap().is_empty());
    }

    #[test]
    fn vote_for_unknown_message_writes_nothing() {
        let (store, _) = setup();
        let result = store
            .record_poll_vote("msg_missing", &hash_option("Pizza"), "2026-08-24T10:00:00Z")
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn vote_for_plain_message_writes_nothing() {
        let (store, identity_id) = setup();
        store
            .insert_message(&NewMessage {
                message_id: "msg_plain",
                identity_id,
                destination: "491700000000",
                body: "hello",
                kind: "text",
                poll_id: None,
            })
            .unwrap();

        let result = store
            .record_poll_vote("msg_plain", &hash_option("Pizza"), "2026-08-24T10:00:00Z")
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn second_vote_overwrites_answer_and_appends_history() {
        let (store, identity_id) = setup();
        create_poll_message(&store, identity_id, "msg_poll");

        store
            .record_poll_vote("msg_poll", &hash_option("Pizza"), "2026-08-24T10:00:00Z")
            .unwrap()
            .unwrap();
        let second = store
            .record_poll_vote("msg_poll", &hash_option("Sushi"), "2026-08-24T10:05:00Z")
            .unwrap()
            .unwrap();

        let msg = store.get_message("msg_poll").unwrap().unwrap();
        assert_eq!(msg.poll_detail_id.as_deref(), Some(second.poll_detail_id.as_str()));
        assert_eq!(msg.answered_at.as_deref(), Some("2026-08-24T10:05:00Z"));

        let history = store.vote_history("msg_poll").unwrap();
        assert_eq!(history.len(), 2);
    }
}
