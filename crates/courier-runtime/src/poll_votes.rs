//! Poll-vote reconciliation.
//!
//! A decrypted vote carries the content hash of the selected option and the
//! ID of the poll-creation message it answers. Reconciliation resolves both
//! against stored rows and commits the message's latest answer together with
//! an append-only audit row in one transaction; votes that resolve to
//! nothing leave the store untouched.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use courier_core::IdentityId;
use courier_provider::DecryptedVote;
use courier_store::{Result as StoreResult, Store};

use courier_store::row_types::PollHistoryRow;

/// Applies decrypted votes to the store.
#[derive(Clone)]
pub struct PollVoteReconciler {
    store: Store,
}

impl PollVoteReconciler {
    /// Build a reconciler over the shared store.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Commit one vote. Returns the audit row, or `None` when the vote did
    /// not resolve to a stored poll message and option (nothing written).
    #[instrument(skip(self, vote), fields(identity_id = %identity_id, message_id = poll_message_id))]
    pub fn reconcile(
        &self,
        identity_id: IdentityId,
        poll_message_id: &str,
        vote: &DecryptedVote,
        voted_at: DateTime<Utc>,
    ) -> StoreResult<Option<PollHistoryRow>> {
        let committed = self.store.record_poll_vote(
            poll_message_id,
            &vote.selected_sha256,
            &voted_at.to_rfc3339(),
        )?;

        match &committed {
            Some(row) => info!(poll_detail_id = %row.poll_detail_id, "vote recorded"),
            None => warn!("vote did not match a stored poll option"),
        }
        Ok(committed)
    }
}
