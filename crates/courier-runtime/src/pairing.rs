//! QR pairing sub-protocol.
//!
//! While an identity awaits its first pairing, the provider streams pairing
//! events: fresh codes (each superseding the last), a success, or a timeout.
//! The first terminal event decides the outcome; the stream receiver is
//! dropped when this loop returns, so a late terminal event sitting in the
//! channel is never read.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use courier_core::IdentityId;
use courier_provider::PairingEvent;
use courier_store::Store;

/// How a pairing attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairingOutcome {
    /// The user scanned a code; the session can proceed.
    Success,
    /// The pairing window elapsed. The session terminates.
    TimedOut,
    /// The session was stopped while awaiting pairing.
    Cancelled,
    /// The provider closed the stream without a terminal event.
    StreamClosed,
}

/// Drives one pairing attempt for one identity.
pub struct PairingController {
    identity_id: IdentityId,
    store: Store,
    stream: mpsc::Receiver<PairingEvent>,
    cancel: CancellationToken,
}

impl PairingController {
    /// Build a controller over an open pairing stream.
    #[must_use]
    pub fn new(
        identity_id: IdentityId,
        store: Store,
        stream: mpsc::Receiver<PairingEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            identity_id,
            store,
            stream,
            cancel,
        }
    }

    /// Consume pairing events until a terminal outcome.
    ///
    /// Each code overwrites the identity's transient pairing code
    /// (last-code-wins, no queue). On any outcome the code is cleared; the
    /// caller handles the lifecycle consequences.
    #[instrument(skip(self), fields(identity_id = %self.identity_id))]
    pub async fn run(mut self) -> PairingOutcome {
        let outcome = loop {
            tokio::select! {
                () = self.cancel.cancelled() => break PairingOutcome::Cancelled,
                event = self.stream.recv() => match event {
                    None => break PairingOutcome::StreamClosed,
                    Some(PairingEvent::Code(code)) => {
                        debug!("pairing code issued");
                        if let Err(err) =
                            self.store.set_pairing_code(self.identity_id.get(), &code)
                        {
                            warn!(error = %err, "failed to persist pairing code");
                        }
                    }
                    Some(PairingEvent::Success) => break PairingOutcome::Success,
                    Some(PairingEvent::Timeout) => break PairingOutcome::TimedOut,
                    Some(PairingEvent::Other(kind)) => {
                        debug!(kind, "ignoring non-terminal pairing event");
                    }
                },
            }
        };

        if let Err(err) = self.store.clear_pairing_code(self.identity_id.get()) {
            warn!(error = %err, "failed to clear pairing code");
        }
        debug!(?outcome, "pairing finished");
        outcome
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use courier_store::repositories::NewIdentity;

    fn fixture() -> (Store, IdentityId) {
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
        (store, IdentityId::new(identity.id))
    }

    fn controller(
        store: &Store,
        identity_id: IdentityId,
    ) -> (PairingController, mpsc::Sender<PairingEvent>, CancellationToken) {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let ctl = PairingController::new(identity_id, store.clone(), rx, cancel.clone());
        (ctl, tx, cancel)
    }

    #[tokio::test]
    async fn codes_overwrite_then_timeout_clears() {
        let (store, identity_id) = fixture();
        let (ctl, tx, _cancel) = controller(&store, identity_id);

        tx.send(PairingEvent::Code("AAAA".into())).await.unwrap();
        tx.send(PairingEvent::Code("BBBB".into())).await.unwrap();
        tx.send(PairingEvent::Timeout).await.unwrap();

        assert_eq!(ctl.run().await, PairingOutcome::TimedOut);
        let row = store.get_identity(identity_id.get()).unwrap();
        assert!(row.pairing_code.is_none());
    }

    #[tokio::test]
    async fn success_wins_and_clears_code() {
        let (store, identity_id) = fixture();
        let (ctl, tx, _cancel) = controller(&store, identity_id);

        tx.send(PairingEvent::Code("AAAA".into())).await.unwrap();
        tx.send(PairingEvent::Success).await.unwrap();

        assert_eq!(ctl.run().await, PairingOutcome::Success);
        let row = store.get_identity(identity_id.get()).unwrap();
        assert!(row.pairing_code.is_none());
    }

    #[tokio::test]
    async fn first_terminal_event_wins() {
        let (store, identity_id) = fixture();
        let (ctl, tx, _cancel) = controller(&store, identity_id);

        // Both terminals queued; only the first is ever read.
        tx.send(PairingEvent::Timeout).await.unwrap();
        tx.send(PairingEvent::Success).await.unwrap();

        assert_eq!(ctl.run().await, PairingOutcome::TimedOut);
    }

    #[tokio::test]
    async fn non_terminal_events_are_ignored() {
        let (store, identity_id) = fixture();
        let (ctl, tx, _cancel) = controller(&store, identity_id);

        tx.send(PairingEvent::Other("key_rotation".into())).await.unwrap();
        tx.send(PairingEvent::Success).await.unwrap();

        assert_eq!(ctl.run().await, PairingOutcome::Success);
    }

    #[tokio::test]
    async fn cancellation_interrupts_waiting() {
        let (store, identity_id) = fixture();
        let (ctl, _tx, cancel) = controller(&store, identity_id);

        cancel.cancel();
        assert_eq!(ctl.run().await, PairingOutcome::Cancelled);
    }

    #[tokio::test]
    async fn closed_stream_reported() {
        let (store, identity_id) = fixture();
        let (ctl, tx, _cancel) = controller(&store, identity_id);
        drop(tx);

        assert_eq!(ctl.run().await, PairingOutcome::StreamClosed);
    }
}
