//! Inbound platform event dispatch.
//!
//! The supervisor drains its identity's event queue through
//! [`EventDispatcher::handle_event`], one event at a time, preserving
//! arrival order for that identity. Persistence failures on individual
//! events are logged with identity context and dropped; only a logout
//! escalates to the supervisor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use courier_core::IdentityId;
use courier_provider::{PlatformClient, PlatformEvent, Presence};
use courier_store::Store;

use crate::poll_votes::PollVoteReconciler;
use crate::registry::SessionHandle;
use crate::supervisor::SessionState;

/// What the supervisor should do after an event was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Keep draining the event queue.
    Continue,
    /// The platform revoked our credentials; terminate with
    /// credential-clearing semantics.
    Logout,
}

/// Handles one identity's inbound platform events.
pub struct EventDispatcher {
    identity_id: IdentityId,
    store: Store,
    client: Arc<dyn PlatformClient>,
    handle: Arc<SessionHandle>,
    reconciler: PollVoteReconciler,
}

impl EventDispatcher {
    /// Build a dispatcher for one session.
    #[must_use]
    pub fn new(store: Store, handle: Arc<SessionHandle>) -> Self {
        Self {
            identity_id: handle.identity_id(),
            client: handle.client(),
            reconciler: PollVoteReconciler::new(store.clone()),
            store,
            handle,
        }
    }

    /// Apply one event's effects.
    #[instrument(skip(self, event), fields(identity_id = %self.identity_id, kind = event.kind()))]
    pub async fn handle_event(&self, event: PlatformEvent) -> DispatchOutcome {
        match event {
            PlatformEvent::Connected => self.on_connected(),
            PlatformEvent::PairSuccess { address } => {
                info!(%address, "pairing completed");
                if let Err(err) = self
                    .store
                    .record_pairing(self.identity_id.get(), &address.to_string())
                {
                    warn!(error = %err, "failed to persist paired address");
                }
            }
            PlatformEvent::ReadReceipt {
                message_ids,
                read_at,
            } => self.on_read_receipt(&message_ids, read_at),
            PlatformEvent::PollVote {
                poll_message_id,
                ciphertext,
                voted_at,
            } => self.on_poll_vote(&poll_message_id, &ciphertext, voted_at).await,
            PlatformEvent::LoggedOut => {
                info!("platform logged us out");
                return DispatchOutcome::Logout;
            }
            PlatformEvent::Unrecognized { kind } => {
                debug!(kind, "ignoring unrecognized platform event");
            }
        }
        DispatchOutcome::Continue
    }

    fn on_connected(&self) {
        if let Err(err) = self.store.set_connected(self.identity_id.get(), true) {
            warn!(error = %err, "failed to persist connected flag");
        }
        self.handle.set_state(SessionState::Active);

        // Presence is best-effort; a failure must not take the session down.
        let client = self.client.clone();
        let identity_id = self.identity_id;
        let _ = tokio::spawn(async move {
            if let Err(err) = client.send_presence(Presence::Available).await {
                warn!(identity_id = %identity_id, error = %err, "presence announcement failed");
            }
        });
    }

    fn on_read_receipt(&self, message_ids: &[String], read_at: DateTime<Utc>) {
        match self.store.mark_read(message_ids, &read_at.to_rfc3339()) {
            Ok(updated) => debug!(receipt_ids = message_ids.len(), updated, "read receipt applied"),
            Err(err) => warn!(error = %err, "failed to apply read receipt"),
        }
    }

    async fn on_poll_vote(
        &self,
        poll_message_id: &str,
        ciphertext: &[u8],
        voted_at: DateTime<Utc>,
    ) {
        let vote = match self.client.decrypt_poll_vote(poll_message_id, ciphertext).await {
            Ok(vote) => vote,
            Err(err) => {
                warn!(message_id = poll_message_id, error = %err, "vote decryption failed");
                return;
            }
        };
        if let Err(err) =
            self.reconciler
                .reconcile(self.identity_id, poll_message_id, &vote, voted_at)
        {
            warn!(message_id = poll_message_id, error = %err, "vote reconciliation failed");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::PlatformAddress;
    use courier_provider::mock::{MockClient, MockScript};
    use courier_provider::DecryptedVote;
    use courier_store::repositories::poll::hash_option;
    use courier_store::repositories::{NewIdentity, NewMessage};

    struct Fixture {
        store: Store,
        dispatcher: EventDispatcher,
        client: Arc<MockClient>,
        handle: Arc<SessionHandle>,
        identity_id: i64,
    }

    fn fixture(script: MockScript) -> Fixture {
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
        let (client, _events) = MockClient::new(script, true);
        let (handle, _terminated_tx) = SessionHandle::new(
            IdentityId::new(identity.id),
            client.clone(),
            tokio_util::sync::CancellationToken::new(),
            None,
        );
        let dispatcher = EventDispatcher::new(store.clone(), handle.clone());
        Fixture {
            store,
            dispatcher,
            client,
            handle,
            identity_id: identity.id,
        }
    }

    #[tokio::test]
    async fn connected_activates_session_and_announces_presence() {
        let fx = fixture(MockScript::default());

        let outcome = fx.dispatcher.handle_event(PlatformEvent::Connected).await;
        assert_eq!(outcome, DispatchOutcome::Continue);
        assert_eq!(fx.handle.state(), SessionState::Active);
        assert!(fx.store.get_identity(fx.identity_id).unwrap().connected);

        // Presence runs on its own task.
        for _ in 0..10 {
            if !fx.client.presences().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(fx.client.presences(), vec![Presence::Available]);
    }

    #[tokio::test]
    async fn pair_success_persists_address() {
        let fx = fixture(MockScript::default());

        let event = PlatformEvent::PairSuccess {
            address: PlatformAddress::new("491700000000"),
        };
        let _ = fx.dispatcher.handle_event(event).await;

        let row = fx.store.get_identity(fx.identity_id).unwrap();
        assert!(row.connected);
        assert!(row
            .platform_address
            .as_deref()
            .unwrap()
            .starts_with("491700000000@"));
        assert!(row.pairing_code.is_none());
    }

    #[tokio::test]
    async fn read_receipt_marks_messages() {
        let fx = fixture(MockScript::default());
        for id in ["msg_a", "msg_b"] {
            let _ = fx
                .store
                .insert_message(&NewMessage {
                    message_id: id,
                    identity_id: fx.identity_id,
                    destination: "491700000000",
                    body: "hello",
                    kind: "text",
                    poll_id: None,
                })
                .unwrap();
        }

        let event = PlatformEvent::ReadReceipt {
            message_ids: vec!["msg_a".into(), "msg_b".into(), "msg_unknown".into()],
            read_at: Utc::now(),
        };
        let outcome = fx.dispatcher.handle_event(event).await;
        assert_eq!(outcome, DispatchOutcome::Continue);

        assert!(fx.store.get_message("msg_a").unwrap().unwrap().read);
        assert!(fx.store.get_message("msg_b").unwrap().unwrap().read);
    }

    #[tokio::test]
    async fn poll_vote_decrypts_and_commits() {
        let fx = fixture(MockScript {
            decrypt: Some(DecryptedVote {
                selected_sha256: hash_option("Pizza"),
            }),
            ..Default::default()
        });
        let (poll, _) = fx
            .store
            .create_poll(fx.identity_id, "Lunch?", &["Pizza".into(), "Sushi".into()])
            .unwrap();
        let _ = fx
            .store
            .insert_message(&NewMessage {
                message_id: "msg_poll",
                identity_id: fx.identity_id,
                destination: "491700000000",
                body: "Lunch?",
                kind: "poll",
                poll_id: Some(&poll.id),
            })
            .unwrap();

        let event = PlatformEvent::PollVote {
            poll_message_id: "msg_poll".into(),
            ciphertext: b"blob".to_vec(),
            voted_at: Utc::now(),
        };
        let _ = fx.dispatcher.handle_event(event).await;

        let message = fx.store.get_message("msg_poll").unwrap().unwrap();
        assert!(message.poll_detail_id.is_some());
        assert_eq!(fx.store.vote_history("msg_poll").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn undecryptable_vote_is_dropped() {
        // No scripted decrypt result, so decryption fails.
        let fx = fixture(MockScript::default());

        let event = PlatformEvent::PollVote {
            poll_message_id: "msg_poll".into(),
            ciphertext: b"blob".to_vec(),
            voted_at: Utc::now(),
        };
        let outcome = fx.dispatcher.handle_event(event).await;
        assert_eq!(outcome, DispatchOutcome::Continue);
    }

    #[tokio::test]
    async fn logged_out_escalates() {
        let fx = fixture(MockScript::default());
        let outcome = fx.dispatcher.handle_event(PlatformEvent::LoggedOut).await;
        assert_eq!(outcome, DispatchOutcome::Logout);
    }

    #[tokio::test]
    async fn unrecognized_event_has_no_effect() {
        let fx = fixture(MockScript::default());
        let outcome = fx
            .dispatcher
            .handle_event(PlatformEvent::Unrecognized {
                kind: "call_offer".into(),
            })
            .await;
        assert_eq!(outcome, DispatchOutcome::Continue);
        assert!(!fx.store.get_identity(fx.identity_id).unwrap().connected);
    }
}
