//! Session registry — the shared map of live sessions.
//!
//! One entry per identity with a running supervisor. Request tasks look
//! sessions up here; supervisors remove their own entry on termination.
//! Insert and remove are atomic map operations, so concurrent `start`/`stop`
//! calls never observe a half-constructed entry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use courier_core::IdentityId;
use courier_provider::PlatformClient;

use crate::outbound::SendJob;
use crate::supervisor::SessionState;

/// Shared state of one live session, held in the registry and by the
/// session's supervisor task.
pub struct SessionHandle {
    identity_id: IdentityId,
    client: Arc<dyn PlatformClient>,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
    terminated_rx: watch::Receiver<bool>,
    outbound_tx: Option<mpsc::Sender<SendJob>>,
}

impl SessionHandle {
    /// Build a handle around the session's cancellation token. Returns the
    /// handle together with the sender the supervisor flips when it reaches
    /// `Terminated`.
    #[must_use]
    pub fn new(
        identity_id: IdentityId,
        client: Arc<dyn PlatformClient>,
        cancel: CancellationToken,
        outbound_tx: Option<mpsc::Sender<SendJob>>,
    ) -> (Arc<Self>, watch::Sender<bool>) {
        let (terminated_tx, terminated_rx) = watch::channel(false);
        let handle = Arc::new(Self {
            identity_id,
            client,
            state: Mutex::new(SessionState::Created),
            cancel,
            terminated_rx,
            outbound_tx,
        });
        (handle, terminated_tx)
    }

    /// The identity this session belongs to.
    #[must_use]
    pub fn identity_id(&self) -> IdentityId {
        self.identity_id
    }

    /// The platform client owned by this session.
    #[must_use]
    pub fn client(&self) -> Arc<dyn PlatformClient> {
        self.client.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Record a lifecycle transition. Supervisor-only.
    pub fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    /// Whether the session is fully connected and serving.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Signal termination. Level-triggered and idempotent; a signal issued
    /// mid-startup is honored once startup completes.
    pub fn signal_stop(&self) {
        self.cancel.cancel();
    }

    /// The session's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A receiver that turns `true` when the supervisor has terminated.
    #[must_use]
    pub fn terminated(&self) -> watch::Receiver<bool> {
        self.terminated_rx.clone()
    }

    /// The serialized outbound queue, when configured.
    #[must_use]
    pub fn outbound_tx(&self) -> Option<&mpsc::Sender<SendJob>> {
        self.outbound_tx.as_ref()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("identity_id", &self.identity_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Map of live sessions, keyed by identity ID.
///
/// Plain shared object, constructed by the gateway and injected wherever a
/// lookup is needed; independent registries coexist under test.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<i64, Arc<SessionHandle>>,
}

impl SessionRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session. Returns `false` without replacing anything if the
    /// identity already has an entry.
    #[instrument(skip_all, fields(identity_id = %handle.identity_id()))]
    pub fn insert(&self, handle: Arc<SessionHandle>) -> bool {
        match self.sessions.entry(handle.identity_id().get()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let _ = slot.insert(handle);
                true
            }
        }
    }

    /// Remove a session entry. Returns the handle if one was present.
    pub fn remove(&self, identity_id: IdentityId) -> Option<Arc<SessionHandle>> {
        self.sessions.remove(&identity_id.get()).map(|(_, h)| h)
    }

    /// Look up a session.
    #[must_use]
    pub fn get(&self, identity_id: IdentityId) -> Option<Arc<SessionHandle>> {
        self.sessions
            .get(&identity_id.get())
            .map(|h| Arc::clone(h.value()))
    }

    /// Whether an entry exists for this identity.
    #[must_use]
    pub fn contains(&self, identity_id: IdentityId) -> bool {
        self.sessions.contains_key(&identity_id.get())
    }

    /// Snapshot of all live handles.
    #[must_use]
    pub fn handles(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions
            .iter()
            .map(|h| Arc::clone(h.value()))
            .collect()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
