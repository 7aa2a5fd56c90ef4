//! Per-identity session supervisor.
//!
//! One supervisor task per live session. It owns the platform client,
//! drives startup (direct connect for stored credentials, QR pairing for a
//! fresh identity), then drains the inbound event queue until a terminal
//! condition: an explicit stop, a pairing timeout, a platform logout, or
//! global shutdown. All mutations of the identity's row are funneled
//! through this one task.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use courier_core::IdentityId;
use courier_provider::{PlatformClient, PlatformEvent};
use courier_store::Store;

use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::pairing::{PairingController, PairingOutcome};
use crate::registry::{SessionHandle, SessionRegistry};

/// Lifecycle state of one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, supervisor not yet running.
    Created,
    /// Establishing the platform connection.
    Connecting,
    /// Fresh identity, waiting for a QR scan.
    AwaitingPairing,
    /// Credentials in place, waiting for the connection-up event.
    Paired,
    /// Connected and serving.
    Active,
    /// Tearing down.
    Terminating,
    /// Done; the registry entry is gone.
    Terminated,
}

/// Drives one session from startup to termination.
pub struct SessionSupervisor {
    identity_id: IdentityId,
    store: Store,
    registry: Arc<SessionRegistry>,
    handle: Arc<SessionHandle>,
    client: Arc<dyn PlatformClient>,
    events: mpsc::Receiver<PlatformEvent>,
    terminated_tx: watch::Sender<bool>,
}

impl SessionSupervisor {
    /// Build a supervisor for an already registered session handle.
    #[must_use]
    pub fn new(
        store: Store,
        registry: Arc<SessionRegistry>,
        handle: Arc<SessionHandle>,
        events: mpsc::Receiver<PlatformEvent>,
        terminated_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            identity_id: handle.identity_id(),
            client: handle.client(),
            store,
            registry,
            handle,
            events,
            terminated_tx,
        }
    }

    /// Run the session to completion.
    #[instrument(skip(self), fields(identity_id = %self.identity_id))]
    pub async fn run(mut self) {
        let cancel = self.handle.cancel_token();
        self.handle.set_state(SessionState::Connecting);

        let started = if self.client.is_logged_in() {
            self.connect_known().await
        } else {
            self.connect_fresh(&cancel).await
        };

        let logout = if started {
            self.event_loop(&cancel).await
        } else {
            false
        };
        self.terminate(logout).await;
    }

    /// Stored credentials: connect directly; the connection-up event moves
    /// the session to Active.
    async fn connect_known(&self) -> bool {
        match self.client.connect().await {
            Ok(()) => {
                self.handle.set_state(SessionState::Paired);
                true
            }
            Err(err) => {
                error!(error = %err, "connect failed");
                false
            }
        }
    }

    /// Fresh identity: open the pairing stream, connect, then wait for the
    /// pairing outcome.
    async fn connect_fresh(&self, cancel: &CancellationToken) -> bool {
        let stream = match self.client.pairing_stream().await {
            Ok(stream) => stream,
            Err(err) => {
                error!(error = %err, "could not open pairing stream");
                return false;
            }
        };
        if let Err(err) = self.client.connect().await {
            error!(error = %err, "connect failed");
            return false;
        }
        self.handle.set_state(SessionState::AwaitingPairing);

        let controller =
            PairingController::new(self.identity_id, self.store.clone(), stream, cancel.clone());
        match controller.run().await {
            PairingOutcome::Success => {
                self.handle.set_state(SessionState::Paired);
                true
            }
            PairingOutcome::TimedOut => {
                info!("pairing window elapsed");
                false
            }
            PairingOutcome::Cancelled => false,
            PairingOutcome::StreamClosed => {
                warn!("pairing stream closed without outcome");
                false
            }
        }
    }

    /// Drain inbound events in arrival order until a terminal condition.
    /// Returns whether termination carries credential-clearing semantics.
    async fn event_loop(&mut self, cancel: &CancellationToken) -> bool {
        let dispatcher = EventDispatcher::new(self.store.clone(), self.handle.clone());
        loop {
            tokio::select! {
                () = cancel.cancelled() => return false,
                event = self.events.recv() => match event {
                    None => {
                        debug!("event channel closed by client");
                        return false;
                    }
                    Some(event) => {
                        if dispatcher.handle_event(event).await == DispatchOutcome::Logout {
                            return true;
                        }
                    }
                },
            }
        }
    }

    /// Tear the session down: cancel, disconnect, clean the identity row,
    /// drop the registry entry, signal Terminated.
    async fn terminate(self, logout: bool) {
        self.handle.set_state(SessionState::Terminating);
        self.handle.cancel_token().cancel();
        self.client.disconnect().await;

        if let Err(err) = self.store.clear_pairing_code(self.identity_id.get()) {
            warn!(error = %err, "failed to clear pairing code");
        }
        if let Err(err) = self.store.set_connected(self.identity_id.get(), false) {
            warn!(error = %err, "failed to clear connected flag");
        }
        if logout {
            if let Err(err) = self.store.clear_platform_address(self.identity_id.get()) {
                warn!(error = %err, "failed to clear platform address");
            }
        }

        let _ = self.registry.remove(self.identity_id);
        self.handle.set_state(SessionState::Terminated);
        let _ = self.terminated_tx.send(true);
        info!(logout, "session terminated");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
