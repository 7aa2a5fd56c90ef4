//! The gateway facade exposed to the API layer.
//!
//! All operations are callable from request tasks: `start` registers the
//! session and returns before pairing or connecting finishes, `stop` only
//! signals, and the send operations return the generated message ID as soon
//! as the pending row is persisted.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use courier_core::{IdentityId, MessageId, PlatformAddress};
use courier_provider::ClientFactory;
use courier_store::{Store, StoreError};

use crate::config::GatewayConfig;
use crate::errors::{GatewayError, Result};
use crate::outbound::{spawn_outbound_worker, OutboundDispatcher};
use crate::registry::{SessionHandle, SessionRegistry};
use crate::shutdown::ShutdownCoordinator;
use crate::supervisor::SessionSupervisor;

/// The session-supervision gateway.
pub struct Gateway {
    store: Store,
    registry: Arc<SessionRegistry>,
    factory: Arc<dyn ClientFactory>,
    config: GatewayConfig,
    outbound: OutboundDispatcher,
}

impl Gateway {
    /// Build a gateway with its own registry.
    #[must_use]
    pub fn new(store: Store, factory: Arc<dyn ClientFactory>, config: GatewayConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let outbound = OutboundDispatcher::new(store.clone(), registry.clone(), config.clone());
        Self {
            store,
            registry,
            factory,
            config,
            outbound,
        }
    }

    /// The registry backing this gateway.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Start a session for a registered identity. Returns `Ok(false)` as a
    /// no-op when a session already exists; otherwise spawns the supervisor
    /// and returns `Ok(true)` without waiting for pairing or connect.
    #[instrument(skip(self), fields(identity_id = %identity_id))]
    pub fn start(&self, identity_id: IdentityId) -> Result<bool> {
        if self.registry.contains(identity_id) {
            return Ok(false);
        }

        let row = self
            .store
            .get_identity(identity_id.get())
            .map_err(|err| match err {
                StoreError::IdentityNotFound(id) => GatewayError::IdentityNotFound(id),
                other => GatewayError::Persistence(other),
            })?;
        let known_address = row
            .platform_address
            .as_deref()
            .map(PlatformAddress::parse)
            .transpose()?;

        let (client, events) = self.factory.create(identity_id, known_address.as_ref())?;
        let cancel = CancellationToken::new();
        let outbound_tx = self.config.serialize_sends.then(|| {
            spawn_outbound_worker(self.config.outbound_queue_capacity, cancel.clone())
        });
        let (handle, terminated_tx) = SessionHandle::new(identity_id, client, cancel, outbound_tx);

        if !self.registry.insert(handle.clone()) {
            // Lost the race against a concurrent start for the same identity.
            return Ok(false);
        }

        let supervisor = SessionSupervisor::new(
            self.store.clone(),
            self.registry.clone(),
            handle,
            events,
            terminated_tx,
        );
        let _ = tokio::spawn(supervisor.run());
        info!("session started");
        Ok(true)
    }

    /// Signal a session to terminate. No-op (`false`) when none exists.
    #[instrument(skip(self), fields(identity_id = %identity_id))]
    pub fn stop(&self, identity_id: IdentityId) -> bool {
        match self.registry.get(identity_id) {
            Some(handle) => {
                handle.signal_stop();
                true
            }
            None => false,
        }
    }

    /// Signal a session to terminate and wait, bounded, until its supervisor
    /// finishes. Returns whether the session reached `Terminated` in time.
    pub async fn stop_and_wait(&self, identity_id: IdentityId, timeout: Duration) -> bool {
        let Some(handle) = self.registry.get(identity_id) else {
            return false;
        };
        handle.signal_stop();
        let mut terminated = handle.terminated();
        let result = tokio::time::timeout(timeout, terminated.wait_for(|done| *done)).await;
        matches!(result, Ok(Ok(_)))
    }

    /// Whether the identity currently holds a fully connected session.
    #[must_use]
    pub fn is_active(&self, identity_id: IdentityId) -> bool {
        self.registry
            .get(identity_id)
            .is_some_and(|handle| handle.is_active())
    }

    /// Send a plain text message. Returns the generated message ID
    /// immediately; delivery state lands on the message row.
    pub async fn send_text(
        &self,
        identity_id: IdentityId,
        destination: &str,
        body: &str,
    ) -> Result<MessageId> {
        self.outbound.send_text(identity_id, destination, body).await
    }

    /// Send an image from inline data-URL content.
    pub async fn send_image(
        &self,
        identity_id: IdentityId,
        destination: &str,
        content: &str,
        caption: &str,
    ) -> Result<MessageId> {
        self.outbound
            .send_image(identity_id, destination, content, caption)
            .await
    }

    /// Send a file/document from inline data-URL content.
    pub async fn send_file(
        &self,
        identity_id: IdentityId,
        destination: &str,
        content: &str,
        caption: &str,
    ) -> Result<MessageId> {
        self.outbound
            .send_file(identity_id, destination, content, caption)
            .await
    }

    /// Send an administered poll owned by the identity.
    pub async fn send_poll(
        &self,
        identity_id: IdentityId,
        destination: &str,
        poll_id: &str,
    ) -> Result<MessageId> {
        self.outbound
            .send_poll(identity_id, destination, poll_id)
            .await
    }

    /// Restart sessions for every identity still marked connected, as done
    /// once at process startup. Returns how many sessions were started; the
    /// first identity that fails to start aborts the sweep.
    #[instrument(skip(self))]
    pub fn connect_on_startup(&self) -> Result<usize> {
        let rows = self.store.connected_identities()?;
        let mut started = 0;
        for row in rows {
            match self.start(IdentityId::new(row.id)) {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(err) => {
                    return Err(GatewayError::FatalStartup {
                        identity_id: row.id,
                        message: err.to_string(),
                    })
                }
            }
        }
        info!(started, "startup reconnect sweep finished");
        Ok(started)
    }

    /// Terminate every session, bounded by the configured shutdown timeout.
    /// Returns how many sessions drained in time.
    pub async fn shutdown(&self) -> usize {
        let coordinator = ShutdownCoordinator::new(
            self.registry.clone(),
            Duration::from_secs(self.config.shutdown_timeout_secs),
        );
        coordinator.shutdown().await
    }
}
