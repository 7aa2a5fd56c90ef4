//! Scriptable in-process platform client for tests.
//!
//! [`MockClientFactory`] stands in for the real client factory: tests script
//! per-identity behavior up front (pairing event sequence, send failures,
//! the decrypted vote), start the runtime, then inspect what the client
//! recorded and push further [`PlatformEvent`]s to drive the dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use courier_core::{IdentityId, MessageId, PlatformAddress};

use crate::errors::{ProviderError, Result};
use crate::events::{DecryptedVote, PairingEvent, PlatformEvent};
use crate::traits::{ClientFactory, PlatformClient};
use crate::types::{
    ChatPresence, ChatPresenceUpdate, MediaKind, MediaUpload, OutboundPayload, Presence,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Scripted behavior for one mock client, registered before the session
/// starts.
#[derive(Clone, Debug, Default)]
pub struct MockScript {
    /// Events delivered on the pairing stream, in order.
    pub pairing: Vec<PairingEvent>,
    /// Fail `connect` with [`ProviderError::Connect`].
    pub fail_connect: bool,
    /// Fail every `send` with [`ProviderError::Transport`].
    pub fail_sends: bool,
    /// Result of `decrypt_poll_vote`; `None` makes decryption fail.
    pub decrypt: Option<DecryptedVote>,
}

/// One recorded outbound submission.
#[derive(Clone, Debug)]
pub struct RecordedSend {
    /// Caller-generated message ID the payload was tagged with.
    pub message_id: String,
    /// Destination address.
    pub to: PlatformAddress,
    /// Submitted payload.
    pub payload: OutboundPayload,
}

#[derive(Default)]
struct Recorded {
    sends: Vec<RecordedSend>,
    presences: Vec<Presence>,
    chat_presences: Vec<ChatPresenceUpdate>,
}

/// Scriptable platform client.
pub struct MockClient {
    script: Mutex<MockScript>,
    logged_in: AtomicBool,
    connected: AtomicBool,
    recorded: Mutex<Recorded>,
    pairing_tx: Mutex<Option<mpsc::Sender<PairingEvent>>>,
    event_tx: mpsc::Sender<PlatformEvent>,
}

impl MockClient {
    /// Build a client and the event channel it pushes into.
    #[must_use]
    pub fn new(script: MockScript, logged_in: bool) -> (Arc<Self>, mpsc::Receiver<PlatformEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let client = Arc::new(Self {
            script: Mutex::new(script),
            logged_in: AtomicBool::new(logged_in),
            connected: AtomicBool::new(false),
            recorded: Mutex::new(Recorded::default()),
            pairing_tx: Mutex::new(None),
            event_tx,
        });
        (client, event_rx)
    }

    /// Push a platform event, as the real client would from its socket task.
    pub async fn emit(&self, event: PlatformEvent) {
        let _ = self.event_tx.send(event).await;
    }

    /// Push a pairing event onto an already opened pairing stream.
    pub async fn emit_pairing(&self, event: PairingEvent) {
        let tx = self.pairing_tx.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    /// Everything submitted through `send` so far.
    #[must_use]
    pub fn sends(&self) -> Vec<RecordedSend> {
        self.recorded.lock().sends.clone()
    }

    /// Global presence updates, in order.
    #[must_use]
    pub fn presences(&self) -> Vec<Presence> {
        self.recorded.lock().presences.clone()
    }

    /// Chat-presence updates, in order.
    #[must_use]
    pub fn chat_presences(&self) -> Vec<ChatPresenceUpdate> {
        self.recorded.lock().chat_presences.clone()
    }

    /// Flip send failure injection after construction.
    pub fn set_fail_sends(&self, fail: bool) {
        self.script.lock().fail_sends = fail;
    }

    /// Change what `decrypt_poll_vote` resolves to.
    pub fn set_decrypt(&self, vote: Option<DecryptedVote>) {
        self.script.lock().decrypt = vote;
    }
}

#[async_trait::async_trait]
impl PlatformClient for MockClient {
    async fn connect(&self) -> Result<()> {
        if self.script.lock().fail_connect {
            return Err(ProviderError::Connect("scripted connect failure".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn pairing_stream(&self) -> Result<mpsc::Receiver<PairingEvent>> {
        let scripted = std::mem::take(&mut self.script.lock().pairing);
        let (tx, rx) = mpsc::channel(scripted.len().max(1) + EVENT_CHANNEL_CAPACITY);
        for event in scripted {
            let _ = tx.try_send(event);
        }
        // Keep the sender so tests can feed more events later.
        *self.pairing_tx.lock() = Some(tx);
        Ok(rx)
    }

    async fn send(
        &self,
        message_id: &MessageId,
        to: &PlatformAddress,
        payload: &OutboundPayload,
    ) -> Result<()> {
        if self.script.lock().fail_sends {
            return Err(ProviderError::Transport("scripted send failure".into()));
        }
        self.recorded.lock().sends.push(RecordedSend {
            message_id: message_id.as_str().to_owned(),
            to: to.clone(),
            payload: payload.clone(),
        });
        Ok(())
    }

    async fn upload(&self, _kind: MediaKind, bytes: &[u8], mime_type: &str) -> Result<MediaUpload> {
        Ok(MediaUpload {
            reference: format!("mock://upload/{}", bytes.len()),
            mime_type: mime_type.to_owned(),
            size: bytes.len() as u64,
        })
    }

    async fn decrypt_poll_vote(
        &self,
        poll_message_id: &str,
        _ciphertext: &[u8],
    ) -> Result<DecryptedVote> {
        self.script.lock().decrypt.clone().ok_or_else(|| {
            ProviderError::Decrypt(format!("no scripted vote for {poll_message_id}"))
        })
    }

    async fn send_presence(&self, presence: Presence) -> Result<()> {
        self.recorded.lock().presences.push(presence);
        Ok(())
    }

    async fn chat_presence(&self, to: &PlatformAddress, state: ChatPresence) -> Result<()> {
        self.recorded.lock().chat_presences.push(ChatPresenceUpdate {
            to: to.clone(),
            state,
        });
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        *self.pairing_tx.lock() = None;
    }
}

/// Factory handing out [`MockClient`]s, remembering each one so tests can
/// inspect it after the runtime created it.
#[derive(Default)]
pub struct MockClientFactory {
    scripts: DashMap<i64, MockScript>,
    clients: DashMap<i64, Arc<MockClient>>,
}

impl MockClientFactory {
    /// Empty factory; clients get default scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the script a future client for this identity will follow.
    pub fn script(&self, identity_id: IdentityId, script: MockScript) {
        let _ = self.scripts.insert(identity_id.get(), script);
    }

    /// The client created for this identity, if one exists.
    #[must_use]
    pub fn client_for(&self, identity_id: IdentityId) -> Option<Arc<MockClient>> {
        self.clients
            .get(&identity_id.get())
            .map(|c| Arc::clone(c.value()))
    }
}

impl ClientFactory for MockClientFactory {
    fn create(
        &self,
        identity_id: IdentityId,
        known_address: Option<&PlatformAddress>,
    ) -> Result<(Arc<dyn PlatformClient>, mpsc::Receiver<PlatformEvent>)> {
        let script = self
            .scripts
            .get(&identity_id.get())
            .map(|s| s.value().clone())
            .unwrap_or_default();
        let (client, event_rx) = MockClient::new(script, known_address.is_some());
        let _ = self.clients.insert(identity_id.get(), client.clone());
        Ok((client, event_rx))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
