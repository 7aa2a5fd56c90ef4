//! Outbound send pipeline.
//!
//! Every send persists a pending message row synchronously and returns the
//! generated message ID; transmission happens on a background unit of work
//! (its own task, or the identity's serialized queue when
//! `serialize_sends` is on). Delivery state is observable only through the
//! row's sent/failed flags.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::future::BoxFuture;
use futures::FutureExt as _;
use rand::Rng as _;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use courier_core::{IdentityId, MessageId, PlatformAddress, SendKind};
use courier_provider::{ChatPresence, MediaKind, OutboundPayload, PlatformClient};
use courier_store::repositories::NewMessage;
use courier_store::{Store, StoreError};

use crate::config::GatewayConfig;
use crate::errors::{GatewayError, Result};
use crate::registry::{SessionHandle, SessionRegistry};

/// One queued transmission, ready to await.
pub type SendJob = BoxFuture<'static, ()>;

/// Spawn the per-identity worker that drains a serialized outbound queue in
/// submission order. Stops when the session is cancelled or the queue closes.
#[must_use]
pub fn spawn_outbound_worker(capacity: usize, cancel: CancellationToken) -> mpsc::Sender<SendJob> {
    let (tx, mut rx) = mpsc::channel::<SendJob>(capacity);
    let _ = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job.await,
                    None => break,
                },
            }
        }
    });
    tx
}

/// What the background transmission still has to resolve before submitting.
enum TransmitWork {
    /// Payload is complete.
    Ready(OutboundPayload),
    /// Media bytes must be uploaded first.
    Upload {
        kind: MediaKind,
        bytes: Vec<u8>,
        mime_type: String,
        caption: String,
        /// Resolved file name, persisted on success (documents only).
        file_name: Option<String>,
    },
}

/// Entry point for all outbound sends.
#[derive(Clone)]
pub struct OutboundDispatcher {
    store: Store,
    registry: Arc<SessionRegistry>,
    config: GatewayConfig,
}

impl OutboundDispatcher {
    /// Build a dispatcher over the shared registry and store.
    #[must_use]
    pub fn new(store: Store, registry: Arc<SessionRegistry>, config: GatewayConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Send a plain text message.
    #[instrument(skip(self, body), fields(identity_id = %identity_id))]
    pub async fn send_text(
        &self,
        identity_id: IdentityId,
        destination: &str,
        body: &str,
    ) -> Result<MessageId> {
        let handle = self.active_handle(identity_id)?;
        let to = PlatformAddress::parse(destination)?;

        let message_id = self.persist_pending(identity_id, &to, body, SendKind::Text, None)?;
        let work = TransmitWork::Ready(OutboundPayload::Text { body: body.to_owned() });
        self.dispatch(&handle, message_id.clone(), to, work).await;
        Ok(message_id)
    }

    /// Send an image from inline data-URL content, with a caption.
    #[instrument(skip(self, content, caption), fields(identity_id = %identity_id))]
    pub async fn send_image(
        &self,
        identity_id: IdentityId,
        destination: &str,
        content: &str,
        caption: &str,
    ) -> Result<MessageId> {
        let handle = self.active_handle(identity_id)?;
        let to = PlatformAddress::parse(destination)?;
        let (bytes, mime_type) = decode_inline_content(content)?;

        let message_id = self.persist_pending(identity_id, &to, caption, SendKind::Image, None)?;
        let work = TransmitWork::Upload {
            kind: MediaKind::Image,
            bytes,
            mime_type,
            caption: caption.to_owned(),
            file_name: None,
        };
        self.dispatch(&handle, message_id.clone(), to, work).await;
        Ok(message_id)
    }

    /// Send a file/document from inline data-URL content. The file name is
    /// resolved from the detected content type and persisted on success.
    #[instrument(skip(self, content, caption), fields(identity_id = %identity_id))]
    pub async fn send_file(
        &self,
        identity_id: IdentityId,
        destination: &str,
        content: &str,
        caption: &str,
    ) -> Result<MessageId> {
        let handle = self.active_handle(identity_id)?;
        let to = PlatformAddress::parse(destination)?;
        let (bytes, mime_type) = decode_inline_content(content)?;
        let file_name = format!("file.{}", extension_for(&mime_type));

        let message_id = self.persist_pending(identity_id, &to, caption, SendKind::File, None)?;
        let work = TransmitWork::Upload {
            kind: MediaKind::Document,
            bytes,
            mime_type,
            caption: caption.to_owned(),
            file_name: Some(file_name),
        };
        self.dispatch(&handle, message_id.clone(), to, work).await;
        Ok(message_id)
    }

    /// Send an administered poll. The poll must already exist for this
    /// identity; the option list is rebuilt from its stored rows, ascending
    /// by option text.
    #[instrument(skip(self), fields(identity_id = %identity_id, poll_id))]
    pub async fn send_poll(
        &self,
        identity_id: IdentityId,
        destination: &str,
        poll_id: &str,
    ) -> Result<MessageId> {
        let handle = self.active_handle(identity_id)?;
        let to = PlatformAddress::parse(destination)?;

        let (poll, details) = self
            .store
            .poll_with_details(poll_id, identity_id.get())
            .map_err(|err| match err {
                StoreError::PollNotFound(id) => GatewayError::PollNotFound(id),
                other => GatewayError::Persistence(other),
            })?;
        let mut options: Vec<String> = details.into_iter().map(|d| d.option_text).collect();
        options.sort();

        let message_id =
            self.persist_pending(identity_id, &to, &poll.question, SendKind::Poll, Some(&poll.id))?;
        let payload = OutboundPayload::Poll {
            question: poll.question,
            options,
        };
        self.dispatch(&handle, message_id.clone(), to, TransmitWork::Ready(payload))
            .await;
        Ok(message_id)
    }

    fn active_handle(&self, identity_id: IdentityId) -> Result<Arc<SessionHandle>> {
        self.registry
            .get(identity_id)
            .filter(|handle| handle.is_active())
            .ok_or(GatewayError::NotConnected(identity_id.get()))
    }

    fn persist_pending(
        &self,
        identity_id: IdentityId,
        to: &PlatformAddress,
        body: &str,
        kind: SendKind,
        poll_id: Option<&str>,
    ) -> Result<MessageId> {
        let message_id = MessageId::generate();
        let _ = self.store.insert_message(&NewMessage {
            message_id: message_id.as_str(),
            identity_id: identity_id.get(),
            destination: to.bare(),
            body,
            kind: kind.as_str(),
            poll_id,
        })?;
        Ok(message_id)
    }

    /// Hand the transmission to its background unit of work: the identity's
    /// serialized queue when configured, otherwise a task of its own.
    async fn dispatch(
        &self,
        handle: &Arc<SessionHandle>,
        message_id: MessageId,
        to: PlatformAddress,
        work: TransmitWork,
    ) {
        let job = transmit(
            self.store.clone(),
            handle.client(),
            self.config.clone(),
            message_id,
            to,
            work,
        )
        .boxed();

        if let Some(tx) = handle.outbound_tx() {
            if let Err(rejected) = tx.send(job).await {
                // Queue already closed by termination; run detached so the
                // row still ends in a terminal flag.
                let _ = tokio::spawn(rejected.0);
            }
        } else {
            let _ = tokio::spawn(job);
        }
    }
}

/// The background transmission: typing presence, human-like delay, optional
/// upload, submit, flag update.
async fn transmit(
    store: Store,
    client: Arc<dyn PlatformClient>,
    config: GatewayConfig,
    message_id: MessageId,
    to: PlatformAddress,
    work: TransmitWork,
) {
    if config.send_typing_presence {
        if let Err(err) = client.chat_presence(&to, ChatPresence::Composing).await {
            debug!(message_id = %message_id, error = %err, "typing presence failed");
        }
    }
    let delay_ms = if config.typing_delay_max_ms > config.typing_delay_min_ms {
        rand::rng().random_range(config.typing_delay_min_ms..=config.typing_delay_max_ms)
    } else {
        config.typing_delay_min_ms
    };
    if delay_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
    }
    if config.send_typing_presence {
        if let Err(err) = client.chat_presence(&to, ChatPresence::Paused).await {
            debug!(message_id = %message_id, error = %err, "typing presence failed");
        }
    }

    let (payload, file_name) = match work {
        TransmitWork::Ready(payload) => (payload, None),
        TransmitWork::Upload {
            kind,
            bytes,
            mime_type,
            caption,
            file_name,
        } => match client.upload(kind, &bytes, &mime_type).await {
            Ok(upload) => (
                OutboundPayload::Media {
                    kind,
                    upload,
                    caption,
                    file_name: file_name.clone(),
                },
                file_name,
            ),
            Err(err) => {
                warn!(message_id = %message_id, error = %err, "media upload failed");
                mark_failed(&store, &message_id);
                return;
            }
        },
    };

    match client.send(&message_id, &to, &payload).await {
        Ok(()) => {
            let result = match &file_name {
                Some(name) => store.mark_sent_with_file_name(message_id.as_str(), name),
                None => store.mark_sent(message_id.as_str()),
            };
            if let Err(err) = result {
                warn!(message_id = %message_id, error = %err, "failed to persist sent flag");
            }
        }
        Err(err) => {
            warn!(message_id = %message_id, error = %err, "transmission failed");
            mark_failed(&store, &message_id);
        }
    }
}

fn mark_failed(store: &Store, message_id: &MessageId) {
    if let Err(err) = store.mark_failed(message_id.as_str()) {
        warn!(message_id = %message_id, error = %err, "failed to persist failed flag");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inline media content
// ─────────────────────────────────────────────────────────────────────────────

/// Decode inline media content and detect its MIME type.
///
/// Accepts a `data:<mime>;base64,<payload>` URL or bare base64. The type is
/// detected from magic bytes; the data-URL header is a fallback for content
/// the sniffer does not know.
pub fn decode_inline_content(content: &str) -> Result<(Vec<u8>, String)> {
    let (header_mime, payload) = match content.strip_prefix("data:") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((mime, payload)) => (Some(mime), payload),
            None => {
                return Err(GatewayError::InvalidMedia(
                    "data URL is not base64-encoded".into(),
                ))
            }
        },
        None => (None, content),
    };

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|err| GatewayError::InvalidMedia(format!("base64 decode failed: {err}")))?;
    if bytes.is_empty() {
        return Err(GatewayError::InvalidMedia("content is empty".into()));
    }

    let mime_type = sniff_mime(&bytes)
        .or(header_mime)
        .unwrap_or("application/octet-stream")
        .to_owned();
    Ok((bytes, mime_type))
}

/// Detect a MIME type from magic bytes.
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        Some("application/zip")
    } else if bytes.starts_with(b"OggS") {
        Some("audio/ogg")
    } else if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        Some("video/mp4")
    } else {
        None
    }
}

/// File extension for a detected MIME type.
fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "audio/ogg" => "ogg",
        "video/mp4" => "mp4",
        _ => "bin",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    use courier_provider::mock::{MockClient, MockScript};
    use courier_store::repositories::NewIdentity;

    use crate::supervisor::SessionState;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00];

    fn png_data_url() -> String {
        format!("data:image/png;base64,{}", BASE64.encode(PNG_MAGIC))
    }

    struct Fixture {
        store: Store,
        dispatcher: OutboundDispatcher,
        client: Arc<MockClient>,
        identity_id: IdentityId,
    }

    fn fixture(config: GatewayConfig) -> Fixture {
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
        let identity_id = IdentityId::new(identity.id);

        let registry = Arc::new(SessionRegistry::new());
        let (client, _events) = MockClient::new(MockScript::default(), true);
        let cancel = CancellationToken::new();
        let outbound_tx = config.serialize_sends.then(|| {
            spawn_outbound_worker(config.outbound_queue_capacity, cancel.clone())
        });
        let (handle, _terminated_tx) =
            SessionHandle::new(identity_id, client.clone(), cancel, outbound_tx);
        handle.set_state(SessionState::Active);
        assert!(registry.insert(handle));

        let dispatcher = OutboundDispatcher::new(store.clone(), registry, config);
        Fixture {
            store,
            dispatcher,
            client,
            identity_id,
        }
    }

    async fn wait_for_flags(store: &Store, message_id: &MessageId) -> (bool, bool) {
        for _ in 0..200 {
            let row = store.get_message(message_id.as_str()).unwrap().unwrap();
            if row.sent || row.failed {
                return (row.sent, row.failed);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("message never reached a terminal flag");
    }

    #[tokio::test]
    async fn text_send_persists_then_transmits() {
        let fx = fixture(GatewayConfig::for_tests());

        let message_id = fx
            .dispatcher
            .send_text(fx.identity_id, "+491700000000", "hello")
            .await
            .unwrap();

        let row = fx.store.get_message(message_id.as_str()).unwrap().unwrap();
        assert_eq!(row.destination, "491700000000");
        assert_eq!(row.kind, "text");

        let (sent, failed) = wait_for_flags(&fx.store, &message_id).await;
        assert!(sent);
        assert!(!failed);
        assert_eq!(fx.client.sends()[0].message_id, message_id.as_str());
    }

    #[tokio::test]
    async fn failed_transmission_flags_failed_only() {
        let fx = fixture(GatewayConfig::for_tests());
        fx.client.set_fail_sends(true);

        let message_id = fx
            .dispatcher
            .send_text(fx.identity_id, "491700000000", "hello")
            .await
            .unwrap();

        let (sent, failed) = wait_for_flags(&fx.store, &message_id).await;
        assert!(!sent);
        assert!(failed);
    }

    #[tokio::test]
    async fn send_without_active_session_fails_fast() {
        let fx = fixture(GatewayConfig::for_tests());
        let other = IdentityId::new(fx.identity_id.get() + 1);
        let err = fx
            .dispatcher
            .send_text(other, "491700000000", "hello")
            .await
            .unwrap_err();
        assert_matches!(err, GatewayError::NotConnected(_));
    }

    #[tokio::test]
    async fn image_send_uploads_and_sends() {
        let fx = fixture(GatewayConfig::for_tests());

        let message_id = fx
            .dispatcher
            .send_image(fx.identity_id, "491700000000", &png_data_url(), "a photo")
            .await
            .unwrap();

        let (sent, _) = wait_for_flags(&fx.store, &message_id).await;
        assert!(sent);
        let sends = fx.client.sends();
        assert_matches!(
            &sends[0].payload,
            OutboundPayload::Media { kind: MediaKind::Image, upload, .. }
                if upload.mime_type == "image/png"
        );
    }

    #[tokio::test]
    async fn file_send_resolves_file_name() {
        let fx = fixture(GatewayConfig::for_tests());
        let pdf = format!("data:application/pdf;base64,{}", BASE64.encode(b"%PDF-1.7 x"));

        let message_id = fx
            .dispatcher
            .send_file(fx.identity_id, "491700000000", &pdf, "invoice")
            .await
            .unwrap();

        let (sent, _) = wait_for_flags(&fx.store, &message_id).await;
        assert!(sent);
        let row = fx.store.get_message(message_id.as_str()).unwrap().unwrap();
        assert_eq!(row.file_name.as_deref(), Some("file.pdf"));
    }

    #[tokio::test]
    async fn invalid_media_rejected_before_any_row() {
        let fx = fixture(GatewayConfig::for_tests());
        let err = fx
            .dispatcher
            .send_image(fx.identity_id, "491700000000", "data:image/png;hex,00", "x")
            .await
            .unwrap_err();
        assert_matches!(err, GatewayError::InvalidMedia(_));
    }

    #[tokio::test]
    async fn poll_send_delivers_the_administered_poll() {
        let fx = fixture(GatewayConfig::for_tests());
        let (poll, _) = fx
            .store
            .create_poll(
                fx.identity_id.get(),
                "Lunch?",
                &["Sushi".to_owned(), "Pizza".to_owned(), "Avocado".to_owned()],
            )
            .unwrap();

        let message_id = fx
            .dispatcher
            .send_poll(fx.identity_id, "491700000000", &poll.id)
            .await
            .unwrap();

        let (sent, _) = wait_for_flags(&fx.store, &message_id).await;
        assert!(sent);

        // The message references the existing poll; no new poll row is minted.
        let row = fx.store.get_message(message_id.as_str()).unwrap().unwrap();
        assert_eq!(row.poll_id.as_deref(), Some(poll.id.as_str()));
        assert_eq!(row.body, "Lunch?");

        let expected = vec!["Avocado".to_owned(), "Pizza".to_owned(), "Sushi".to_owned()];
        assert_matches!(
            &fx.client.sends()[0].payload,
            OutboundPayload::Poll { question, options } if question == "Lunch?" && *options == expected
        );
    }

    #[tokio::test]
    async fn poll_send_requires_an_existing_poll() {
        let fx = fixture(GatewayConfig::for_tests());
        let err = fx
            .dispatcher
            .send_poll(fx.identity_id, "491700000000", "poll_missing")
            .await
            .unwrap_err();
        assert_matches!(err, GatewayError::PollNotFound(_));
    }

    #[tokio::test]
    async fn poll_of_another_identity_is_not_sendable() {
        let fx = fixture(GatewayConfig::for_tests());
        let other = fx
            .store
            .create_identity(&NewIdentity {
                code: "dev-02",
                name: "Back office",
                token: "secret-token-0002",
                webhook: None,
                subscriptions: None,
            })
            .unwrap();
        let (poll, _) = fx
            .store
            .create_poll(other.id, "Lunch?", &["Pizza".to_owned(), "Sushi".to_owned()])
            .unwrap();

        let err = fx
            .dispatcher
            .send_poll(fx.identity_id, "491700000000", &poll.id)
            .await
            .unwrap_err();
        assert_matches!(err, GatewayError::PollNotFound(_));
    }

    #[tokio::test]
    async fn serialized_sends_preserve_submission_order() {
        let config = GatewayConfig {
            serialize_sends: true,
            ..GatewayConfig::for_tests()
        };
        let fx = fixture(config);

        let mut ids = Vec::new();
        for n in 0..5 {
            let id = fx
                .dispatcher
                .send_text(fx.identity_id, "491700000000", &format!("msg {n}"))
                .await
                .unwrap();
            ids.push(id);
        }
        for id in &ids {
            let (sent, _) = wait_for_flags(&fx.store, id).await;
            assert!(sent);
        }

        let recorded: Vec<_> = fx.client.sends().iter().map(|s| s.message_id.clone()).collect();
        let expected: Vec<_> = ids.iter().map(|id| id.as_str().to_owned()).collect();
        assert_eq!(recorded, expected);
    }

    #[test]
    fn decode_plain_base64() {
        let (bytes, mime) = decode_inline_content(&BASE64.encode(b"%PDF-1.7 x")).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(mime, "application/pdf");
    }

    #[test]
    fn decode_prefers_sniffed_type_over_header() {
        let url = format!("data:application/octet-stream;base64,{}", BASE64.encode(PNG_MAGIC));
        let (_, mime) = decode_inline_content(&url).unwrap();
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn decode_falls_back_to_header_type() {
        let url = format!("data:text/csv;base64,{}", BASE64.encode(b"a,b,c"));
        let (_, mime) = decode_inline_content(&url).unwrap();
        assert_eq!(mime, "text/csv");
    }

    #[test]
    fn decode_rejects_bad_base64() {
        assert_matches!(
            decode_inline_content("data:image/png;base64,@@@@"),
            Err(GatewayError::InvalidMedia(_))
        );
    }

    #[test]
    fn extension_resolution() {
        assert_eq!(extension_for("application/pdf"), "pdf");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("text/unknown"), "bin");
    }
}
