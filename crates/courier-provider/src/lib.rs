//! # courier-provider
//!
//! The connectivity-provider boundary of the Courier gateway.
//!
//! The gateway core never speaks the platform's wire protocol. It consumes a
//! small surface defined here:
//!
//! - [`PlatformClient`]: connect, pairing stream, send-with-explicit-id,
//!   media upload, poll-vote decryption, presence, disconnect
//! - [`ClientFactory`]: builds one client per identity, together with the
//!   bounded channel the client pushes [`PlatformEvent`]s into
//! - [`PlatformEvent`]: the closed set of asynchronous events a client can
//!   raise, with an explicit [`PlatformEvent::Unrecognized`] catch-all
//!
//! [`mock`] provides a scriptable in-process client used by runtime tests.

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod mock;
pub mod traits;
pub mod types;

pub use errors::{ProviderError, Result};
pub use events::{DecryptedVote, PairingEvent, PlatformEvent};
pub use traits::{ClientFactory, PlatformClient};
pub use types::{ChatPresence, MediaKind, MediaUpload, OutboundPayload, Presence};
