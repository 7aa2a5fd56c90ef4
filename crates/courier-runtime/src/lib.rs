//! # courier-runtime
//!
//! Session supervision for the Courier gateway.
//!
//! One supervisor task per paired identity drives the platform connection:
//! QR pairing for fresh identities, direct connect for stored credentials,
//! inbound event dispatch (receipts, poll votes, logout), and teardown. The
//! [`Gateway`] facade is what the API layer calls; everything underneath is
//! keyed by identity and isolated per session:
//!
//! - [`registry::SessionRegistry`]: the shared map of live sessions
//! - [`supervisor::SessionSupervisor`]: the per-identity lifecycle task
//! - [`pairing::PairingController`]: the QR pairing sub-protocol
//! - [`dispatcher::EventDispatcher`]: inbound platform event effects
//! - [`outbound::OutboundDispatcher`]: persist-then-transmit send pipeline
//! - [`poll_votes::PollVoteReconciler`]: atomic vote commits
//! - [`shutdown::ShutdownCoordinator`]: bounded full-process drain

#![deny(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod gateway;
pub mod outbound;
pub mod pairing;
pub mod poll_votes;
pub mod registry;
pub mod shutdown;
pub mod supervisor;

pub use config::GatewayConfig;
pub use errors::{GatewayError, Result};
pub use gateway::Gateway;
pub use registry::{SessionHandle, SessionRegistry};
pub use supervisor::SessionState;
