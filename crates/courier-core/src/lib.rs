//! # courier-core
//!
//! Foundation types for the Courier gateway.
//!
//! This crate provides the shared vocabulary the other Courier crates depend
//! on:
//!
//! - **Branded IDs**: [`ids::IdentityId`], [`ids::MessageId`], [`ids::PollId`]
//!   and friends as newtypes
//! - **Platform addresses**: [`address::PlatformAddress`] parsing and
//!   normalization
//! - **Outbound values**: [`message::SendKind`]
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other courier crates.

#![deny(unsafe_code)]

pub mod address;
pub mod ids;
pub mod message;

pub use address::{AddressError, PlatformAddress};
pub use ids::{IdentityId, MessageId, PollDetailId, PollHistoryId, PollId};
pub use message::SendKind;
