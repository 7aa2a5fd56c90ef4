//! # courier-store
//!
//! `SQLite` persistence for the Courier gateway.
//!
//! Responsible for:
//!
//! - **Connection pool**: `rusqlite` behind `r2d2` with WAL mode and foreign
//!   keys enforced on every connection
//! - **Migrations**: version-tracked SQL schema evolution, embedded at
//!   compile time
//! - **Repositories**: stateless row access for identities, messages, polls
//!   and vote history — targeted single-row updates, no long-held locks
//! - **`Store` facade**: the high-level API the runtime talks to, including
//!   the multi-statement transactions (poll creation, poll-vote commit)

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod row_types;
pub mod store;

pub use connection::{new_file, new_in_memory, ConnectionConfig, ConnectionPool};
pub use errors::{Result, StoreError};
pub use migrations::run_migrations;
pub use store::Store;
