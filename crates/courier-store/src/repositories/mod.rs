//! Stateless repositories — every method takes `&Connection`.
//!
//! Repositories own SQL and row mapping only. Transactions are composed at
//! the [`crate::store::Store`] level, which passes the transaction
//! connection down into the same repository methods.

pub mod identity;
pub mod message;
pub mod poll;
pub mod poll_history;

pub use identity::{IdentityRepo, NewIdentity};
pub use message::{MessageRepo, NewMessage};
pub use poll::{NewPoll, NewPollDetail, PollRepo};
pub use poll_history::{NewPollHistory, PollHistoryRepo};
