//! Platform address parsing and normalization.
//!
//! The messaging platform identifies a paired account by an address of the
//! form `user@server`, where the user part is a bare phone number. Inputs
//! arrive in several shapes (`+491700000000`, `491700000000@server.example`,
//! `491700000000:3@server.example`, with or without a session suffix), so
//! parsing strips the noise down to the digits and reattaches a server.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Server used when an input carries no explicit `@server` part.
pub const DEFAULT_SERVER: &str = "c.courier.net";

/// Errors from platform address parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The input was empty.
    #[error("empty address")]
    Empty,
    /// The user part contained non-digit characters.
    #[error("invalid address user part: {0}")]
    InvalidUser(String),
    /// An `@` was present but no server followed it.
    #[error("address has no server: {0}")]
    MissingServer(String),
}

/// A parsed, normalized platform address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformAddress {
    user: String,
    server: String,
}

impl PlatformAddress {
    /// Build an address from a bare user (digits) and the default server.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: DEFAULT_SERVER.to_owned(),
        }
    }

    /// Parse a platform address from arbitrary input.
    ///
    /// A leading `+` is dropped. The user part is everything before the
    /// first `@`, further truncated at the first `.` or `:` (device/session
    /// suffixes), and must be all digits. If the input carried an `@server`
    /// part it is kept, otherwise [`DEFAULT_SERVER`] is used.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        if input.is_empty() {
            return Err(AddressError::Empty);
        }
        let input = input.strip_prefix('+').unwrap_or(input);

        let (user_part, server) = match input.split_once('@') {
            Some((_, "")) => return Err(AddressError::MissingServer(input.to_owned())),
            Some((user, server)) => (user, server),
            None => (input, DEFAULT_SERVER),
        };

        let user = user_part
            .split(['.', ':'])
            .next()
            .unwrap_or_default();

        if user.is_empty() || !user.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AddressError::InvalidUser(input.to_owned()));
        }

        Ok(Self {
            user: user.to_owned(),
            server: server.to_owned(),
        })
    }

    /// The bare user part (digits only), as used for message destinations.
    #[must_use]
    pub fn bare(&self) -> &str {
        &self.user
    }

    /// The server part.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }
}

impl fmt::Display for PlatformAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

impl std::str::FromStr for PlatformAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_number() {
        let addr = PlatformAddress::parse("491700000000").unwrap();
        assert_eq!(addr.bare(), "491700000000");
        assert_eq!(addr.server(), DEFAULT_SERVER);
    }

    #[test]
    fn parse_strips_plus_prefix() {
        let addr = PlatformAddress::parse("+491700000000").unwrap();
        assert_eq!(addr.bare(), "491700000000");
    }

    #[test]
    fn parse_keeps_explicit_server() {
        let addr = PlatformAddress::parse("491700000000@server.example").unwrap();
        assert_eq!(addr.bare(), "491700000000");
        assert_eq!(addr.server(), "server.example");
        assert_eq!(addr.to_string(), "491700000000@server.example");
    }

    #[test]
    fn parse_strips_session_suffix() {
        let addr = PlatformAddress::parse("491700000000:3@server.example").unwrap();
        assert_eq!(addr.bare(), "491700000000");
    }

    #[test]
    fn parse_strips_dot_suffix() {
        let addr = PlatformAddress::parse("491700000000.0:3").unwrap();
        assert_eq!(addr.bare(), "491700000000");
        assert_eq!(addr.server(), DEFAULT_SERVER);
    }

    #[test]
    fn parse_empty_is_error() {
        assert_eq!(PlatformAddress::parse(""), Err(AddressError::Empty));
    }

    #[test]
    fn parse_rejects_letters() {
        assert!(matches!(
            PlatformAddress::parse("not-a-number"),
            Err(AddressError::InvalidUser(_))
        ));
    }

    #[test]
    fn parse_rejects_missing_server() {
        assert!(matches!(
            PlatformAddress::parse("491700000000@"),
            Err(AddressError::MissingServer(_))
        ));
    }

    #[test]
    fn parse_rejects_empty_user() {
        assert!(matches!(
            PlatformAddress::parse("@server.example"),
            Err(AddressError::InvalidUser(_))
        ));
    }

    #[test]
    fn from_str_impl() {
        let addr: PlatformAddress = "491700000000".parse().unwrap();
        assert_eq!(addr.bare(), "491700000000");
    }

    #[test]
    fn serde_roundtrip() {
        let addr = PlatformAddress::new("491700000000");
        let json = serde_json::to_string(&addr).unwrap();
        let back: PlatformAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
