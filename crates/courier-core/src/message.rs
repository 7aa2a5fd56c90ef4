//! Outbound message value types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of payload a send operation carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendKind {
    /// Plain text message.
    Text,
    /// Image with optional caption.
    Image,
    /// File/document attachment.
    File,
    /// Poll creation message.
    Poll,
}

impl SendKind {
    /// Stable string form, as persisted in the `kind` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::Poll => "poll",
        }
    }
}

impl fmt::Display for SendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
