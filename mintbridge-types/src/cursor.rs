//! Forward-only pagination cursors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque continuation token issued by a listing endpoint.
///
/// `PageCursor::start()` (no token) means "beginning of the collection".
/// Empty tokens are normalized away, so a cursor built from an empty string
/// is the same as no cursor at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageCursor(Option<String>);

impl PageCursor {
    /// The cursor that starts a traversal.
    #[must_use]
    pub const fn start() -> Self {
        Self(None)
    }

    /// Wraps a token returned by the upstream.
    pub fn from_token(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.trim().is_empty() {
            Self(None)
        } else {
            Self(Some(token))
        }
    }

    /// Normalizes an optional upstream token.
    #[must_use]
    pub fn from_option(token: Option<String>) -> Self {
        token.map_or_else(Self::start, Self::from_token)
    }

    /// Returns the token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Returns true if this cursor carries no token.
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(token) => write!(f, "{token}"),
            None => write!(f, "<start>"),
        }
    }
}
