//! Owned reentrancy token.

use core::borrow::Borrow;
use core::fmt;
use std::sync::Arc;

/// Opaque identifier shared by every call of one logical call chain.
///
/// Cheap to clone; compared structurally by its string contents.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ReentrancyToken(Arc<str>);

impl ReentrancyToken {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        ReentrancyToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ReentrancyToken {
    fn from(s: &str) -> Self {
        ReentrancyToken::new(s)
    }
}

impl From<String> for ReentrancyToken {
    fn from(s: String) -> Self {
        ReentrancyToken::new(s)
    }
}

impl AsRef<str> for ReentrancyToken {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for ReentrancyToken {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for ReentrancyToken {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl fmt::Display for ReentrancyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
