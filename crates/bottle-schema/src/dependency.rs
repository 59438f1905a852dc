//! Normalized dependencies.

use serde::{Deserialize, Serialize};

/// How a dependency is fetched into the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Mirrored from a local directory.
    Path,
    /// Cloned from a git repository URL.
    Git,
    /// Looked up through the toolchain's remote import discovery protocol.
    Remote,
}

impl Transport {
    /// The tag used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Git => "git",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized dependency: where it comes from, not what it is called.
///
/// Two declarations with different local names but the same transport and
/// locator compare equal, which is what lets the resolver fetch them once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dependency {
    /// Fetch mechanism.
    pub transport: Transport,
    /// Absolute directory, clone URL or bare import path, depending on the transport.
    pub locator: String,
}

impl Dependency {
    /// Create a dependency from its transport and locator.
    pub fn new(transport: Transport, locator: impl Into<String>) -> Self {
        Self {
            transport,
            locator: locator.into(),
        }
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.transport, self.locator)
    }
}
