//! Import paths.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// A hierarchical import identifier such as `github.com/user/lib`.
///
/// Import paths double as workspace locations: a package with import path
/// `p` lives at `<workspace>/src/p`. Unlike package names they are
/// case-sensitive, so the value is stored exactly as declared (minus any
/// trailing slash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportPath(String);

impl ImportPath {
    /// Create a new import path, trimming trailing slashes.
    pub fn new(path: &str) -> Self {
        Self(path.trim_end_matches('/').to_string())
    }

    /// Return the import path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the path stays inside the directory it is joined onto: it is
    /// non-empty, relative, and no segment is empty, `.` or `..`.
    ///
    /// ```
    /// use bottle_schema::ImportPath;
    ///
    /// assert!(ImportPath::new("github.com/a/b").is_contained());
    /// assert!(!ImportPath::new("../escaped").is_contained());
    /// assert!(!ImportPath::new("").is_contained());
    /// ```
    pub fn is_contained(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .split('/')
                .all(|seg| !seg.is_empty() && seg != "." && seg != ".." && !seg.contains('\\'))
    }

    /// Last path segment, used as the binary name when installing.
    ///
    /// ```
    /// use bottle_schema::ImportPath;
    ///
    /// assert_eq!(ImportPath::new("github.com/a/b/cmd/tool").base_name(), "tool");
    /// assert_eq!(ImportPath::new("tool").base_name(), "tool");
    /// ```
    pub fn base_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Append a slash-separated sub-path. An empty sub-path returns a clone.
    pub fn join(&self, sub: &str) -> Self {
        let sub = sub.trim_matches('/');
        if sub.is_empty() {
            self.clone()
        } else {
            Self(format!("{}/{sub}", self.0))
        }
    }

    /// The repository prefix of a hosted import path: its first three
    /// segments (`host/owner/repo`). Shorter paths are returned unchanged and
    /// left to fail later during the fetch.
    ///
    /// ```
    /// use bottle_schema::ImportPath;
    ///
    /// let p = ImportPath::new("github.com/a/b/cmd/x");
    /// assert_eq!(p.hosting_prefix().as_str(), "github.com/a/b");
    /// ```
    pub fn hosting_prefix(&self) -> Self {
        let parts: Vec<&str> = self.0.split('/').collect();
        if parts.len() >= 3 {
            Self(parts[..3].join("/"))
        } else {
            self.clone()
        }
    }

    /// If `self` is `prefix` or lies underneath it, the remaining sub-path
    /// (possibly empty).
    pub fn strip_prefix(&self, prefix: &ImportPath) -> Option<&str> {
        let rest = self.0.strip_prefix(prefix.as_str())?;
        if rest.is_empty() {
            Some("")
        } else {
            rest.strip_prefix('/')
        }
    }
}

impl std::fmt::Display for ImportPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for ImportPath {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ImportPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<std::path::Path> for ImportPath {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl Borrow<str> for ImportPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ImportPath {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ImportPath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for ImportPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImportPath {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}
