//! Resolvers fetch one dependency into `<workspace>/src/<import path>`.
//!
//! Every transport has exactly one resolver, looked up through a
//! [`ResolverRegistry`] that is constructed per build.

pub mod git;
pub mod path;
pub mod remote;

pub use git::{DestinationLocks, GitResolver};
pub use path::PathResolver;
pub use remote::{ImportMeta, MetaError, RemoteResolver, parse_import_meta};

use crate::exec::{CommandRunner, ExecError};
use crate::materialize::{MaterializeError, Mirror};
use crate::settings::Settings;
use async_trait::async_trait;
use bottle_schema::{ImportPath, Transport};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Successful outcome of a resolve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The package was written into the workspace during this call.
    Fetched,
    /// The package was already present; nothing was changed.
    AlreadyResolved,
}

/// Why a dependency could not be fetched.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// `git` or `rsync` failed; carries the tool's output.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Mirroring a local directory failed.
    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    /// The clone destination exists without a `.git` directory.
    #[error("{} already exists but is not a git checkout", .0.display())]
    NotACheckout(PathBuf),

    /// A destination directory could not be created.
    #[error("failed to create {}: {source}", .path.display())]
    Io {
        /// Directory being created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The discovery request could not be sent or its body read.
    #[error("discovery request to {url} failed: {source}")]
    Http {
        /// Request URL.
        url: String,
        /// Transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The discovery server answered with a non-2xx status.
    #[error("discovery request to {url} returned {status}")]
    Status {
        /// Request URL.
        url: String,
        /// Response status.
        status: reqwest::StatusCode,
    },

    /// The discovery response has no usable `go-import` meta tag.
    #[error("invalid discovery response from {url}: {source}")]
    Meta {
        /// Request URL.
        url: String,
        /// What is wrong with the tag.
        #[source]
        source: MetaError,
    },

    /// The discovered prefix does not contain the requested import.
    #[error("\"{import}\" is not under its discovered prefix \"{prefix}\"")]
    OutsidePrefix {
        /// Requested import path.
        import: ImportPath,
        /// Prefix named by the meta tag.
        prefix: ImportPath,
    },

    /// The prefix's own discovery response differs from the import's.
    #[error("go-import meta for \"{import}\" does not match its prefix \"{prefix}\"")]
    PrefixMismatch {
        /// Requested import path.
        import: ImportPath,
        /// Prefix named by the meta tag.
        prefix: ImportPath,
    },

    /// The meta tag names a VCS other than git.
    #[error("unknown VCS \"{vcs}\" when resolving remote import \"{import}\"")]
    UnsupportedVcs {
        /// Requested import path.
        import: ImportPath,
        /// VCS named by the meta tag.
        vcs: String,
    },
}

/// Fetches dependencies of one transport.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Materialize `locator` at `<workspace>/src/<import>`.
    async fn resolve(
        &self,
        locator: &str,
        import: &ImportPath,
        workspace: &Path,
    ) -> Result<Resolution, ResolveError>;
}

/// Maps each transport to its resolver.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<Transport, Arc<dyn Resolver>>,
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut transports: Vec<&str> = self.resolvers.keys().map(|t| t.as_str()).collect();
        transports.sort_unstable();
        f.debug_struct("ResolverRegistry")
            .field("transports", &transports)
            .finish()
    }
}

impl ResolverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The path, git and remote resolvers. The remote resolver shares the
    /// git resolver, and with it the per-destination locks.
    pub fn builtin(
        runner: Arc<dyn CommandRunner>,
        client: reqwest::Client,
        settings: &Settings,
    ) -> Self {
        let git = Arc::new(GitResolver::new(Arc::clone(&runner)));
        let remote =
            RemoteResolver::new(client, Arc::clone(&git)).with_origin(settings.discovery_origin.clone());

        let mut registry = Self::new();
        registry.register(Transport::Path, Arc::new(PathResolver::new(Mirror::new(runner))));
        registry.register(Transport::Git, git);
        registry.register(Transport::Remote, Arc::new(remote));
        registry
    }

    /// Install `resolver` for `transport`, returning the one it replaces.
    pub fn register(
        &mut self,
        transport: Transport,
        resolver: Arc<dyn Resolver>,
    ) -> Option<Arc<dyn Resolver>> {
        self.resolvers.insert(transport, resolver)
    }

    /// The resolver for `transport`, if one is registered.
    pub fn get(&self, transport: Transport) -> Option<Arc<dyn Resolver>> {
        self.resolvers.get(&transport).cloned()
    }
}
