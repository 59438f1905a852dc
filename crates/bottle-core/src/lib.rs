//! bottle core: dependency resolution and workspace materialization.
//!
//! A build goes through these steps:
//!
//! 1. [`discovery::Discovery`] loads the root package configuration.
//! 2. [`tracker::DependencyTracker`] seeds its frontier from the root's
//!    dependencies and drives the [`resolvers`] concurrently until no
//!    dependency is left unresolved, ingesting every freshly fetched package.
//! 3. Unmanaged packages get a single fallback fetch through the toolchain.
//! 4. Packages marked `install` are built into `<workspace>/bin`.
//!
//! # Workspace Layout
//!
//! ```text
//! <workspace>/
//! ├── src/<import path>/   # one source tree per package
//! ├── bin/                 # installed dependency binaries
//! └── .workspace.lock      # held while a command uses the workspace
//! ```

pub mod discovery;
pub mod exec;
pub mod lock;
pub mod materialize;
pub mod paths;
pub mod resolvers;
pub mod settings;
pub mod tracker;

pub use discovery::{Discovery, DiscoveryError};
pub use exec::{CommandRunner, ExecError, Invocation, SystemRunner};
pub use lock::{LockError, WorkspaceLock};
pub use materialize::{ImportRewriter, MaterializeError, Mirror, MirrorOptions};
pub use resolvers::{Resolution, ResolveError, Resolver, ResolverRegistry};
pub use settings::{Settings, Toolchain};
pub use tracker::{DependencyTracker, TrackerError};

/// User Agent string sent with discovery requests
pub const USER_AGENT: &str = concat!("bottle/", env!("CARGO_PKG_VERSION"));
