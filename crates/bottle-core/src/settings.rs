//! Runtime settings shared by discovery, the resolvers and the CLI.
//!
//! Everything has a sensible default; the `BOTTLE_*` environment variables
//! listed on [`Settings::from_env`] override them.

use crate::exec::Invocation;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a command waits for another process to release the workspace.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(3);

/// The host compiler toolchain the workspace is prepared for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Executable invoked for fetch/build/install subcommands.
    pub program: String,
    /// Environment variable pointing the toolchain at a workspace root.
    pub workspace_var: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
            workspace_var: "GOPATH".to_string(),
        }
    }
}

impl Toolchain {
    /// A toolchain subcommand bound to `workspace`: the workspace variable is
    /// overridden and the command runs from the workspace root.
    pub fn command<I, S>(&self, workspace: &Path, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Invocation::new(&self.program)
            .args(args)
            .env(&self.workspace_var, workspace)
            .current_dir(workspace)
    }
}

/// Settings for one bottle invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Manifest file name looked up during discovery.
    pub manifest_name: String,
    /// Toolchain driven inside the workspace.
    pub toolchain: Toolchain,
    /// Parent directory of per-package workspaces.
    pub workspace_base: PathBuf,
    /// Workspace root of the calling environment (its `GOPATH`), used to
    /// address an unmanaged root package.
    pub host_workspace: Option<PathBuf>,
    /// Replaces `https://` as the origin of remote discovery requests.
    pub discovery_origin: Option<String>,
    /// How long to wait for the workspace lock.
    pub lock_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manifest_name: bottle_schema::MANIFEST_FILE.to_string(),
            toolchain: Toolchain::default(),
            workspace_base: std::env::temp_dir().join("bottle"),
            host_workspace: None,
            discovery_origin: None,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl Settings {
    /// Defaults overridden from the environment:
    ///
    /// | Variable | Setting |
    /// |---|---|
    /// | `BOTTLE_WORKSPACE_BASE` | `workspace_base` |
    /// | `BOTTLE_TOOLCHAIN` | `toolchain.program` |
    /// | `BOTTLE_DISCOVERY_ORIGIN` | `discovery_origin` |
    /// | `GOPATH` (the toolchain's workspace variable) | `host_workspace` |
    pub fn from_env() -> Self {
        let mut settings = Self {
            workspace_base: crate::paths::default_workspace_base(),
            ..Self::default()
        };
        if let Ok(program) = std::env::var("BOTTLE_TOOLCHAIN") {
            settings.toolchain.program = program;
        }
        if let Ok(origin) = std::env::var("BOTTLE_DISCOVERY_ORIGIN") {
            settings.discovery_origin = Some(origin);
        }
        settings.host_workspace = std::env::var_os(&settings.toolchain.workspace_var)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        settings
    }

    /// Workspace directory of the package named `name`.
    pub fn workspace_for(&self, name: &str) -> PathBuf {
        self.workspace_base.join(name)
    }
}
