//! bottle - workspace-isolated dependency resolution for Go projects
#![allow(missing_docs)]
#![allow(clippy::doc_markdown)]
//!
//! Every package gets its own toolchain workspace. Before a build, bottle
//! resolves the package's dependency graph into that workspace, copies the
//! package in under its import path and then runs the toolchain there.
//!
//! # Workspace Layout
//!
//! ```text
//! $TMPDIR/bottle/<package name>/
//! ├── src/<import path>/   # the package and every dependency
//! ├── bin/                 # dependency binaries marked `install`
//! └── .workspace.lock
//! ```

pub mod cmd;
pub mod ops;

pub use bottle_core::USER_AGENT;
pub use ops::context::Context;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "bottle")]
#[command(author, version = env!("BOTTLE_VERSION"), about = "bottle - build Go packages in isolated workspaces")]
pub struct Cli {
    /// Show debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the per-package workspaces
    #[arg(long, global = true, env = "BOTTLE_WORKSPACE_BASE", value_name = "DIR")]
    pub workspace_base: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve dependencies, then build the package in its workspace
    Build {
        /// Copy the built binary to FILE
        #[arg(short = 'o', value_name = "FILE", conflicts_with = "out_dir")]
        output: Option<PathBuf>,
        /// Copy every [[bin]] target into DIR
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        /// Flags passed to the linker
        #[arg(long)]
        ldflags: Option<String>,
    },
    /// Resolve dependencies, then run a tool inside the workspace copy
    Exec {
        /// Tool and its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print the package containing a path
    Which {
        /// Print the package's source root instead of its project directory
        #[arg(long)]
        root: bool,
        /// File or directory
        path: PathBuf,
    },
}
