//! Preparing a package's workspace.

use crate::Context;
use anyhow::{Context as _, Result};
use bottle_core::materialize::{ImportRewriter, Mirror, MirrorOptions};
use bottle_core::{DependencyTracker, Discovery, WorkspaceLock, paths};
use bottle_schema::{Config, ImportPath};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A root package copied into its resolved workspace.
///
/// The workspace stays locked for as long as this value lives.
#[derive(Debug)]
pub struct Synced {
    pub config: Config,
    /// Import path of the package inside the workspace.
    pub import: ImportPath,
    /// `<workspace>/src/<import>`
    pub workdir: PathBuf,
    /// Local names -> canonical imports for the package's own sources.
    pub rewriter: ImportRewriter,
    _lock: WorkspaceLock,
}

/// Resolve the dependencies of the package containing `start` and copy the
/// package into its workspace.
pub async fn sync_project(ctx: &Context, start: &Path) -> Result<Synced> {
    let cfg = Discovery::new(&ctx.settings)
        .find(start)
        .context("could not find Bottle.toml or GOPATH")?;
    tracing::debug!(package = %cfg.package.name, workspace = %cfg.workspace.display(), "syncing");

    let lock = WorkspaceLock::acquire(&cfg.workspace, ctx.settings.lock_timeout).await?;

    let mut tracker = DependencyTracker::new(
        cfg,
        Arc::new(ctx.registry()),
        Arc::clone(&ctx.runner),
        &ctx.settings,
    )?;
    tracker.resolve_all().await?;
    tracker.install_all().await?;

    let config = tracker.root().clone();
    let import = tracker.root_import().clone();
    let workdir = paths::package_dir(&config.workspace, &import);

    let opts = MirrorOptions::workspace().exclude(config.package.exclude.iter().cloned());
    let copied = Mirror::new(Arc::clone(&ctx.runner))
        .sync(&config.package_root, &workdir, &opts)
        .await?;

    let empty = BTreeMap::new();
    let rewriter = ImportRewriter::new(tracker.renames_for(&import).unwrap_or(&empty))?;
    let changed = rewriter.rewrite_files(&copied)?;
    tracing::debug!(copied = copied.len(), changed, "package copied into workspace");

    Ok(Synced {
        config,
        import,
        workdir,
        rewriter,
        _lock: lock,
    })
}
