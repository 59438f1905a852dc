//! Running a tool inside a synced workspace.

use crate::Context;
use crate::ops::sync::Synced;
use anyhow::{Context as _, Result, bail};
use bottle_core::Invocation;
use bottle_core::materialize::{Mirror, MirrorOptions};
use std::path::PathBuf;
use std::sync::Arc;

/// Run `tool` in the workspace copy with inherited stdio, then bring its
/// changes back to the package's source tree.
pub async fn exec_tool(ctx: &Context, synced: &Synced, tool: &str, args: &[String]) -> Result<()> {
    let invocation = Invocation::new(tool)
        .args(args)
        .env(&ctx.settings.toolchain.workspace_var, &synced.config.workspace)
        .current_dir(&synced.workdir);
    tracing::debug!(command = %invocation.display(), "exec");

    let status = invocation
        .to_command()
        .status()
        .await
        .with_context(|| format!("failed to run '{tool}'"))?;
    if !status.success() {
        bail!("`{}` exited with {status}", invocation.display());
    }

    if !synced.config.missing {
        sync_back(ctx, synced).await?;
    }
    Ok(())
}

/// Mirror the workspace copy back into the package root, restoring the local
/// import names in every file that came back.
pub async fn sync_back(ctx: &Context, synced: &Synced) -> Result<Vec<PathBuf>> {
    let files = Mirror::new(Arc::clone(&ctx.runner))
        .sync(
            &synced.workdir,
            &synced.config.package_root,
            &MirrorOptions::default(),
        )
        .await?;
    let restored = synced.rewriter.inverse()?.rewrite_files(&files)?;
    tracing::debug!(files = files.len(), restored, "synced back");
    Ok(files)
}
