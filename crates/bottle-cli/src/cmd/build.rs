//! Build command

use crate::Context;
use crate::ops::build::{BuildFlags, build_project};
use crate::ops::sync::sync_project;
use anyhow::Result;

/// Sync the current package and build it.
pub async fn build(ctx: &Context, flags: &BuildFlags) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let synced = sync_project(ctx, &cwd).await?;
    for output in build_project(ctx, &synced, flags, &cwd).await? {
        tracing::info!("wrote {}", output.display());
    }
    Ok(())
}
