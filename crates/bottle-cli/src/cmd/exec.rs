//! Exec command

use crate::Context;
use crate::ops::exec::exec_tool;
use crate::ops::sync::sync_project;
use anyhow::{Result, bail};

/// Sync the current package and run `command` in its workspace.
pub async fn exec(ctx: &Context, command: &[String]) -> Result<()> {
    let Some((tool, args)) = command.split_first() else {
        bail!("missing tool to execute");
    };
    let cwd = std::env::current_dir()?;
    let synced = sync_project(ctx, &cwd).await?;
    exec_tool(ctx, &synced, tool, args).await
}
