//! Building a synced package and collecting its binaries.

use crate::Context;
use crate::ops::sync::Synced;
use anyhow::{Context as _, Result, bail};
use bottle_core::{ExecError, paths};
use bottle_schema::BinTarget;
use std::path::{Path, PathBuf};

/// Options of `bottle build`.
#[derive(Debug, Clone, Default)]
pub struct BuildFlags {
    pub ldflags: Option<String>,
    /// Copy the package's binary to this file.
    pub outfile: Option<PathBuf>,
    /// Copy every `[[bin]]` target into this directory.
    pub outdir: Option<PathBuf>,
}

/// Name the toolchain gives the binary of `bin`: the last directory of its
/// path, or the target name for a binary at the package root.
///
/// ```
/// use bottle_cli::ops::build::installed_name;
/// use bottle_schema::BinTarget;
///
/// let bin = BinTarget { name: "app".into(), path: "cmd/server".into() };
/// assert_eq!(installed_name(&bin), "server");
/// let bin = BinTarget { name: "app".into(), path: "cmd/server/main.go".into() };
/// assert_eq!(installed_name(&bin), "server");
/// let bin = BinTarget { name: "app".into(), path: ".".into() };
/// assert_eq!(installed_name(&bin), "app");
/// ```
pub fn installed_name(bin: &BinTarget) -> &str {
    let path = bin.path.trim_end_matches('/');
    let dir = if Path::new(path).extension().is_some_and(|e| e == "go") {
        path.rsplit_once('/').map_or("", |(dir, _)| dir)
    } else {
        path
    };
    match dir.rsplit('/').next() {
        Some(base) if !base.is_empty() && base != "." => base,
        _ => &bin.name,
    }
}

/// Replace the workspace copy's path in toolchain output with `.`.
fn scrub(output: &str, workdir: &Path) -> String {
    output.replace(&*workdir.to_string_lossy(), ".")
}

/// Install the package inside its workspace, then copy the requested
/// outputs. Relative output paths are taken relative to `cwd`.
pub async fn build_project(
    ctx: &Context,
    synced: &Synced,
    flags: &BuildFlags,
    cwd: &Path,
) -> Result<Vec<PathBuf>> {
    let workspace = &synced.config.workspace;

    let mut args = vec!["install".to_string()];
    if let Some(ldflags) = &flags.ldflags {
        args.push("-ldflags".to_string());
        args.push(ldflags.clone());
    }
    // a vendoring package is built as one unit
    let target = if synced.workdir.join("vendor").exists() {
        "."
    } else {
        "./..."
    };
    args.push(target.to_string());

    let invocation = ctx
        .settings
        .toolchain
        .command(workspace, &args)
        .current_dir(&synced.workdir);
    match ctx.runner.run(&invocation).await {
        Ok(output) => eprint!("{}", scrub(&output, &synced.workdir)),
        Err(ExecError::Failed { output, .. }) => {
            eprint!("{}", scrub(&output, &synced.workdir));
            bail!("failed to build {}", synced.import);
        }
        Err(e) => return Err(e.into()),
    }

    copy_outputs(synced, flags, cwd).await
}

async fn copy_outputs(synced: &Synced, flags: &BuildFlags, cwd: &Path) -> Result<Vec<PathBuf>> {
    let bin_dir = paths::bin_dir(&synced.config.workspace);
    let mut copies = Vec::new();

    if let Some(outfile) = &flags.outfile {
        let source = match synced.config.bin.first() {
            Some(bin) => bin_dir.join(installed_name(bin)),
            None => {
                let default = bin_dir.join(synced.import.base_name());
                if !default.is_file() {
                    bail!("no output exists that can be written to a file");
                }
                default
            }
        };
        copies.push((source, paths::absolute(&cwd.join(outfile))));
    } else if let Some(outdir) = &flags.outdir {
        let outdir = paths::absolute(&cwd.join(outdir));
        for bin in &synced.config.bin {
            copies.push((bin_dir.join(installed_name(bin)), outdir.join(&bin.name)));
        }
    }

    let mut written = Vec::with_capacity(copies.len());
    for (source, dest) in copies {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::copy(&source, &dest)
            .await
            .with_context(|| format!("failed to copy {} to {}", source.display(), dest.display()))?;
        tracing::debug!(from = %source.display(), to = %dest.display(), "copied output");
        written.push(dest);
    }
    Ok(written)
}
