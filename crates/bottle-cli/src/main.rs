//! bottle CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bottle_cli::cmd;
use bottle_cli::ops::build::BuildFlags;
use bottle_cli::{Cli, Commands, Context};
use bottle_core::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut settings = Settings::from_env();
    if let Some(base) = cli.workspace_base {
        settings.workspace_base = base;
    }

    match cli.command {
        Commands::Build {
            output,
            out_dir,
            ldflags,
        } => {
            let ctx = Context::new(settings)?;
            let flags = BuildFlags {
                ldflags,
                outfile: output,
                outdir: out_dir,
            };
            cmd::build::build(&ctx, &flags).await
        }
        Commands::Exec { command } => {
            let ctx = Context::new(settings)?;
            cmd::exec::exec(&ctx, &command).await
        }
        Commands::Which { root, path } => cmd::which::which(&settings, &path, root),
    }
}
