//! relman - release manager CLI

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use relman_cli::ops::Context;
use relman_cli::ops::context::credentials_from_env;
use relman_cli::ui::Output;
use relman_cli::{Cli, Commands, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new();

    let ctx = Context::load(
        &cli.config,
        &credentials_from_env(),
        Arc::new(output.clone()),
    )?;

    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("interrupted, stopping after the current step (Ctrl-C again to abort)");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let result = match cli.command {
        Commands::Deploy {
            version,
            no_build,
            no_upload,
        } => cmd::deploy::deploy(&ctx, version, no_build, no_upload).await,
        Commands::Prune => cmd::prune::prune(&ctx).await,
        Commands::Check => cmd::check::check(&ctx).await,
        Commands::Sync => cmd::sync::sync(&ctx).await,
        Commands::Publish { version } => cmd::publish::publish(&ctx, &version).await,
        Commands::Version => cmd::version::version(&ctx).await,
    };

    output.wait();
    result
}
