use anyhow::{Context as _, Result};
use relman_core::builder::CommandToolchain;

use crate::ops::Context;
use crate::ops::flow::{self, DeployOptions};
use crate::ui::progress::format_size;

/// Run the full deploy pipeline.
pub async fn deploy(
    ctx: &Context,
    version: Option<String>,
    no_build: bool,
    no_upload: bool,
) -> Result<()> {
    let toolchain = CommandToolchain::from_config(&ctx.config);
    let today = chrono::Local::now().date_naive();
    let options = DeployOptions {
        version,
        build: !no_build,
        upload: !no_upload,
    };

    let start = std::time::Instant::now();
    let outcome = flow::deploy(ctx, &toolchain, today, options)
        .await
        .context("Deploy failed")?;

    let reporter = ctx.reporter();
    if let Some(synced) = &outcome.synced {
        reporter.info(&format!(
            "Synced {} assets ({})",
            synced.downloaded.len(),
            format_size(synced.bytes)
        ));
    }
    if !outcome.missing.is_empty() {
        reporter.warning(&format!(
            "{} manifest entries have no local file",
            outcome.missing.len()
        ));
    }
    reporter.success(&format!(
        "Deployed {} in {:.1}s",
        outcome.version,
        start.elapsed().as_secs_f64()
    ));
    Ok(())
}
