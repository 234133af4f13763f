use anyhow::{Context as _, Result};
use relman_core::publish::Publisher;

use crate::ops::Context;

/// Upload the release directory to the release for `version`.
pub async fn publish(ctx: &Context, version: &str) -> Result<()> {
    let host = ctx.require_remote()?;
    let reporter = ctx.reporter();

    reporter.section(&format!("Publishing {version}"));
    let report = Publisher::new(&ctx.config, host, reporter, &ctx.cancel)
        .publish(version)
        .await
        .with_context(|| format!("Failed to publish {version}"))?;

    reporter.success(&format!(
        "{} uploaded, {} already present",
        report.uploaded.len(),
        report.skipped.len()
    ));
    if let Some(github) = &ctx.config.github {
        reporter.info(&format!("Release page: {}", github.releases_page()));
    }
    Ok(())
}
