use anyhow::{Context as _, Result};

use crate::ops::Context;
use crate::ops::flow;

/// Apply the retention policy to the release directory.
pub async fn prune(ctx: &Context) -> Result<()> {
    let report = flow::prune(ctx).await.context("Pruning failed")?;

    let reporter = ctx.reporter();
    if report.removed.is_empty() {
        reporter.success("Nothing to prune");
    } else {
        reporter.success(&format!(
            "Pruned {} release{}",
            report.removed.len(),
            if report.removed.len() == 1 { "" } else { "s" }
        ));
    }
    for name in &report.failed_deletes {
        reporter.warning(&format!("Could not delete {name}"));
    }
    Ok(())
}
