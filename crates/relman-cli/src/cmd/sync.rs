use anyhow::{Context as _, Result};

use crate::ops::Context;
use crate::ops::flow;
use crate::ui::progress::format_size;

/// Compare against the last release and refresh when they diverge.
pub async fn sync(ctx: &Context) -> Result<()> {
    flow::ensure_release_dir(ctx).await?;
    let last = flow::last_release(ctx)
        .await
        .context("Failed to list releases")?;
    let (verdict, synced) = flow::reconcile(ctx, last).await.context("Sync failed")?;

    match synced {
        Some(report) => ctx.reporter().success(&format!(
            "Downloaded {} assets ({})",
            report.downloaded.len(),
            format_size(report.bytes)
        )),
        None => tracing::debug!("no refresh needed: {verdict:?}"),
    }
    Ok(())
}
