use anyhow::{Context as _, Result};

use crate::ops::Context;
use crate::ops::flow;

/// Report manifest entries whose files are missing.
pub async fn check(ctx: &Context) -> Result<()> {
    let missing = flow::check(ctx).await.context("Check failed")?;
    if missing.is_empty() {
        ctx.reporter().success("All release files present");
    } else {
        ctx.reporter()
            .warning(&format!("{} release files missing", missing.len()));
    }
    Ok(())
}
