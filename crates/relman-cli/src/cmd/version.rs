use anyhow::Result;

use crate::ops::Context;
use crate::ops::flow;

/// Print the version the next deploy would use.
pub async fn version(ctx: &Context) -> Result<()> {
    let last = flow::last_release(ctx).await?;
    let today = chrono::Local::now().date_naive();
    println!("{}", flow::resolve_version(ctx, last.as_ref(), None, today));
    Ok(())
}
