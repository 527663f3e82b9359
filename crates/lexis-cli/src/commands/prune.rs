// crates/lexis-cli/src/commands/prune.rs
//
// `lexis prune` drops plan-cache entries that have not been used recently.
// Effect rows are kept; only the plan-level shortcut is removed.

use clap::Args;

use crate::context::AppContext;

#[derive(Debug, Args)]
pub struct PruneCmd {
    /// Remove entries not accessed in this many days.
    #[arg(long, default_value = "30")]
    pub days: i64,
}

/// Run the prune command.
pub async fn run(cmd: &PruneCmd, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(cmd.days.max(0));
    let removed = ctx.indices()?.plans.prune_older_than(cutoff).await?;
    println!("Pruned {} plan cache entries older than {}", removed, cutoff.to_rfc3339());
    Ok(())
}
