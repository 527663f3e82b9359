// crates/lexis-cli/src/commands/run.rs
//
// `lexis run` plans and executes a query, then prints the run summary and
// the claims it produced.

use clap::Args;

use crate::commands::query::QueryArgs;
use crate::context::AppContext;
use crate::output::{format_json, run_view};

#[derive(Debug, Args)]
pub struct RunCmd {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Ignore the plan cache for this run.
    #[arg(long)]
    pub no_cache: bool,
}

/// Run the run command.
pub async fn run(cmd: &RunCmd, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = ctx.pipeline(cmd.query.max_candidates, cmd.no_cache)?;
    let artifacts = pipeline.lookup(&cmd.query.to_query()).await?;

    if !artifacts.skipped.is_empty() {
        tracing::warn!("{} calls were skipped", artifacts.skipped.len());
    }
    println!("{}", format_json(&run_view(&artifacts)));
    Ok(())
}
