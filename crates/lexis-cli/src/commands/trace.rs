// crates/lexis-cli/src/commands/trace.rs
//
// `lexis trace <claim_id>` prints a stored claim with every upstream effect.

use clap::Args;

use lexis_engine::trace_claim;

use crate::context::AppContext;
use crate::output::{format_json, trace_view};

#[derive(Debug, Args)]
pub struct TraceCmd {
    /// ID of a stored claim (clm-...).
    #[arg()]
    pub claim_id: String,
}

/// Run the trace command.
pub async fn run(cmd: &TraceCmd, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let indices = ctx.indices()?;
    let trace = trace_claim(&cmd.claim_id, &indices).await?;
    println!("{}", format_json(&trace_view(&trace)));
    Ok(())
}
