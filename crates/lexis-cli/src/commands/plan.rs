// crates/lexis-cli/src/commands/plan.rs
//
// `lexis plan` prints the plan for a query without executing it.

use crate::commands::query::QueryArgs;
use crate::context::AppContext;
use crate::output::format_json;

/// Run the plan command.
pub async fn run(args: &QueryArgs, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let query = args.to_query();
    let plan = ctx.planner(args.max_candidates).build(&query);
    // Validate before printing so a broken plan is reported, not shown.
    let waves = plan.waves()?;
    tracing::info!(
        "Plan {} has {} calls in {} waves",
        plan.plan_id(),
        plan.tool_calls().len(),
        waves.len()
    );
    println!("{}", format_json(&plan));
    Ok(())
}
