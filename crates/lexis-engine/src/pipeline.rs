// crates/lexis-engine/src/pipeline.rs
//
// LookupPipeline bundles a planner, clients, handlers and storage indices so
// callers can go from a normalized query to claims in one step. All state is
// owned by the pipeline value; nothing is global.

use lexis_core::{LexisError, NormalizedQuery, ToolPlan};

use crate::clients::ClientRegistry;
use crate::executor::{execute_plan_staged, EffectIndices, ExecutionArtifacts, ExecutionOptions};
use crate::planner::Planner;
use crate::provenance::{trace_claim, ClaimTrace};
use crate::registry::HandlerRegistry;

pub struct LookupPipeline {
    planner: Planner,
    clients: ClientRegistry,
    registry: HandlerRegistry,
    indices: EffectIndices,
    options: ExecutionOptions,
}

impl LookupPipeline {
    pub fn new(
        planner: Planner,
        clients: ClientRegistry,
        registry: HandlerRegistry,
        indices: EffectIndices,
    ) -> Self {
        Self {
            planner,
            clients,
            registry,
            indices,
            options: ExecutionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    pub fn indices(&self) -> &EffectIndices {
        &self.indices
    }

    /// Build the plan for `query` without executing it.
    pub fn plan(&self, query: &NormalizedQuery) -> ToolPlan {
        self.planner.build(query)
    }

    pub async fn execute(&self, plan: &ToolPlan) -> Result<ExecutionArtifacts, LexisError> {
        execute_plan_staged(plan, &self.clients, &self.registry, &self.indices, &self.options).await
    }

    /// Plan and execute `query`.
    pub async fn lookup(&self, query: &NormalizedQuery) -> Result<ExecutionArtifacts, LexisError> {
        let plan = self.plan(query);
        if plan.is_empty() {
            tracing::warn!(
                "No backends configured for '{}' ({}); plan is empty",
                query.original,
                query.language
            );
        }
        self.execute(&plan).await
    }

    pub async fn trace(&self, claim_id: &str) -> Result<ClaimTrace, LexisError> {
        trace_claim(claim_id, &self.indices).await
    }
}
