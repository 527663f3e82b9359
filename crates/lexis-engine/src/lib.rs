// crates/lexis-engine/src/lib.rs
//
// lexis-engine: Planning and staged execution for Lexis.
//
// The planner turns a normalized query into a ToolPlan, the executor runs the
// plan wave by wave through tool clients and stage handlers, and every effect
// lands in the storage indices from lexis-store.

pub mod clients;
pub mod executor;
pub mod handlers;
pub mod pipeline;
pub mod planner;
pub mod provenance;
pub mod registry;

pub use clients::ClientRegistry;
pub use executor::{
    execute_plan_staged, EffectIndices, ExecutionArtifacts, ExecutionOptions, SkippedCall,
};
pub use pipeline::LookupPipeline;
pub use planner::{Backend, Planner, PlannerConfig};
pub use provenance::{trace_claim, ClaimTrace};
pub use registry::HandlerRegistry;
