// crates/lexis-core/src/lib.rs
//
// lexis-core: Core types, stable IDs and trait interfaces for the Lexis
// classical-language dictionary aggregator.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the normalized query model, the tool plan model, the effect
// records each pipeline stage produces, the error type, and the traits that
// tool clients and storage indices implement.

pub mod effects;
pub mod error;
pub mod hashing;
pub mod plan;
pub mod provenance;
pub mod query;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use lexis_core::ToolPlan;`

// Query types
pub use query::{CanonicalCandidate, Language, NormalizationStep, NormalizedQuery};

// Plan types
pub use plan::{ExecutedPlan, PlanDependency, Stage, ToolCallSpec, ToolPlan, ToolResponseRef};

// Effect types
pub use effects::{ClaimEffect, DerivationEffect, Effect, ExtractionEffect, RawResponseEffect};
pub use provenance::ProvenanceLink;

// Stable IDs
pub use hashing::{stable_digest, stable_effect_id};

// Error type
pub use error::LexisError;

// Traits
pub use traits::{
    ClaimStore, DerivationStore, ExtractionStore, PlanResponseStore, RawResponseStore, ToolClient,
};
