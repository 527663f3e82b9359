// crates/lexis-store/src/lib.rs
//
// lexis-store: Storage layer for Lexis.
//
// Provides a pooled embedded SQLite database and one index per effect type
// (raw responses, extractions, derivations, claims) plus the plan-result
// cache. Every index implements the matching storage trait from lexis-core
// with replace-by-ID semantics.

pub mod claim;
pub mod db;
pub mod derivation;
pub mod extraction;
pub mod plan_cache;
pub mod raw;

// Re-export key types for ergonomic access from downstream crates.
pub use claim::ClaimIndex;
pub use db::{Database, DbPool, EffectTable};
pub use derivation::DerivationIndex;
pub use extraction::ExtractionIndex;
pub use plan_cache::PlanResponseIndex;
pub use raw::RawResponseIndex;
