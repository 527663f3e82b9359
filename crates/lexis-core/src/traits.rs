// crates/lexis-core/src/traits.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::effects::{ClaimEffect, DerivationEffect, ExtractionEffect, RawResponseEffect};
use crate::error::LexisError;
use crate::plan::ExecutedPlan;

/// Uniform transport contract for fetch-stage tools.
///
/// Implemented by lexis-clients (HTTP, subprocess, file, fixture). Transport
/// failures are encoded in `status_code` rather than returned as errors, so
/// the executor can still record that the call was attempted.
#[async_trait]
pub trait ToolClient: Send + Sync {
    /// Short transport label used in logs ("http", "subprocess", "file", ...).
    fn name(&self) -> &str;

    /// Perform one call and capture its raw response.
    async fn execute(
        &self,
        call_id: &str,
        endpoint: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<RawResponseEffect, LexisError>;

    /// Whether `raw` counts as a successful fetch for this transport.
    fn is_success(&self, raw: &RawResponseEffect) -> bool {
        (200..300).contains(&raw.status_code)
    }
}

/// Persistent storage for raw responses. Writes replace by `response_id`.
///
/// Implemented by lexis-store (SQLite backend).
#[async_trait]
pub trait RawResponseStore: Send + Sync {
    async fn save_response(&self, effect: &RawResponseEffect) -> Result<(), LexisError>;

    async fn get_response(&self, response_id: &str) -> Result<Option<RawResponseEffect>, LexisError>;

    /// All stored responses for one call ID, oldest first.
    async fn list_responses_for_call(&self, call_id: &str) -> Result<Vec<RawResponseEffect>, LexisError>;
}

/// Persistent storage for extractions. Writes replace by `extraction_id`.
#[async_trait]
pub trait ExtractionStore: Send + Sync {
    async fn save_extraction(&self, effect: &ExtractionEffect) -> Result<(), LexisError>;

    async fn get_extraction(&self, extraction_id: &str) -> Result<Option<ExtractionEffect>, LexisError>;

    async fn list_extractions_for_response(
        &self,
        response_id: &str,
    ) -> Result<Vec<ExtractionEffect>, LexisError>;
}

/// Persistent storage for derivations. Writes replace by `derivation_id`.
#[async_trait]
pub trait DerivationStore: Send + Sync {
    async fn save_derivation(&self, effect: &DerivationEffect) -> Result<(), LexisError>;

    async fn get_derivation(&self, derivation_id: &str) -> Result<Option<DerivationEffect>, LexisError>;

    async fn list_derivations_for_extraction(
        &self,
        extraction_id: &str,
    ) -> Result<Vec<DerivationEffect>, LexisError>;
}

/// Persistent storage for claims. Writes replace by `claim_id`.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    async fn save_claim(&self, effect: &ClaimEffect) -> Result<(), LexisError>;

    async fn get_claim(&self, claim_id: &str) -> Result<Option<ClaimEffect>, LexisError>;

    async fn list_claims_for_derivation(&self, derivation_id: &str) -> Result<Vec<ClaimEffect>, LexisError>;
}

/// Plan-level cache: `plan_hash` -> the `ExecutedPlan` of a completed run.
#[async_trait]
pub trait PlanResponseStore: Send + Sync {
    /// Save or replace the entry for `plan.plan_hash`.
    async fn save_executed_plan(&self, plan: &ExecutedPlan) -> Result<(), LexisError>;

    /// Look up a cached run and refresh its `last_accessed` timestamp.
    async fn get_executed_plan(&self, plan_hash: &str) -> Result<Option<ExecutedPlan>, LexisError>;

    /// Delete entries not accessed since `cutoff`. Returns the number removed.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, LexisError>;
}
