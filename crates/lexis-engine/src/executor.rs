// crates/lexis-engine/src/executor.rs
//
// Staged plan executor.
//
// Execution flow for one plan:
//   1. Plan cache: a stored run for the same plan_hash is hydrated from the
//      effect indices and returned without calling any tool.
//   2. Pre-flight: duplicate IDs, unknown edges and cycles abort the plan
//      before anything runs.
//   3. Waves: every call whose blockers have completed runs concurrently,
//      bounded by `max_concurrency`. Effects are persisted as each call
//      finishes and applied to the run in call_id order.
//   4. The ExecutedPlan summary is written to the plan cache.
//
// A failing optional fetch is recorded and skipped together with everything
// downstream of it. Any other failure aborts the plan; effects already
// persisted stay in the indices.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;

use lexis_core::{
    ClaimEffect, ClaimStore, DerivationEffect, DerivationStore, Effect, ExecutedPlan,
    ExtractionEffect, ExtractionStore, LexisError, PlanResponseStore, RawResponseEffect,
    RawResponseStore, Stage, ToolCallSpec, ToolClient, ToolPlan, ToolResponseRef,
};
use lexis_store::Database;

use crate::clients::ClientRegistry;
use crate::registry::{ClaimHandler, DeriveHandler, ExtractHandler, HandlerRegistry};

/// Per-run execution knobs.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Serve a previous run of the same plan hash from the plan cache.
    pub allow_cache: bool,
    /// Upper bound on calls running at once within a wave.
    pub max_concurrency: usize,
    /// Wall-clock budget, checked before each wave.
    pub deadline: Option<Duration>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            allow_cache: true,
            max_concurrency: 4,
            deadline: None,
        }
    }
}

/// The five storage indices a run writes to.
#[derive(Clone)]
pub struct EffectIndices {
    pub raw: Arc<dyn RawResponseStore>,
    pub extraction: Arc<dyn ExtractionStore>,
    pub derivation: Arc<dyn DerivationStore>,
    pub claim: Arc<dyn ClaimStore>,
    pub plans: Arc<dyn PlanResponseStore>,
}

impl EffectIndices {
    /// All indices backed by one SQLite database.
    pub fn from_database(db: &Database) -> Self {
        Self {
            raw: Arc::new(db.raw_responses()),
            extraction: Arc::new(db.extractions()),
            derivation: Arc::new(db.derivations()),
            claim: Arc::new(db.claims()),
            plans: Arc::new(db.plan_responses()),
        }
    }
}

/// A call that did not run because an optional fetch failed upstream of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCall {
    pub call_id: String,
    pub tool: String,
    pub stage: Stage,
    pub reason: String,
}

/// Everything one execution produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionArtifacts {
    pub executed: ExecutedPlan,
    pub raw_responses: Vec<RawResponseEffect>,
    pub extractions: Vec<ExtractionEffect>,
    pub derivations: Vec<DerivationEffect>,
    pub claims: Vec<ClaimEffect>,
    pub skipped: Vec<SkippedCall>,
}

impl ExecutionArtifacts {
    fn new(executed: ExecutedPlan) -> Self {
        Self {
            executed,
            raw_responses: Vec::new(),
            extractions: Vec::new(),
            derivations: Vec::new(),
            claims: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn push(&mut self, effect: Effect) {
        match effect {
            Effect::Raw(e) => self.raw_responses.push(e),
            Effect::Extraction(e) => self.extractions.push(e),
            Effect::Derivation(e) => self.derivations.push(e),
            Effect::Claim(e) => self.claims.push(e),
        }
    }

    pub fn from_cache(&self) -> bool {
        self.executed.from_cache
    }
}

enum CallWork {
    Fetch(Arc<dyn ToolClient>),
    Extract(ExtractHandler, RawResponseEffect),
    Derive(DeriveHandler, ExtractionEffect),
    Claim(ClaimHandler, DerivationEffect),
}

enum CallOutcome {
    Completed(Effect),
    FetchFailed {
        raw: Option<RawResponseEffect>,
        reason: String,
        error: LexisError,
    },
}

/// Execute `plan` stage by stage, persisting every effect it produces.
pub async fn execute_plan_staged(
    plan: &ToolPlan,
    clients: &ClientRegistry,
    registry: &HandlerRegistry,
    indices: &EffectIndices,
    options: &ExecutionOptions,
) -> Result<ExecutionArtifacts, LexisError> {
    let started = Instant::now();
    let plan_id = plan.plan_id().to_string();

    if options.allow_cache {
        if let Some(cached) = indices.plans.get_executed_plan(plan.plan_hash()).await? {
            tracing::info!(
                "Plan {} served from cache (hash {}, {} responses)",
                plan_id,
                plan.plan_hash(),
                cached.responses.len()
            );
            return hydrate(cached, indices).await;
        }
    }

    let waves = plan.waves()?;
    tracing::info!(
        "Executing plan {}: {} calls in {} waves",
        plan_id,
        plan.tool_calls().len(),
        waves.len()
    );

    let deadline_at = options.deadline.map(|d| started + d);
    let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
    let blockers = plan.blockers();
    let calls: HashMap<&str, &ToolCallSpec> = plan
        .tool_calls()
        .iter()
        .map(|c| (c.call_id.as_str(), c))
        .collect();

    let mut pending: BTreeSet<String> = calls.keys().map(|id| id.to_string()).collect();
    let mut produced: HashMap<String, Effect> = HashMap::new();
    let mut completed: Vec<String> = Vec::new();
    let mut skipped: HashSet<String> = HashSet::new();
    let mut responses: Vec<ToolResponseRef> = Vec::new();
    let mut artifacts = ExecutionArtifacts::new(ExecutedPlan {
        plan_id: plan_id.clone(),
        plan_hash: plan.plan_hash().to_string(),
        responses: Vec::new(),
        execution_time_ms: 0,
        from_cache: false,
    });

    while !pending.is_empty() {
        skip_blocked(&mut pending, &mut skipped, &blockers, &calls, &mut artifacts);
        if pending.is_empty() {
            break;
        }

        let ready: Vec<String> = pending
            .iter()
            .filter(|id| {
                blockers
                    .get(id.as_str())
                    .map(|b| b.iter().all(|dep| produced.contains_key(dep)))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        if ready.is_empty() {
            return Err(LexisError::Cycle {
                plan_id,
                pending: pending.into_iter().collect(),
            });
        }

        if let Some(deadline) = deadline_at {
            if Instant::now() >= deadline {
                tracing::warn!(
                    "Plan {} exceeded its deadline with {} calls pending",
                    plan_id,
                    pending.len()
                );
                return Err(LexisError::Timeout { plan_id, completed });
            }
        }

        tracing::debug!("Plan {}: starting wave {:?}", plan_id, ready);

        // Resolve the whole wave first so a wiring error aborts before any call starts.
        let mut scheduled = Vec::with_capacity(ready.len());
        for call_id in &ready {
            let Some(&call) = calls.get(call_id.as_str()) else {
                continue;
            };
            match resolve_work(&plan_id, call, &blockers, &produced, clients, registry) {
                Ok(work) => scheduled.push((call.clone(), work)),
                Err(e) if call.stage == Stage::Fetch && call.optional => {
                    tracing::warn!("Skipping optional call {}: {}", call.call_id, e);
                    pending.remove(call_id);
                    skipped.insert(call_id.clone());
                    artifacts.skipped.push(skipped_call(call, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        let mut handles = Vec::with_capacity(scheduled.len());
        for (call, work) in scheduled {
            let permit_pool = semaphore.clone();
            let indices = indices.clone();
            let plan_id = plan_id.clone();
            let call_id = call.call_id.clone();
            let handle = tokio::spawn(async move {
                let _permit = match permit_pool.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return Err(LexisError::Transport(format!("Worker pool closed: {}", e)))
                    }
                };
                run_call(&plan_id, &call, work, &indices).await
            });
            handles.push((call_id, handle));
        }

        // Let every call in the wave finish before acting on the first failure.
        let mut outcomes = Vec::with_capacity(handles.len());
        for (call_id, handle) in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(LexisError::Handler {
                    plan_id: plan_id.clone(),
                    call_id: call_id.clone(),
                    stage: calls.get(call_id.as_str()).map(|c| c.stage).unwrap_or(Stage::Fetch),
                    message: format!("Task failed: {}", e),
                }),
            };
            outcomes.push((call_id, outcome));
        }

        for (call_id, outcome) in outcomes {
            pending.remove(&call_id);
            let Some(&call) = calls.get(call_id.as_str()) else {
                continue;
            };
            match outcome? {
                CallOutcome::Completed(effect) => {
                    responses.push(ToolResponseRef {
                        tool: call.tool.clone(),
                        call_id: call_id.clone(),
                        response_id: effect.id().to_string(),
                        stage: call.stage,
                        cached: false,
                    });
                    artifacts.push(effect.clone());
                    produced.insert(call_id.clone(), effect);
                    completed.push(call_id);
                }
                CallOutcome::FetchFailed { raw, reason, error } => {
                    if let Some(raw) = raw {
                        artifacts.raw_responses.push(raw);
                    }
                    if !call.optional {
                        tracing::warn!("Required fetch {} failed: {}", call_id, reason);
                        return Err(error);
                    }
                    tracing::warn!("Optional fetch {} failed, skipping: {}", call_id, reason);
                    skipped.insert(call_id.clone());
                    artifacts.skipped.push(skipped_call(call, reason));
                }
            }
        }
    }

    let executed = ExecutedPlan {
        plan_id: plan_id.clone(),
        plan_hash: plan.plan_hash().to_string(),
        responses,
        execution_time_ms: started.elapsed().as_millis() as u64,
        from_cache: false,
    };

    if artifacts.skipped.is_empty() {
        indices.plans.save_executed_plan(&executed).await?;
    } else {
        tracing::debug!(
            "Plan {} not cached: {} calls were skipped",
            plan_id,
            artifacts.skipped.len()
        );
    }

    tracing::info!(
        "Plan {} complete in {}ms: {} responses, {} claims, {} skipped",
        plan_id,
        executed.execution_time_ms,
        executed.responses.len(),
        artifacts.claims.len(),
        artifacts.skipped.len()
    );

    artifacts.executed = executed;
    Ok(artifacts)
}

/// Drop pending calls that depend on a skipped call, transitively.
fn skip_blocked(
    pending: &mut BTreeSet<String>,
    skipped: &mut HashSet<String>,
    blockers: &HashMap<String, BTreeSet<String>>,
    calls: &HashMap<&str, &ToolCallSpec>,
    artifacts: &mut ExecutionArtifacts,
) {
    loop {
        let newly: Vec<(String, String)> = pending
            .iter()
            .filter_map(|id| {
                blockers
                    .get(id)
                    .and_then(|b| b.iter().find(|dep| skipped.contains(*dep)))
                    .map(|dep| (id.clone(), dep.clone()))
            })
            .collect();
        if newly.is_empty() {
            return;
        }
        for (id, dep) in newly {
            pending.remove(&id);
            if let Some(&call) = calls.get(id.as_str()) {
                artifacts
                    .skipped
                    .push(skipped_call(call, format!("upstream call {} was skipped", dep)));
            }
            skipped.insert(id);
        }
    }
}

fn skipped_call(call: &ToolCallSpec, reason: String) -> SkippedCall {
    SkippedCall {
        call_id: call.call_id.clone(),
        tool: call.tool.clone(),
        stage: call.stage,
        reason,
    }
}

/// Pick the upstream effect a non-fetch call consumes: the call named by its
/// `source_call_id` parameter if that ran, otherwise the first blocker at the
/// preceding stage.
fn upstream_effect<'a>(
    call: &ToolCallSpec,
    blockers: &HashMap<String, BTreeSet<String>>,
    produced: &'a HashMap<String, Effect>,
) -> Option<&'a Effect> {
    let wanted = call.stage.upstream()?;
    let named = call
        .param("source_call_id")
        .and_then(|id| produced.get(id))
        .filter(|e| e.stage() == wanted);
    named.or_else(|| {
        blockers
            .get(&call.call_id)?
            .iter()
            .filter_map(|id| produced.get(id))
            .find(|e| e.stage() == wanted)
    })
}

fn resolve_work(
    plan_id: &str,
    call: &ToolCallSpec,
    blockers: &HashMap<String, BTreeSet<String>>,
    produced: &HashMap<String, Effect>,
    clients: &ClientRegistry,
    registry: &HandlerRegistry,
) -> Result<CallWork, LexisError> {
    if call.stage == Stage::Fetch {
        return clients
            .get(&call.tool)
            .map(CallWork::Fetch)
            .ok_or_else(|| LexisError::MissingClient {
                plan_id: plan_id.to_string(),
                call_id: call.call_id.clone(),
                tool: call.tool.clone(),
            });
    }

    let missing_handler = || LexisError::MissingHandler {
        plan_id: plan_id.to_string(),
        call_id: call.call_id.clone(),
        stage: call.stage,
        tool: call.tool.clone(),
    };
    let missing_upstream = || LexisError::MissingUpstream {
        plan_id: plan_id.to_string(),
        call_id: call.call_id.clone(),
        stage: call.stage,
    };

    let upstream = upstream_effect(call, blockers, produced).ok_or_else(missing_upstream)?;
    match (call.stage, upstream) {
        (Stage::Extract, Effect::Raw(raw)) => {
            let handler = registry.extract_handler(&call.tool).ok_or_else(missing_handler)?;
            Ok(CallWork::Extract(handler, raw.clone()))
        }
        (Stage::Derive, Effect::Extraction(extraction)) => {
            let handler = registry.derive_handler(&call.tool).ok_or_else(missing_handler)?;
            Ok(CallWork::Derive(handler, extraction.clone()))
        }
        (Stage::Claim, Effect::Derivation(derivation)) => {
            let handler = registry.claim_handler(&call.tool).ok_or_else(missing_handler)?;
            Ok(CallWork::Claim(handler, derivation.clone()))
        }
        _ => Err(missing_upstream()),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

async fn run_call(
    plan_id: &str,
    call: &ToolCallSpec,
    work: CallWork,
    indices: &EffectIndices,
) -> Result<CallOutcome, LexisError> {
    let handler_err = |message: String| LexisError::Handler {
        plan_id: plan_id.to_string(),
        call_id: call.call_id.clone(),
        stage: call.stage,
        message,
    };
    let started = Instant::now();

    match work {
        CallWork::Fetch(client) => {
            let mut raw = match client.execute(&call.call_id, &call.endpoint, &call.params).await {
                Ok(raw) => raw,
                Err(e) => {
                    return Ok(CallOutcome::FetchFailed {
                        raw: None,
                        reason: e.to_string(),
                        error: LexisError::ClientFailed {
                            plan_id: plan_id.to_string(),
                            call_id: call.call_id.clone(),
                            tool: call.tool.clone(),
                            message: e.to_string(),
                        },
                    })
                }
            };
            raw.tool = call.tool.clone();
            if raw.fetch_duration_ms == 0 {
                raw.fetch_duration_ms = elapsed_ms(started);
            }
            indices.raw.save_response(&raw).await?;
            tracing::debug!(
                "Fetched {} via {} ({}): status {} in {}ms",
                call.call_id,
                call.tool,
                client.name(),
                raw.status_code,
                raw.fetch_duration_ms
            );

            if client.is_success(&raw) {
                Ok(CallOutcome::Completed(Effect::Raw(raw)))
            } else {
                Ok(CallOutcome::FetchFailed {
                    reason: format!("status {}", raw.status_code),
                    error: LexisError::FetchFailed {
                        plan_id: plan_id.to_string(),
                        call_id: call.call_id.clone(),
                        status_code: raw.status_code,
                    },
                    raw: Some(raw),
                })
            }
        }
        CallWork::Extract(handler, raw) => {
            let mut effect = handler(call, &raw).map_err(handler_err)?;
            effect.load_duration_ms = elapsed_ms(started);
            indices.extraction.save_extraction(&effect).await?;
            Ok(CallOutcome::Completed(Effect::Extraction(effect)))
        }
        CallWork::Derive(handler, extraction) => {
            let mut effect = handler(call, &extraction).map_err(handler_err)?;
            effect.derive_duration_ms = elapsed_ms(started);
            indices.derivation.save_derivation(&effect).await?;
            Ok(CallOutcome::Completed(Effect::Derivation(effect)))
        }
        CallWork::Claim(handler, derivation) => {
            let mut effect = handler(call, &derivation).map_err(handler_err)?;
            effect.load_duration_ms = elapsed_ms(started);
            indices.claim.save_claim(&effect).await?;
            Ok(CallOutcome::Completed(Effect::Claim(effect)))
        }
    }
}

/// Rebuild the artifacts of a cached run from the effect indices.
async fn hydrate(
    cached: ExecutedPlan,
    indices: &EffectIndices,
) -> Result<ExecutionArtifacts, LexisError> {
    let executed = cached.into_cached();
    let mut artifacts = ExecutionArtifacts::new(executed.clone());

    for r in &executed.responses {
        let effect = match r.stage {
            Stage::Fetch => indices.raw.get_response(&r.response_id).await?.map(Effect::Raw),
            Stage::Extract => indices
                .extraction
                .get_extraction(&r.response_id)
                .await?
                .map(Effect::Extraction),
            Stage::Derive => indices
                .derivation
                .get_derivation(&r.response_id)
                .await?
                .map(Effect::Derivation),
            Stage::Claim => indices.claim.get_claim(&r.response_id).await?.map(Effect::Claim),
        };
        match effect {
            Some(effect) => artifacts.push(effect),
            None => tracing::warn!(
                "Cached plan {} references missing {} effect {}",
                executed.plan_id,
                r.stage,
                r.response_id
            ),
        }
    }

    Ok(artifacts)
}
