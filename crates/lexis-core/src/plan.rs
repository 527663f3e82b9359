// crates/lexis-core/src/plan.rs
//
// Plan data model: the four pipeline stages, tool calls, dependency edges,
// the frozen ToolPlan and the ExecutedPlan summary of one run.
//
// Dependency edges point from the blocking call to the blocked call:
//   fetch --> extract --> derive --> claim

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LexisError;
use crate::hashing;
use crate::query::NormalizedQuery;

/// The fixed pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Extract,
    Derive,
    Claim,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Derive => "derive",
            Stage::Claim => "claim",
        }
    }

    /// The stage whose effect this stage consumes. `None` for fetch.
    pub fn upstream(&self) -> Option<Stage> {
        match self {
            Stage::Fetch => None,
            Stage::Extract => Some(Stage::Fetch),
            Stage::Derive => Some(Stage::Extract),
            Stage::Claim => Some(Stage::Derive),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = LexisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetch" => Ok(Stage::Fetch),
            "extract" => Ok(Stage::Extract),
            "derive" => Ok(Stage::Derive),
            "claim" => Ok(Stage::Claim),
            other => Err(LexisError::Serialization(format!("Unknown stage: {}", other))),
        }
    }
}

/// One planned tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallSpec {
    /// Stage-namespaced tool identifier (e.g. `fetch.diogenes`, `extract.diogenes.html`).
    pub tool: String,
    /// Unique within the owning plan.
    pub call_id: String,
    /// Network URI, executable path, file path, or an internal `lexis://` pseudo-URI.
    pub endpoint: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    pub stage: Stage,
    #[serde(default)]
    pub priority: i32,
    /// A failing optional fetch is skipped instead of aborting the plan.
    #[serde(default)]
    pub optional: bool,
    /// MIME type the call is expected to produce (e.g. "text/html", "application/json").
    #[serde(default)]
    pub expected_response_type: String,
}

impl ToolCallSpec {
    pub fn new(
        stage: Stage,
        tool: impl Into<String>,
        call_id: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            call_id: call_id.into(),
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
            stage,
            priority: 0,
            optional: false,
            expected_response_type: String::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn expecting(mut self, response_type: impl Into<String>) -> Self {
        self.expected_response_type = response_type.into();
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// `from_call_id` must complete before `to_call_id` may start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDependency {
    pub from_call_id: String,
    pub to_call_id: String,
    #[serde(default)]
    pub rationale: Option<String>,
}

impl PlanDependency {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_call_id: from.into(),
            to_call_id: to.into(),
            rationale: None,
        }
    }

    pub fn because(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

/// The full set of calls needed to answer one normalized query.
///
/// Immutable after construction: the plan hash is computed once in
/// [`ToolPlan::new`] and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPlan {
    plan_id: String,
    plan_hash: String,
    query: NormalizedQuery,
    tool_calls: Vec<ToolCallSpec>,
    dependencies: Vec<PlanDependency>,
}

impl ToolPlan {
    /// Build a plan with a fresh `plan_id` and freeze its hash.
    pub fn new(
        query: NormalizedQuery,
        tool_calls: Vec<ToolCallSpec>,
        dependencies: Vec<PlanDependency>,
    ) -> Self {
        let plan_hash = compute_plan_hash(&query, &tool_calls, &dependencies);
        Self {
            plan_id: format!("plan-{}", Uuid::now_v7()),
            plan_hash,
            query,
            tool_calls,
            dependencies,
        }
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn plan_hash(&self) -> &str {
        &self.plan_hash
    }

    pub fn query(&self) -> &NormalizedQuery {
        &self.query
    }

    pub fn tool_calls(&self) -> &[ToolCallSpec] {
        &self.tool_calls
    }

    pub fn dependencies(&self) -> &[PlanDependency] {
        &self.dependencies
    }

    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty()
    }

    pub fn call(&self, call_id: &str) -> Option<&ToolCallSpec> {
        self.tool_calls.iter().find(|c| c.call_id == call_id)
    }

    pub fn calls_in_stage(&self, stage: Stage) -> impl Iterator<Item = &ToolCallSpec> {
        self.tool_calls.iter().filter(move |c| c.stage == stage)
    }

    /// Map every call to the set of call IDs that must complete before it.
    /// Calls without incoming edges map to an empty set.
    pub fn blockers(&self) -> HashMap<String, BTreeSet<String>> {
        let mut map: HashMap<String, BTreeSet<String>> = self
            .tool_calls
            .iter()
            .map(|c| (c.call_id.clone(), BTreeSet::new()))
            .collect();
        for dep in &self.dependencies {
            map.entry(dep.to_call_id.clone())
                .or_default()
                .insert(dep.from_call_id.clone());
        }
        map
    }

    /// Check structural soundness and return the topological layers ("waves").
    ///
    /// Each wave is sorted by `call_id`. Fails on duplicate call IDs, edges
    /// referencing unknown calls, and dependency cycles.
    pub fn waves(&self) -> Result<Vec<Vec<String>>, LexisError> {
        let mut seen = HashSet::new();
        for call in &self.tool_calls {
            if !seen.insert(call.call_id.as_str()) {
                return Err(LexisError::DuplicateCallId {
                    plan_id: self.plan_id.clone(),
                    call_id: call.call_id.clone(),
                });
            }
        }
        for dep in &self.dependencies {
            for id in [&dep.from_call_id, &dep.to_call_id] {
                if !seen.contains(id.as_str()) {
                    return Err(LexisError::UnknownDependency {
                        plan_id: self.plan_id.clone(),
                        call_id: id.clone(),
                    });
                }
            }
        }

        let mut pending = self.blockers();
        let mut done: HashSet<String> = HashSet::new();
        let mut waves = Vec::new();

        while !pending.is_empty() {
            let mut wave: Vec<String> = pending
                .iter()
                .filter(|(_, blockers)| blockers.iter().all(|b| done.contains(b)))
                .map(|(id, _)| id.clone())
                .collect();

            if wave.is_empty() {
                let mut stuck: Vec<String> = pending.into_keys().collect();
                stuck.sort();
                return Err(LexisError::Cycle {
                    plan_id: self.plan_id.clone(),
                    pending: stuck,
                });
            }

            wave.sort();
            for id in &wave {
                pending.remove(id);
                done.insert(id.clone());
            }
            waves.push(wave);
        }

        Ok(waves)
    }
}

fn compute_plan_hash(
    query: &NormalizedQuery,
    tool_calls: &[ToolCallSpec],
    dependencies: &[PlanDependency],
) -> String {
    let mut calls: Vec<_> = tool_calls
        .iter()
        .map(|c| {
            serde_json::json!({
                "tool": c.tool,
                "call_id": c.call_id,
                "endpoint": c.endpoint,
                "params": c.params,
                "stage": c.stage.as_str(),
                "optional": c.optional,
            })
        })
        .collect();
    calls.sort_by(|a, b| a["call_id"].as_str().cmp(&b["call_id"].as_str()));

    let mut edges: Vec<(&str, &str)> = dependencies
        .iter()
        .map(|d| (d.from_call_id.as_str(), d.to_call_id.as_str()))
        .collect();
    edges.sort();

    let material = serde_json::json!({
        "query": query.identity(),
        "calls": calls,
        "dependencies": edges,
    });

    hashing::stable_digest(&material).unwrap_or_else(|_| hashing::random_effect_id("plan"))
}

/// Reference to the effect one executed call produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponseRef {
    pub tool: String,
    pub call_id: String,
    /// ID of the produced effect (response, extraction, derivation or claim ID).
    pub response_id: String,
    /// Stage of the call, i.e. which index holds `response_id`.
    pub stage: Stage,
    pub cached: bool,
}

/// Externally visible summary of one plan execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedPlan {
    pub plan_id: String,
    pub plan_hash: String,
    pub responses: Vec<ToolResponseRef>,
    pub execution_time_ms: u64,
    pub from_cache: bool,
}

impl ExecutedPlan {
    /// Mark this summary and every reference as served from the plan cache.
    pub fn into_cached(mut self) -> Self {
        self.from_cache = true;
        for r in &mut self.responses {
            r.cached = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CanonicalCandidate, Language};

    fn query() -> NormalizedQuery {
        NormalizedQuery::new("lupus", Language::Latin, vec![CanonicalCandidate::new("lupus")])
    }

    fn chain() -> (Vec<ToolCallSpec>, Vec<PlanDependency>) {
        let calls = vec![
            ToolCallSpec::new(Stage::Fetch, "fetch.a", "a", "http://a"),
            ToolCallSpec::new(Stage::Extract, "extract.a", "a/extract", "lexis://extract"),
            ToolCallSpec::new(Stage::Derive, "derive.a", "a/derive", "lexis://derive"),
        ];
        let deps = vec![
            PlanDependency::new("a", "a/extract"),
            PlanDependency::new("a/extract", "a/derive"),
        ];
        (calls, deps)
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::Fetch.upstream(), None);
        assert_eq!(Stage::Claim.upstream(), Some(Stage::Derive));
        assert_eq!("extract".parse::<Stage>().unwrap(), Stage::Extract);
        assert!("load".parse::<Stage>().is_err());
    }

    #[test]
    fn test_plan_hash_stable_across_builds() {
        let (calls, deps) = chain();
        let a = ToolPlan::new(query(), calls.clone(), deps.clone());
        let b = ToolPlan::new(query(), calls.into_iter().rev().collect(), deps);
        assert_ne!(a.plan_id(), b.plan_id());
        assert_eq!(a.plan_hash(), b.plan_hash());
    }

    #[test]
    fn test_plan_hash_changes_with_query() {
        let (calls, deps) = chain();
        let a = ToolPlan::new(query(), calls.clone(), deps.clone());
        let other = NormalizedQuery::new("lupa", Language::Latin, vec![CanonicalCandidate::new("lupa")]);
        let b = ToolPlan::new(other, calls, deps);
        assert_ne!(a.plan_hash(), b.plan_hash());
    }

    #[test]
    fn test_waves_follow_dependencies() {
        let (calls, deps) = chain();
        let plan = ToolPlan::new(query(), calls, deps);
        let waves = plan.waves().unwrap();
        assert_eq!(
            waves,
            vec![
                vec!["a".to_string()],
                vec!["a/extract".to_string()],
                vec!["a/derive".to_string()],
            ]
        );
    }

    #[test]
    fn test_waves_detect_cycle() {
        let calls = vec![
            ToolCallSpec::new(Stage::Fetch, "fetch.a", "A", "http://a"),
            ToolCallSpec::new(Stage::Extract, "extract.a", "B", "lexis://extract"),
            ToolCallSpec::new(Stage::Fetch, "fetch.c", "C", "http://c"),
        ];
        let deps = vec![PlanDependency::new("A", "B"), PlanDependency::new("B", "A")];
        let plan = ToolPlan::new(query(), calls, deps);
        match plan.waves() {
            Err(LexisError::Cycle { pending, .. }) => {
                assert_eq!(pending, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("Expected cycle error, got: {:?}", other),
        }
    }

    #[test]
    fn test_waves_reject_duplicates_and_unknown_edges() {
        let calls = vec![
            ToolCallSpec::new(Stage::Fetch, "fetch.a", "a", "http://a"),
            ToolCallSpec::new(Stage::Fetch, "fetch.b", "a", "http://b"),
        ];
        let plan = ToolPlan::new(query(), calls, vec![]);
        assert!(matches!(plan.waves(), Err(LexisError::DuplicateCallId { .. })));

        let calls = vec![ToolCallSpec::new(Stage::Fetch, "fetch.a", "a", "http://a")];
        let plan = ToolPlan::new(query(), calls, vec![PlanDependency::new("a", "ghost")]);
        assert!(matches!(plan.waves(), Err(LexisError::UnknownDependency { .. })));
    }

    #[test]
    fn test_empty_plan_has_no_waves() {
        let plan = ToolPlan::new(query(), vec![], vec![]);
        assert!(plan.is_empty());
        assert!(plan.waves().unwrap().is_empty());
    }

    #[test]
    fn test_into_cached_marks_refs() {
        let executed = ExecutedPlan {
            plan_id: "p".to_string(),
            plan_hash: "h".to_string(),
            responses: vec![ToolResponseRef {
                tool: "fetch.a".to_string(),
                call_id: "a".to_string(),
                response_id: "raw-1".to_string(),
                stage: Stage::Fetch,
                cached: false,
            }],
            execution_time_ms: 3,
            from_cache: false,
        }
        .into_cached();
        assert!(executed.from_cache);
        assert!(executed.responses.iter().all(|r| r.cached));
    }
}
