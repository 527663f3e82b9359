// crates/lexis-engine/src/planner.rs
//
// Builds a ToolPlan from a normalized query.
//
// Each canonical candidate fans out into one fetch per configured backend for
// the query's language, and every fetch is followed by a linear
// extract -> derive -> claim chain:
//
//   diogenes-0 --> diogenes-0/extract --> diogenes-0/derive --> diogenes-0/claim
//
// Backends without a configured endpoint are left out of the plan.

use serde::{Deserialize, Serialize};

use lexis_core::{
    CanonicalCandidate, Language, NormalizedQuery, PlanDependency, Stage, ToolCallSpec, ToolPlan,
};

/// Dictionary backends the planner knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Diogenes Perseus CGI (Latin and Greek).
    Diogenes,
    /// Whitaker's Words binary (Latin).
    Whitakers,
    /// Sanskrit Heritage Platform search CGI.
    Heritage,
    /// Cologne Digital Sanskrit Lexicon entries on disk.
    Cdsl,
}

impl Backend {
    pub const ALL: [Backend; 4] = [
        Backend::Diogenes,
        Backend::Whitakers,
        Backend::Heritage,
        Backend::Cdsl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Diogenes => "diogenes",
            Backend::Whitakers => "whitakers",
            Backend::Heritage => "heritage",
            Backend::Cdsl => "cdsl",
        }
    }

    fn format(&self) -> &'static str {
        match self {
            Backend::Diogenes | Backend::Heritage => "html",
            Backend::Whitakers => "text",
            Backend::Cdsl => "xml",
        }
    }

    pub fn response_type(&self) -> &'static str {
        match self {
            Backend::Diogenes | Backend::Heritage => "text/html",
            Backend::Whitakers => "text/plain",
            Backend::Cdsl => "application/xml",
        }
    }

    pub fn fetch_tool(&self) -> String {
        format!("fetch.{}", self.name())
    }

    pub fn extract_tool(&self) -> String {
        format!("extract.{}.{}", self.name(), self.format())
    }

    pub fn derive_tool(&self) -> String {
        format!("derive.{}.lemmas", self.name())
    }

    pub fn claim_tool(&self) -> String {
        format!("claim.{}.lemmas", self.name())
    }

    /// Backends consulted for a language, in plan order.
    pub fn for_language(language: Language) -> &'static [Backend] {
        match language {
            Language::Latin => &[Backend::Diogenes, Backend::Whitakers],
            Language::Greek => &[Backend::Diogenes],
            Language::Sanskrit => &[Backend::Heritage, Backend::Cdsl],
        }
    }
}

fn default_max_candidates() -> usize {
    1
}

/// Backend endpoints and fan-out limits used when building plans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Diogenes Perseus.cgi URL.
    #[serde(default)]
    pub diogenes_url: Option<String>,
    /// Heritage sktsearch CGI URL.
    #[serde(default)]
    pub heritage_url: Option<String>,
    /// Path to the Whitaker's Words executable.
    #[serde(default)]
    pub whitakers_path: Option<String>,
    /// Directory holding CDSL entry files.
    #[serde(default)]
    pub cdsl_dir: Option<String>,
    /// How many canonical candidates to plan calls for.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            diogenes_url: None,
            heritage_url: None,
            whitakers_path: None,
            cdsl_dir: None,
            max_candidates: default_max_candidates(),
        }
    }
}

impl PlannerConfig {
    /// The endpoint configured for `backend`, if any.
    pub fn endpoint(&self, backend: Backend) -> Option<&str> {
        let value = match backend {
            Backend::Diogenes => &self.diogenes_url,
            Backend::Whitakers => &self.whitakers_path,
            Backend::Heritage => &self.heritage_url,
            Backend::Cdsl => &self.cdsl_dir,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }
}

/// Turns normalized queries into executable plans.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Build the plan for `query`. A query with no candidates, or with no
    /// configured backend for its language, yields an empty plan.
    pub fn build(&self, query: &NormalizedQuery) -> ToolPlan {
        let mut calls = Vec::new();
        let mut deps = Vec::new();

        let limit = self.config.max_candidates.max(1);
        for (index, candidate) in query.candidates.iter().take(limit).enumerate() {
            for &backend in Backend::for_language(query.language) {
                let Some(endpoint) = self.config.endpoint(backend) else {
                    continue;
                };
                let fetch = fetch_call(backend, endpoint, query.language, index, candidate);
                push_chain(&mut calls, &mut deps, backend, fetch, &candidate.lemma);
            }
        }

        let plan = ToolPlan::new(query.clone(), calls, deps);
        tracing::debug!(
            "Planned {} calls for '{}' ({}): plan {} hash {}",
            plan.tool_calls().len(),
            query.original,
            query.language,
            plan.plan_id(),
            plan.plan_hash()
        );
        plan
    }
}

fn fetch_call(
    backend: Backend,
    endpoint: &str,
    language: Language,
    index: usize,
    candidate: &CanonicalCandidate,
) -> ToolCallSpec {
    let call_id = format!("{}-{}", backend.name(), index);
    let call = ToolCallSpec::new(Stage::Fetch, backend.fetch_tool(), call_id, endpoint)
        .expecting(backend.response_type());

    match backend {
        Backend::Diogenes => {
            let (lang, query) = match language {
                Language::Greek => ("grk", candidate.encoded_or_lemma("betacode")),
                _ => ("lat", candidate.lemma.as_str()),
            };
            call.with_param("do", "parse")
                .with_param("lang", lang)
                .with_param("q", query)
                .with_priority(10)
        }
        Backend::Whitakers => call
            .with_param("arg0", candidate.lemma.as_str())
            .with_priority(5)
            .optional(true),
        Backend::Heritage => call
            .with_param("q", candidate.encoded_or_lemma("velthuis"))
            .with_param("t", "VH")
            .with_param("lex", "MW")
            .with_priority(10),
        Backend::Cdsl => {
            let key = candidate.encoded_or_lemma("slp1");
            call.with_param("key", key)
                .with_param("file", format!("{}.xml", key))
                .with_priority(5)
                .optional(true)
        }
    }
}

fn push_chain(
    calls: &mut Vec<ToolCallSpec>,
    deps: &mut Vec<PlanDependency>,
    backend: Backend,
    fetch: ToolCallSpec,
    lemma: &str,
) {
    let fetch_id = fetch.call_id.clone();
    let optional = fetch.optional;
    let priority = fetch.priority;

    let chain = [
        (Stage::Extract, backend.extract_tool(), "application/json"),
        (Stage::Derive, backend.derive_tool(), "application/json"),
        (Stage::Claim, backend.claim_tool(), "application/json"),
    ];

    calls.push(fetch);
    let mut previous = fetch_id.clone();
    for (stage, tool, response_type) in chain {
        let call_id = format!("{}/{}", fetch_id, stage);
        let endpoint = format!("lexis://{}/{}", stage, tool);
        calls.push(
            ToolCallSpec::new(stage, tool, call_id.clone(), endpoint)
                .with_param("source_call_id", previous.clone())
                .with_param("lemma", lemma)
                .with_priority(priority)
                .optional(optional)
                .expecting(response_type),
        );
        deps.push(
            PlanDependency::new(previous, call_id.clone())
                .because(format!("{} consumes the {} effect", stage, stage_before(stage))),
        );
        previous = call_id;
    }
}

fn stage_before(stage: Stage) -> &'static str {
    stage.upstream().map(|s| s.as_str()).unwrap_or("query")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latin_config() -> PlannerConfig {
        PlannerConfig {
            diogenes_url: Some("http://localhost:8888/Perseus.cgi".to_string()),
            whitakers_path: Some("/usr/local/bin/words".to_string()),
            ..PlannerConfig::default()
        }
    }

    fn lupus() -> NormalizedQuery {
        NormalizedQuery::new("lupus", Language::Latin, vec![CanonicalCandidate::new("lupus")])
    }

    #[test]
    fn latin_plan_has_two_full_chains() {
        let plan = Planner::new(latin_config()).build(&lupus());
        assert_eq!(plan.tool_calls().len(), 8);
        assert_eq!(plan.dependencies().len(), 6);

        let fetch = plan.call("diogenes-0").unwrap();
        assert_eq!(fetch.tool, "fetch.diogenes");
        assert_eq!(fetch.param("lang"), Some("lat"));
        assert_eq!(fetch.param("q"), Some("lupus"));
        assert!(!fetch.optional);

        let words = plan.call("whitakers-0").unwrap();
        assert_eq!(words.param("arg0"), Some("lupus"));
        assert!(words.optional);

        let claim = plan.call("diogenes-0/claim").unwrap();
        assert_eq!(claim.tool, "claim.diogenes.lemmas");
        assert_eq!(claim.param("source_call_id"), Some("diogenes-0/derive"));
        assert_eq!(claim.param("lemma"), Some("lupus"));

        let waves = plan.waves().unwrap();
        assert_eq!(waves.len(), 4);
        assert_eq!(waves[0], vec!["diogenes-0".to_string(), "whitakers-0".to_string()]);
    }

    #[test]
    fn unconfigured_backends_are_skipped() {
        let config = PlannerConfig {
            diogenes_url: Some("http://localhost:8888/Perseus.cgi".to_string()),
            ..PlannerConfig::default()
        };
        let plan = Planner::new(config).build(&lupus());
        assert_eq!(plan.tool_calls().len(), 4);
        assert!(plan.call("whitakers-0").is_none());

        let empty = Planner::default().build(&lupus());
        assert!(empty.is_empty());
    }

    #[test]
    fn greek_uses_betacode_encoding() {
        let query = NormalizedQuery::new(
            "λόγος",
            Language::Greek,
            vec![CanonicalCandidate::new("λόγος").with_encoding("betacode", "lo/gos")],
        );
        let plan = Planner::new(latin_config()).build(&query);
        let fetch = plan.call("diogenes-0").unwrap();
        assert_eq!(fetch.param("lang"), Some("grk"));
        assert_eq!(fetch.param("q"), Some("lo/gos"));
        assert!(plan.call("whitakers-0").is_none());
    }

    #[test]
    fn sanskrit_plans_heritage_and_cdsl() {
        let config = PlannerConfig {
            heritage_url: Some("http://localhost:48080/cgi-bin/skt/sktsearch".to_string()),
            cdsl_dir: Some("/srv/cdsl/mw".to_string()),
            ..PlannerConfig::default()
        };
        let query = NormalizedQuery::new(
            "agni",
            Language::Sanskrit,
            vec![CanonicalCandidate::new("agni").with_encoding("slp1", "agni")],
        );
        let plan = Planner::new(config).build(&query);
        assert_eq!(plan.call("heritage-0").unwrap().param("q"), Some("agni"));
        let cdsl = plan.call("cdsl-0").unwrap();
        assert_eq!(cdsl.param("file"), Some("agni.xml"));
        assert!(cdsl.optional);
        assert_eq!(plan.call("cdsl-0/extract").unwrap().tool, "extract.cdsl.xml");
    }

    #[test]
    fn candidates_fan_out_up_to_limit() {
        let mut config = latin_config();
        config.whitakers_path = None;
        config.max_candidates = 2;
        let query = NormalizedQuery::new(
            "amor",
            Language::Latin,
            vec![
                CanonicalCandidate::new("amor"),
                CanonicalCandidate::new("amo"),
                CanonicalCandidate::new("amoris"),
            ],
        );
        let plan = Planner::new(config).build(&query);
        assert_eq!(plan.calls_in_stage(Stage::Fetch).count(), 2);
        assert_eq!(plan.call("diogenes-1").unwrap().param("q"), Some("amo"));
        assert!(plan.call("diogenes-2").is_none());
    }

    #[test]
    fn same_query_same_hash() {
        let planner = Planner::new(latin_config());
        let a = planner.build(&lupus());
        let b = planner.build(&lupus());
        assert_ne!(a.plan_id(), b.plan_id());
        assert_eq!(a.plan_hash(), b.plan_hash());
    }
}
