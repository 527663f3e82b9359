// crates/lexis-core/src/effects.rs
//
// Immutable records of what each executed call produced.
//
//   RawResponseEffect --> ExtractionEffect --> DerivationEffect --> ClaimEffect
//
// Raw responses get a fresh ID per execution. Every later effect ID is a
// stable hash of (call_id, upstream effect ID), so re-running a handler on the
// same upstream effect overwrites the same row.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hashing::{random_effect_id, stable_effect_id};
use crate::plan::{Stage, ToolCallSpec};
use crate::provenance::{extend_chain, ProvenanceLink};

pub const RAW_ID_PREFIX: &str = "raw";
pub const EXTRACTION_ID_PREFIX: &str = "ext";
pub const DERIVATION_ID_PREFIX: &str = "drv";
pub const CLAIM_ID_PREFIX: &str = "clm";

/// Raw bytes and transport metadata captured by a tool client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponseEffect {
    pub response_id: String,
    pub tool: String,
    pub call_id: String,
    pub endpoint: String,
    /// HTTP status, process exit code, or a file-read status.
    pub status_code: i32,
    pub content_type: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Vec<u8>,
    pub fetch_duration_ms: u64,
}

impl RawResponseEffect {
    /// Start a raw response with a freshly generated `response_id`.
    /// The executor stamps `tool` from the call before persisting.
    pub fn new(call_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            response_id: random_effect_id(RAW_ID_PREFIX),
            tool: String::new(),
            call_id: call_id.into(),
            endpoint: endpoint.into(),
            status_code: 0,
            content_type: String::new(),
            headers: BTreeMap::new(),
            body: Vec::new(),
            fetch_duration_ms: 0,
        }
    }

    pub fn with_status(mut self, status_code: i32) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn provenance_link(&self) -> ProvenanceLink {
        ProvenanceLink::new(Stage::Fetch, &self.tool, &self.response_id)
            .with_metadata(serde_json::json!({ "status_code": self.status_code }))
    }
}

/// Structured data pulled out of one raw response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionEffect {
    pub extraction_id: String,
    pub tool: String,
    pub call_id: String,
    /// The fetch call whose response was consumed.
    pub source_call_id: String,
    pub response_id: String,
    pub kind: String,
    #[serde(default)]
    pub canonical: Option<String>,
    pub payload: serde_json::Value,
    /// Fetch link followed by this extraction's own link.
    #[serde(default)]
    pub provenance_chain: Vec<ProvenanceLink>,
    pub load_duration_ms: u64,
}

impl ExtractionEffect {
    pub fn new(
        call: &ToolCallSpec,
        raw: &RawResponseEffect,
        kind: impl Into<String>,
        canonical: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        let extraction_id = Self::id_for(&call.call_id, &raw.response_id);
        let provenance_chain = vec![
            raw.provenance_link(),
            ProvenanceLink::new(Stage::Extract, &call.tool, &extraction_id),
        ];
        Self {
            extraction_id,
            tool: call.tool.clone(),
            call_id: call.call_id.clone(),
            source_call_id: raw.call_id.clone(),
            response_id: raw.response_id.clone(),
            kind: kind.into(),
            canonical,
            payload,
            provenance_chain,
            load_duration_ms: 0,
        }
    }

    /// Stable extraction ID for `(call_id, response_id)`.
    pub fn id_for(call_id: &str, response_id: &str) -> String {
        stable_effect_id(EXTRACTION_ID_PREFIX, &(call_id, response_id))
    }
}

/// A normalized interpretation derived from one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivationEffect {
    pub derivation_id: String,
    pub tool: String,
    pub call_id: String,
    pub source_call_id: String,
    pub extraction_id: String,
    pub kind: String,
    #[serde(default)]
    pub canonical: Option<String>,
    pub payload: serde_json::Value,
    pub provenance_chain: Vec<ProvenanceLink>,
    pub derive_duration_ms: u64,
}

impl DerivationEffect {
    pub fn new(
        call: &ToolCallSpec,
        extraction: &ExtractionEffect,
        kind: impl Into<String>,
        canonical: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        let derivation_id = Self::id_for(&call.call_id, &extraction.extraction_id);
        let provenance_chain = extend_chain(
            &extraction.provenance_chain,
            ProvenanceLink::new(Stage::Derive, &call.tool, &derivation_id),
        );
        Self {
            derivation_id,
            tool: call.tool.clone(),
            call_id: call.call_id.clone(),
            source_call_id: extraction.call_id.clone(),
            extraction_id: extraction.extraction_id.clone(),
            kind: kind.into(),
            canonical,
            payload,
            provenance_chain,
            derive_duration_ms: 0,
        }
    }

    /// Stable derivation ID for `(call_id, extraction_id)`.
    pub fn id_for(call_id: &str, extraction_id: &str) -> String {
        stable_effect_id(DERIVATION_ID_PREFIX, &(call_id, extraction_id))
    }
}

/// A subject/predicate/value assertion backed by a derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimEffect {
    pub claim_id: String,
    pub tool: String,
    pub call_id: String,
    pub source_call_id: String,
    pub derivation_id: String,
    pub subject: String,
    pub predicate: String,
    pub value: serde_json::Value,
    pub provenance_chain: Vec<ProvenanceLink>,
    pub load_duration_ms: u64,
}

impl ClaimEffect {
    pub fn new(
        call: &ToolCallSpec,
        derivation: &DerivationEffect,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        let claim_id = Self::id_for(&call.call_id, &derivation.derivation_id);
        let provenance_chain = extend_chain(
            &derivation.provenance_chain,
            ProvenanceLink::new(Stage::Claim, &call.tool, &claim_id),
        );
        Self {
            claim_id,
            tool: call.tool.clone(),
            call_id: call.call_id.clone(),
            source_call_id: derivation.call_id.clone(),
            derivation_id: derivation.derivation_id.clone(),
            subject: subject.into(),
            predicate: predicate.into(),
            value,
            provenance_chain,
            load_duration_ms: 0,
        }
    }

    /// Stable claim ID for `(call_id, derivation_id)`.
    pub fn id_for(call_id: &str, derivation_id: &str) -> String {
        stable_effect_id(CLAIM_ID_PREFIX, &(call_id, derivation_id))
    }
}

/// Any effect, tagged by the stage that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Raw(RawResponseEffect),
    Extraction(ExtractionEffect),
    Derivation(DerivationEffect),
    Claim(ClaimEffect),
}

impl Effect {
    /// The effect's own identifier.
    pub fn id(&self) -> &str {
        match self {
            Effect::Raw(e) => &e.response_id,
            Effect::Extraction(e) => &e.extraction_id,
            Effect::Derivation(e) => &e.derivation_id,
            Effect::Claim(e) => &e.claim_id,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Effect::Raw(_) => Stage::Fetch,
            Effect::Extraction(_) => Stage::Extract,
            Effect::Derivation(_) => Stage::Derive,
            Effect::Claim(_) => Stage::Claim,
        }
    }

    pub fn tool(&self) -> &str {
        match self {
            Effect::Raw(e) => &e.tool,
            Effect::Extraction(e) => &e.tool,
            Effect::Derivation(e) => &e.tool,
            Effect::Claim(e) => &e.tool,
        }
    }

    pub fn call_id(&self) -> &str {
        match self {
            Effect::Raw(e) => &e.call_id,
            Effect::Extraction(e) => &e.call_id,
            Effect::Derivation(e) => &e.call_id,
            Effect::Claim(e) => &e.call_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawResponseEffect {
        let mut raw = RawResponseEffect::new("diogenes-0", "http://localhost:8888/Perseus.cgi")
            .with_status(200)
            .with_content_type("text/html")
            .with_body(b"<b>lupus</b>".to_vec());
        raw.tool = "fetch.diogenes".to_string();
        raw
    }

    fn call(stage: Stage, tool: &str, id: &str) -> ToolCallSpec {
        ToolCallSpec::new(stage, tool, id, format!("lexis://{}", stage))
    }

    #[test]
    fn test_raw_response_ids_are_fresh() {
        let a = RawResponseEffect::new("c", "e");
        let b = RawResponseEffect::new("c", "e");
        assert_ne!(a.response_id, b.response_id);
        assert!(a.response_id.starts_with("raw-"));
    }

    #[test]
    fn test_extraction_id_is_stable() {
        let raw = raw();
        let extract = call(Stage::Extract, "extract.diogenes.html", "diogenes-0/extract");
        let a = ExtractionEffect::new(&extract, &raw, "tokens", None, serde_json::json!({}));
        let b = ExtractionEffect::new(&extract, &raw, "other", None, serde_json::json!({"x": 1}));
        assert_eq!(a.extraction_id, b.extraction_id);
        assert_eq!(a.extraction_id, ExtractionEffect::id_for(&extract.call_id, &raw.response_id));

        let other_raw = RawResponseEffect::new("diogenes-0", "http://localhost:8888/Perseus.cgi");
        let c = ExtractionEffect::new(&extract, &other_raw, "tokens", None, serde_json::json!({}));
        assert_ne!(a.extraction_id, c.extraction_id);
    }

    #[test]
    fn test_chain_grows_stage_by_stage() {
        let raw = raw();
        let extraction = ExtractionEffect::new(
            &call(Stage::Extract, "extract.diogenes.html", "d/extract"),
            &raw,
            "tokens",
            None,
            serde_json::json!({}),
        );
        let derivation = DerivationEffect::new(
            &call(Stage::Derive, "derive.diogenes.lemmas", "d/derive"),
            &extraction,
            "lemmas",
            None,
            serde_json::json!({}),
        );
        let claim = ClaimEffect::new(
            &call(Stage::Claim, "claim.diogenes.lemmas", "d/claim"),
            &derivation,
            "lupus",
            "has_lemmas",
            serde_json::json!({"lemmas": []}),
        );

        let stages: Vec<Stage> = claim.provenance_chain.iter().map(|l| l.stage).collect();
        assert_eq!(stages, vec![Stage::Fetch, Stage::Extract, Stage::Derive, Stage::Claim]);
        assert_eq!(claim.provenance_chain[0].reference_id, raw.response_id);
        assert_eq!(claim.provenance_chain[1].reference_id, extraction.extraction_id);
        assert_eq!(claim.provenance_chain[2].reference_id, derivation.derivation_id);
        assert_eq!(claim.source_call_id, "d/derive");
        assert!(claim.claim_id.starts_with("clm-"));
    }
}
