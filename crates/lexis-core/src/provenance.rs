// crates/lexis-core/src/provenance.rs

use serde::{Deserialize, Serialize};

use crate::plan::Stage;

/// One upstream reference in an effect's provenance chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceLink {
    pub stage: Stage,
    pub tool: String,
    /// ID of the effect produced at `stage` (response, extraction, derivation or claim ID).
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ProvenanceLink {
    pub fn new(stage: Stage, tool: impl Into<String>, reference_id: impl Into<String>) -> Self {
        Self {
            stage,
            tool: tool.into(),
            reference_id: reference_id.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Return `upstream` with `link` appended. Chains only ever grow.
pub fn extend_chain(upstream: &[ProvenanceLink], link: ProvenanceLink) -> Vec<ProvenanceLink> {
    let mut chain = Vec::with_capacity(upstream.len() + 1);
    chain.extend_from_slice(upstream);
    chain.push(link);
    chain
}
