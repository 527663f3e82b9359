// crates/lexis-engine/src/provenance.rs
//
// Walks a claim back to the raw response it ultimately rests on by following
// the upstream IDs stored on each effect.

use serde::Serialize;

use lexis_core::{ClaimEffect, DerivationEffect, ExtractionEffect, LexisError, RawResponseEffect};

use crate::executor::EffectIndices;

/// A claim together with every upstream effect still present in the indices.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimTrace {
    pub claim: ClaimEffect,
    pub derivation: Option<DerivationEffect>,
    pub extraction: Option<ExtractionEffect>,
    pub raw_response: Option<RawResponseEffect>,
}

impl ClaimTrace {
    /// True when every link down to the raw response was found.
    pub fn is_complete(&self) -> bool {
        self.derivation.is_some() && self.extraction.is_some() && self.raw_response.is_some()
    }
}

/// Load `claim_id` and its derivation, extraction and raw response.
///
/// Fails with `NotFound` only when the claim itself is missing; a broken link
/// further up leaves the remaining fields `None`.
pub async fn trace_claim(claim_id: &str, indices: &EffectIndices) -> Result<ClaimTrace, LexisError> {
    let claim = indices
        .claim
        .get_claim(claim_id)
        .await?
        .ok_or_else(|| LexisError::NotFound(format!("Claim {}", claim_id)))?;

    let derivation = indices.derivation.get_derivation(&claim.derivation_id).await?;
    let extraction = match &derivation {
        Some(d) => indices.extraction.get_extraction(&d.extraction_id).await?,
        None => None,
    };
    let raw_response = match &extraction {
        Some(e) => indices.raw.get_response(&e.response_id).await?,
        None => None,
    };

    if raw_response.is_none() {
        tracing::warn!("Provenance of claim {} is incomplete", claim_id);
    }

    Ok(ClaimTrace {
        claim,
        derivation,
        extraction,
        raw_response,
    })
}
