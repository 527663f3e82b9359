// crates/lexis-engine/src/registry.rs
//
// Tool-name -> handler lookup for the extract, derive and claim stages.
//
// Handlers are plain synchronous functions of (call, upstream effect). In
// stub mode an unregistered tool resolves to a placeholder handler, so a plan
// can run end to end before its real parsers exist.

use std::collections::HashMap;
use std::sync::Arc;

use lexis_core::{
    ClaimEffect, DerivationEffect, ExtractionEffect, RawResponseEffect, Stage, ToolCallSpec,
};

use crate::handlers;
use crate::planner::Backend;

pub type ExtractHandler =
    Arc<dyn Fn(&ToolCallSpec, &RawResponseEffect) -> Result<ExtractionEffect, String> + Send + Sync>;
pub type DeriveHandler =
    Arc<dyn Fn(&ToolCallSpec, &ExtractionEffect) -> Result<DerivationEffect, String> + Send + Sync>;
pub type ClaimHandler =
    Arc<dyn Fn(&ToolCallSpec, &DerivationEffect) -> Result<ClaimEffect, String> + Send + Sync>;

/// Registered handlers for every non-fetch stage.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    extract: HashMap<String, ExtractHandler>,
    derive: HashMap<String, DeriveHandler>,
    claim: HashMap<String, ClaimHandler>,
    use_stubs: bool,
}

impl HandlerRegistry {
    /// An empty registry without stub fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry that falls back to stub handlers.
    pub fn with_stubs() -> Self {
        Self {
            use_stubs: true,
            ..Self::default()
        }
    }

    /// The built-in lemma handlers for every known backend, with stub fallback.
    pub fn standard() -> Self {
        let mut registry = Self::with_stubs();
        for backend in Backend::ALL {
            registry.register_extract(backend.extract_tool(), handlers::extract_tokens);
            registry.register_derive(backend.derive_tool(), handlers::derive_lemmas);
            registry.register_claim(backend.claim_tool(), handlers::claim_lemmas);
        }
        registry
    }

    pub fn register_extract<F>(&mut self, tool: impl Into<String>, handler: F)
    where
        F: Fn(&ToolCallSpec, &RawResponseEffect) -> Result<ExtractionEffect, String>
            + Send
            + Sync
            + 'static,
    {
        self.extract.insert(tool.into(), Arc::new(handler));
    }

    pub fn register_derive<F>(&mut self, tool: impl Into<String>, handler: F)
    where
        F: Fn(&ToolCallSpec, &ExtractionEffect) -> Result<DerivationEffect, String>
            + Send
            + Sync
            + 'static,
    {
        self.derive.insert(tool.into(), Arc::new(handler));
    }

    pub fn register_claim<F>(&mut self, tool: impl Into<String>, handler: F)
    where
        F: Fn(&ToolCallSpec, &DerivationEffect) -> Result<ClaimEffect, String>
            + Send
            + Sync
            + 'static,
    {
        self.claim.insert(tool.into(), Arc::new(handler));
    }

    pub fn extract_handler(&self, tool: &str) -> Option<ExtractHandler> {
        match self.extract.get(tool) {
            Some(handler) => Some(handler.clone()),
            None if self.use_stubs => Some(Arc::new(stub_extract)),
            None => None,
        }
    }

    pub fn derive_handler(&self, tool: &str) -> Option<DeriveHandler> {
        match self.derive.get(tool) {
            Some(handler) => Some(handler.clone()),
            None if self.use_stubs => Some(Arc::new(stub_derive)),
            None => None,
        }
    }

    pub fn claim_handler(&self, tool: &str) -> Option<ClaimHandler> {
        match self.claim.get(tool) {
            Some(handler) => Some(handler.clone()),
            None if self.use_stubs => Some(Arc::new(stub_claim)),
            None => None,
        }
    }

    /// Whether a real (non-stub) handler is registered for `tool` at `stage`.
    pub fn is_registered(&self, stage: Stage, tool: &str) -> bool {
        match stage {
            Stage::Fetch => false,
            Stage::Extract => self.extract.contains_key(tool),
            Stage::Derive => self.derive.contains_key(tool),
            Stage::Claim => self.claim.contains_key(tool),
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extract: Vec<_> = self.extract.keys().collect();
        let mut derive: Vec<_> = self.derive.keys().collect();
        let mut claim: Vec<_> = self.claim.keys().collect();
        extract.sort();
        derive.sort();
        claim.sort();
        f.debug_struct("HandlerRegistry")
            .field("extract", &extract)
            .field("derive", &derive)
            .field("claim", &claim)
            .field("use_stubs", &self.use_stubs)
            .finish()
    }
}

fn stub_payload(call: &ToolCallSpec) -> serde_json::Value {
    serde_json::json!({
        "stub": true,
        "tool": call.tool,
        "call_id": call.call_id,
    })
}

fn stub_extract(call: &ToolCallSpec, raw: &RawResponseEffect) -> Result<ExtractionEffect, String> {
    Ok(ExtractionEffect::new(call, raw, call.tool.clone(), None, stub_payload(call)))
}

fn stub_derive(
    call: &ToolCallSpec,
    extraction: &ExtractionEffect,
) -> Result<DerivationEffect, String> {
    Ok(DerivationEffect::new(
        call,
        extraction,
        call.tool.clone(),
        extraction.canonical.clone(),
        stub_payload(call),
    ))
}

fn stub_claim(call: &ToolCallSpec, derivation: &DerivationEffect) -> Result<ClaimEffect, String> {
    let subject = derivation
        .canonical
        .clone()
        .unwrap_or_else(|| derivation.call_id.clone());
    Ok(ClaimEffect::new(call, derivation, subject, "stub", stub_payload(call)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawResponseEffect {
        let mut raw = RawResponseEffect::new("f", "fixture://f").with_status(200);
        raw.tool = "fetch.x".to_string();
        raw
    }

    #[test]
    fn unregistered_tool_without_stubs_is_none() {
        let registry = HandlerRegistry::new();
        assert!(registry.extract_handler("x.mystery").is_none());
        assert!(registry.claim_handler("x.mystery").is_none());
    }

    #[test]
    fn stub_extract_marks_payload() {
        let registry = HandlerRegistry::with_stubs();
        let call = ToolCallSpec::new(Stage::Extract, "x.mystery", "e", "lexis://extract/x.mystery");
        let handler = registry.extract_handler("x.mystery").unwrap();
        let effect = handler(&call, &raw()).unwrap();

        assert_eq!(effect.kind, "x.mystery");
        assert_eq!(effect.payload["stub"], true);
        assert_eq!(effect.payload["tool"], "x.mystery");
        assert_eq!(effect.payload["call_id"], "e");
        assert!(!registry.is_registered(Stage::Extract, "x.mystery"));
    }

    #[test]
    fn registered_handler_wins_over_stub() {
        let mut registry = HandlerRegistry::with_stubs();
        registry.register_extract("extract.custom", |call, raw| {
            Ok(ExtractionEffect::new(call, raw, "custom", None, serde_json::json!({"ok": 1})))
        });
        let call = ToolCallSpec::new(Stage::Extract, "extract.custom", "e", "lexis://extract");
        let effect = registry.extract_handler("extract.custom").unwrap()(&call, &raw()).unwrap();
        assert_eq!(effect.kind, "custom");
        assert!(registry.is_registered(Stage::Extract, "extract.custom"));
    }

    #[test]
    fn standard_registry_covers_every_backend() {
        let registry = HandlerRegistry::standard();
        for backend in Backend::ALL {
            assert!(registry.is_registered(Stage::Extract, &backend.extract_tool()));
            assert!(registry.is_registered(Stage::Derive, &backend.derive_tool()));
            assert!(registry.is_registered(Stage::Claim, &backend.claim_tool()));
        }
    }
}
