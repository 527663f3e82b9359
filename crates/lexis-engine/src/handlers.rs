// crates/lexis-engine/src/handlers.rs
//
// Built-in lemma handlers shared by every backend chain:
//   extract: strip markup, collect distinct word tokens in first-seen order
//   derive:  lowercase and deduplicate tokens into lemmas
//   claim:   assert `has_lemmas` for the queried lemma

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Node};

use lexis_core::{ClaimEffect, DerivationEffect, ExtractionEffect, RawResponseEffect, ToolCallSpec};

pub const TOKENS_KIND: &str = "tokens";
pub const LEMMAS_KIND: &str = "lemmas";
pub const HAS_LEMMAS: &str = "has_lemmas";

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{M}]+(?:['’-][\p{L}\p{M}]+)*").expect("static regex"))
}

fn looks_like_markup(raw: &RawResponseEffect, text: &str) -> bool {
    let ct = raw.content_type.to_ascii_lowercase();
    ct.contains("html") || ct.contains("xml") || text.trim_start().starts_with('<')
}

fn is_hidden_element(node: &Node) -> bool {
    node.as_element()
        .is_some_and(|e| matches!(e.name(), "script" | "style"))
}

/// Visible text of a response body, with markup removed and entities
/// decoded when the body is HTML or XML.
pub fn visible_text(raw: &RawResponseEffect) -> String {
    let text = raw.body_text();
    if !looks_like_markup(raw, &text) {
        return text;
    }
    let doc = Html::parse_document(&text);
    let mut out = String::new();
    for node in doc.tree.root().descendants() {
        let Some(t) = node.value().as_text() else {
            continue;
        };
        if t.trim().is_empty() || node.ancestors().any(|a| is_hidden_element(a.value())) {
            continue;
        }
        out.push_str(t);
        out.push(' ');
    }
    out
}

/// Distinct word tokens in first-seen order. Single letters are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    word_re()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|t| t.chars().count() > 1)
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

fn string_array(payload: &serde_json::Value, key: &str) -> Result<Vec<String>, String> {
    let items = payload
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| format!("payload has no '{}' array", key))?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("'{}' contains a non-string entry", key))
        })
        .collect()
}

pub fn extract_tokens(
    call: &ToolCallSpec,
    raw: &RawResponseEffect,
) -> Result<ExtractionEffect, String> {
    let tokens = tokenize(&visible_text(raw));
    let payload = serde_json::json!({
        "tokens": tokens,
        "token_count": tokens.len(),
        "status_code": raw.status_code,
        "content_type": raw.content_type,
    });
    let canonical = call.param("lemma").map(str::to_string);
    Ok(ExtractionEffect::new(call, raw, TOKENS_KIND, canonical, payload))
}

pub fn derive_lemmas(
    call: &ToolCallSpec,
    extraction: &ExtractionEffect,
) -> Result<DerivationEffect, String> {
    let tokens = string_array(&extraction.payload, "tokens")?;
    let mut lemmas: Vec<String> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let lemma = token.to_lowercase();
        if !lemmas.contains(&lemma) {
            lemmas.push(lemma);
        }
    }
    let canonical = extraction
        .canonical
        .clone()
        .or_else(|| call.param("lemma").map(str::to_string));
    Ok(DerivationEffect::new(
        call,
        extraction,
        LEMMAS_KIND,
        canonical,
        serde_json::json!({ "lemmas": lemmas }),
    ))
}

pub fn claim_lemmas(
    call: &ToolCallSpec,
    derivation: &DerivationEffect,
) -> Result<ClaimEffect, String> {
    let lemmas = string_array(&derivation.payload, "lemmas")?;
    let subject = call
        .param("lemma")
        .map(str::to_string)
        .or_else(|| derivation.canonical.clone())
        .unwrap_or_else(|| derivation.call_id.clone());
    Ok(ClaimEffect::new(
        call,
        derivation,
        subject,
        HAS_LEMMAS,
        serde_json::json!({ "lemmas": lemmas }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexis_core::Stage;

    fn raw(content_type: &str, body: &str) -> RawResponseEffect {
        let mut raw = RawResponseEffect::new("diogenes-0", "http://localhost/Perseus.cgi")
            .with_status(200)
            .with_content_type(content_type)
            .with_body(body.as_bytes().to_vec());
        raw.tool = "fetch.diogenes".to_string();
        raw
    }

    fn call(stage: Stage, tool: &str, id: &str) -> ToolCallSpec {
        ToolCallSpec::new(stage, tool, id, "lexis://test").with_param("lemma", "lupus")
    }

    #[test]
    fn strips_markup_and_scripts() {
        let raw = raw(
            "text/html; charset=utf-8",
            "<html><script>var x = 1;</script><b>Lupus</b>, wolf &amp; beast</html>",
        );
        assert_eq!(tokenize(&visible_text(&raw)), vec!["Lupus", "wolf", "beast"]);
    }

    #[test]
    fn named_and_numeric_entities_are_decoded() {
        let raw = raw(
            "text/html",
            "<b>caf&eacute;</b> <i>&#955;&#972;&#947;&#959;&#962;</i> lupus",
        );
        assert_eq!(tokenize(&visible_text(&raw)), vec!["café", "λόγος", "lupus"]);
    }

    #[test]
    fn xml_entries_keep_text_between_elements() {
        let raw = raw(
            "application/xml",
            "<entry><key1>agni</key1><body><i>m.</i> fire<style>p{}</style></body></entry>",
        );
        assert_eq!(tokenize(&visible_text(&raw)), vec!["agni", "fire"]);
    }

    #[test]
    fn plain_text_is_tokenized_as_is() {
        let raw = raw("text/plain", "lupus, lupi N M\nlupus wolf");
        assert_eq!(tokenize(&visible_text(&raw)), vec!["lupus", "lupi", "wolf"]);
    }

    #[test]
    fn greek_and_sanskrit_tokens_survive() {
        assert_eq!(tokenize("λόγος, ὁ word"), vec!["λόγος", "word"]);
        assert_eq!(tokenize("agni m. fire"), vec!["agni", "fire"]);
    }

    #[test]
    fn chain_produces_case_normalized_claim() {
        let raw = raw("text/plain", "Lupus lupus LUPA");
        let extraction =
            extract_tokens(&call(Stage::Extract, "extract.diogenes.html", "e"), &raw).unwrap();
        assert_eq!(extraction.payload["tokens"], serde_json::json!(["Lupus", "lupus", "LUPA"]));
        assert_eq!(extraction.canonical.as_deref(), Some("lupus"));

        let derivation =
            derive_lemmas(&call(Stage::Derive, "derive.diogenes.lemmas", "d"), &extraction).unwrap();
        assert_eq!(derivation.payload["lemmas"], serde_json::json!(["lupus", "lupa"]));

        let claim =
            claim_lemmas(&call(Stage::Claim, "claim.diogenes.lemmas", "c"), &derivation).unwrap();
        assert_eq!(claim.subject, "lupus");
        assert_eq!(claim.predicate, HAS_LEMMAS);
        assert_eq!(claim.value, serde_json::json!({"lemmas": ["lupus", "lupa"]}));
    }

    #[test]
    fn derive_rejects_payload_without_tokens() {
        let raw = raw("text/plain", "x");
        let extraction = ExtractionEffect::new(
            &call(Stage::Extract, "extract.x", "e"),
            &raw,
            "other",
            None,
            serde_json::json!({"stub": true}),
        );
        let err = derive_lemmas(&call(Stage::Derive, "derive.x", "d"), &extraction).unwrap_err();
        assert!(err.contains("tokens"));
    }
}
