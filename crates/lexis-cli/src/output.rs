// crates/lexis-cli/src/output.rs
//
// Output formatting utilities for the lexis CLI. Everything is printed as
// pretty JSON on stdout; logs go to stderr.

use serde::Serialize;

use lexis_core::RawResponseEffect;
use lexis_engine::{ClaimTrace, ExecutionArtifacts};

/// Format a serializable value as a pretty-printed JSON string.
pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("JSON serialization error: {}", e))
}

/// Raw response with the body rendered as text instead of a byte array.
fn raw_view(raw: &RawResponseEffect) -> serde_json::Value {
    serde_json::json!({
        "response_id": raw.response_id,
        "tool": raw.tool,
        "call_id": raw.call_id,
        "endpoint": raw.endpoint,
        "status_code": raw.status_code,
        "content_type": raw.content_type,
        "headers": raw.headers,
        "body": raw.body_text(),
        "fetch_duration_ms": raw.fetch_duration_ms,
    })
}

/// The run summary, claims and skipped calls of one execution.
pub fn run_view(artifacts: &ExecutionArtifacts) -> serde_json::Value {
    serde_json::json!({
        "executed": artifacts.executed,
        "claims": artifacts.claims,
        "skipped": artifacts.skipped,
    })
}

pub fn trace_view(trace: &ClaimTrace) -> serde_json::Value {
    serde_json::json!({
        "complete": trace.is_complete(),
        "claim": trace.claim,
        "derivation": trace.derivation,
        "extraction": trace.extraction,
        "raw_response": trace.raw_response.as_ref().map(raw_view),
    })
}
