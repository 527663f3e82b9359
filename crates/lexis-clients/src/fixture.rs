// crates/lexis-clients/src/fixture.rs
//
// Canned-response client for tests and offline runs. Returns the same body
// for every call and counts how often it was invoked.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use lexis_core::{LexisError, RawResponseEffect, ToolClient};

use crate::file::guess_content_type;

#[derive(Debug, Clone)]
pub struct FixtureToolClient {
    status_code: i32,
    content_type: String,
    body: Vec<u8>,
    calls: Arc<AtomicUsize>,
}

impl FixtureToolClient {
    /// A client answering every call with `200` and `body`.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code: 200,
            content_type: "text/plain".to_string(),
            body: body.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Load the canned body from a file, guessing its content type.
    pub fn from_file(path: &Path) -> Result<Self, LexisError> {
        let body = std::fs::read(path).map_err(|e| {
            LexisError::Config(format!("Cannot read fixture {}: {}", path.display(), e))
        })?;
        Ok(Self::new(body).with_content_type(guess_content_type(path)))
    }

    pub fn with_status(mut self, status_code: i32) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Number of `execute` calls so far, shared across clones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolClient for FixtureToolClient {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn execute(
        &self,
        call_id: &str,
        endpoint: &str,
        _params: &BTreeMap<String, String>,
    ) -> Result<RawResponseEffect, LexisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawResponseEffect::new(call_id, endpoint)
            .with_status(self.status_code)
            .with_content_type(self.content_type.clone())
            .with_body(self.body.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_calls_across_clones() {
        let client = FixtureToolClient::new("lupus lupa");
        let shared = client.clone();
        client.execute("a", "fixture://a", &BTreeMap::new()).await.unwrap();
        let effect = shared.execute("b", "fixture://b", &BTreeMap::new()).await.unwrap();

        assert_eq!(client.call_count(), 2);
        assert_eq!(effect.call_id, "b");
        assert_eq!(effect.body, b"lupus lupa");
    }

    #[tokio::test]
    async fn status_override_controls_success() {
        let client = FixtureToolClient::new("").with_status(502);
        let effect = client.execute("a", "fixture://a", &BTreeMap::new()).await.unwrap();
        assert!(!client.is_success(&effect));
    }
}
