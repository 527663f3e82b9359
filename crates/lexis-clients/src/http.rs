// crates/lexis-clients/src/http.rs
//
// HTTP tool client for scraper and CGI backends.
// Uses reqwest; parameters go into the query string (GET) or a urlencoded
// form body (POST).
//
// Never fails on a bad status: non-2xx responses are captured as-is, and a
// request that produced no complete HTTP response (connect failure, timeout,
// or a body cut short) is recorded with `status_code = 0` plus an
// `x-transport-error` header.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use lexis_core::{LexisError, RawResponseEffect, ToolClient};

/// Header recorded when the request never produced an HTTP status.
pub const TRANSPORT_ERROR_HEADER: &str = "x-transport-error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// reqwest-backed [`ToolClient`].
#[derive(Debug, Clone)]
pub struct HttpToolClient {
    client: reqwest::Client,
    method: HttpMethod,
}

impl HttpToolClient {
    /// Build a client issuing `method` requests with the given per-request timeout.
    pub fn new(method: HttpMethod, timeout: Duration) -> Result<Self, LexisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lexis/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LexisError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, method })
    }

    pub fn get(timeout: Duration) -> Result<Self, LexisError> {
        Self::new(HttpMethod::Get, timeout)
    }

    pub fn post(timeout: Duration) -> Result<Self, LexisError> {
        Self::new(HttpMethod::Post, timeout)
    }
}

#[async_trait]
impl ToolClient for HttpToolClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(
        &self,
        call_id: &str,
        endpoint: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<RawResponseEffect, LexisError> {
        let started = Instant::now();
        let request = match self.method {
            HttpMethod::Get => self.client.get(endpoint).query(params),
            HttpMethod::Post => self.client.post(endpoint).form(params),
        };

        let mut effect = RawResponseEffect::new(call_id, endpoint);
        match request.send().await {
            Ok(response) => {
                effect.status_code = i32::from(response.status().as_u16());
                for (name, value) in response.headers() {
                    effect.headers.insert(
                        name.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    );
                }
                effect.content_type = effect
                    .headers
                    .get("content-type")
                    .cloned()
                    .unwrap_or_default();
                match response.bytes().await {
                    Ok(bytes) => effect.body = bytes.to_vec(),
                    Err(e) => {
                        tracing::warn!("HTTP body read failed for {} ({}): {}", call_id, endpoint, e);
                        effect.status_code = 0;
                        effect
                            .headers
                            .insert(TRANSPORT_ERROR_HEADER.to_string(), e.to_string());
                    }
                }
            }
            Err(e) => {
                tracing::warn!("HTTP request failed for {} ({}): {}", call_id, endpoint, e);
                effect.status_code = 0;
                effect
                    .headers
                    .insert(TRANSPORT_ERROR_HEADER.to_string(), e.to_string());
            }
        }

        effect.fetch_duration_ms = started.elapsed().as_millis() as u64;
        Ok(effect)
    }
}
