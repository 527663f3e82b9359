// crates/lexis-clients/src/subprocess.rs
//
// Subprocess tool client for local dictionary binaries (e.g. Whitaker's Words).
//
// argv is built from the call parameters:
//   - `arg0`, `arg1`, ... become positional arguments in numeric order;
//   - every other key becomes `--key value`, sorted by key.
//
// The exit code becomes `status_code` (0 on success), stdout becomes the
// body and stderr is kept in the `x-stderr` header. Spawn failures, timeouts
// and signal deaths are recorded as `status_code = -1`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use lexis_core::{LexisError, RawResponseEffect, ToolClient};

use crate::http::TRANSPORT_ERROR_HEADER;

pub const STDERR_HEADER: &str = "x-stderr";

/// Longest stderr excerpt kept in the effect headers.
const MAX_STDERR_CHARS: usize = 2048;

/// Spawns a local executable per call.
#[derive(Debug, Clone)]
pub struct SubprocessToolClient {
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl SubprocessToolClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            working_dir: None,
        }
    }

    /// Run every call from `dir`. Whitaker's `words` looks for its
    /// dictionary files in the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Build the argument vector for a call from its parameters.
pub fn build_argv(params: &BTreeMap<String, String>) -> Vec<String> {
    let mut positional: Vec<(usize, &String)> = Vec::new();
    let mut flags: Vec<(&String, &String)> = Vec::new();

    for (key, value) in params {
        match key.strip_prefix("arg").and_then(|n| n.parse::<usize>().ok()) {
            Some(index) => positional.push((index, value)),
            None => flags.push((key, value)),
        }
    }
    positional.sort_by_key(|(index, _)| *index);

    let mut argv: Vec<String> = positional.into_iter().map(|(_, v)| v.clone()).collect();
    for (key, value) in flags {
        argv.push(format!("--{}", key));
        argv.push(value.clone());
    }
    argv
}

fn failed(mut effect: RawResponseEffect, reason: String, started: Instant) -> RawResponseEffect {
    effect.status_code = -1;
    effect.headers.insert(TRANSPORT_ERROR_HEADER.to_string(), reason);
    effect.fetch_duration_ms = started.elapsed().as_millis() as u64;
    effect
}

#[async_trait]
impl ToolClient for SubprocessToolClient {
    fn name(&self) -> &str {
        "subprocess"
    }

    async fn execute(
        &self,
        call_id: &str,
        endpoint: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<RawResponseEffect, LexisError> {
        let started = Instant::now();
        let argv = build_argv(params);
        let effect = RawResponseEffect::new(call_id, endpoint).with_content_type("text/plain");

        let mut command = Command::new(endpoint);
        command
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to spawn {} for {}: {}", endpoint, call_id, e);
                return Ok(failed(effect, format!("spawn failed: {}", e), started));
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!("Waiting on {} for {} failed: {}", endpoint, call_id, e);
                return Ok(failed(effect, format!("wait failed: {}", e), started));
            }
            Err(_) => {
                tracing::warn!(
                    "{} for {} exceeded {}s timeout",
                    endpoint,
                    call_id,
                    self.timeout.as_secs()
                );
                return Ok(failed(effect, "timed out".to_string(), started));
            }
        };

        let mut effect = effect
            .with_status(output.status.code().unwrap_or(-1))
            .with_body(output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            effect.headers.insert(
                STDERR_HEADER.to_string(),
                stderr.chars().take(MAX_STDERR_CHARS).collect(),
            );
        }
        effect.fetch_duration_ms = started.elapsed().as_millis() as u64;
        Ok(effect)
    }

    fn is_success(&self, raw: &RawResponseEffect) -> bool {
        raw.status_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn argv_orders_positionals_numerically_then_flags() {
        let argv = build_argv(&params(&[
            ("arg10", "ten"),
            ("arg2", "two"),
            ("arg0", "zero"),
            ("mode", "latin"),
            ("dict", "lewis"),
        ]));
        assert_eq!(
            argv,
            vec!["zero", "two", "ten", "--dict", "lewis", "--mode", "latin"]
        );
    }

    #[test]
    fn argument_key_without_number_is_a_flag() {
        let argv = build_argv(&params(&[("args", "x")]));
        assert_eq!(argv, vec!["--args", "x"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_becomes_body_and_exit_code_status() {
        let client = SubprocessToolClient::new(Duration::from_secs(10));
        let effect = client
            .execute(
                "whitakers-0",
                "sh",
                &params(&[("arg0", "-c"), ("arg1", "echo lupus lupa; echo warn >&2")]),
            )
            .await
            .unwrap();
        assert_eq!(effect.status_code, 0);
        assert_eq!(effect.body, b"lupus lupa\n");
        assert_eq!(effect.headers.get(STDERR_HEADER).map(String::as_str), Some("warn"));
        assert!(client.is_success(&effect));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_recorded() {
        let client = SubprocessToolClient::new(Duration::from_secs(10));
        let effect = client
            .execute("whitakers-0", "sh", &params(&[("arg0", "-c"), ("arg1", "exit 3")]))
            .await
            .unwrap();
        assert_eq!(effect.status_code, 3);
        assert!(!client.is_success(&effect));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_from_the_working_dir() {
        let dir = std::env::temp_dir().join(format!("lexis_test_words_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("DICTLINE.GEN"), "lupus lupi N M\n").unwrap();

        let client = SubprocessToolClient::new(Duration::from_secs(10)).with_working_dir(&dir);
        let effect = client
            .execute("whitakers-0", "sh", &params(&[("arg0", "-c"), ("arg1", "cat DICTLINE.GEN")]))
            .await
            .unwrap();
        assert_eq!(effect.status_code, 0);
        assert_eq!(effect.body, b"lupus lupi N M\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_binary_is_recorded() {
        let client = SubprocessToolClient::new(Duration::from_secs(10));
        let effect = client
            .execute("whitakers-0", "/nonexistent/lexis-words", &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(effect.status_code, -1);
        assert!(effect.headers.contains_key(TRANSPORT_ERROR_HEADER));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_process_times_out() {
        let client = SubprocessToolClient::new(Duration::from_millis(100));
        let effect = client
            .execute("whitakers-0", "sh", &params(&[("arg0", "-c"), ("arg1", "sleep 5")]))
            .await
            .unwrap();
        assert_eq!(effect.status_code, -1);
        assert_eq!(
            effect.headers.get(TRANSPORT_ERROR_HEADER).map(String::as_str),
            Some("timed out")
        );
    }
}
