// crates/lexis-clients/src/file.rs
//
// File tool client for locally indexed dictionaries.
//
// The endpoint is a path or `file://` URI; a `file` parameter, when present,
// is joined onto it. Relative paths resolve against the configured base
// directory. I/O failures map to HTTP-like status codes (404, 403, 500); a
// `file` parameter that would leave the endpoint directory is rejected with 400.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;

use lexis_core::{LexisError, RawResponseEffect, ToolClient};

use crate::http::TRANSPORT_ERROR_HEADER;

/// Reads response bytes from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FileToolClient {
    base_dir: Option<PathBuf>,
}

impl FileToolClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Resolve the on-disk path for a call. Returns `None` when the `file`
    /// parameter is absolute or contains `..` or `.` components.
    pub fn resolve(&self, endpoint: &str, params: &BTreeMap<String, String>) -> Option<PathBuf> {
        let mut path = PathBuf::from(endpoint.strip_prefix("file://").unwrap_or(endpoint));
        if let Some(file) = params.get("file") {
            let file = Path::new(file);
            if !file.components().all(|c| matches!(c, Component::Normal(_))) {
                return None;
            }
            path = path.join(file);
        }
        Some(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        })
    }
}

/// Guess a MIME type from the file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("html") | Some("htm") => "text/html",
        _ => "text/plain",
    }
}

#[async_trait]
impl ToolClient for FileToolClient {
    fn name(&self) -> &str {
        "file"
    }

    async fn execute(
        &self,
        call_id: &str,
        endpoint: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<RawResponseEffect, LexisError> {
        let started = Instant::now();
        let Some(path) = self.resolve(endpoint, params) else {
            tracing::warn!("Rejected file parameter for {}: {:?}", call_id, params.get("file"));
            return Ok(RawResponseEffect::new(call_id, endpoint)
                .with_status(400)
                .with_header(
                    TRANSPORT_ERROR_HEADER,
                    "file parameter escapes the endpoint directory",
                ));
        };
        let mut effect = RawResponseEffect::new(call_id, endpoint)
            .with_content_type(guess_content_type(&path))
            .with_header("x-path", path.display().to_string());

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                effect.status_code = 200;
                effect.body = bytes;
            }
            Err(e) => {
                effect.status_code = match e.kind() {
                    ErrorKind::NotFound => 404,
                    ErrorKind::PermissionDenied => 403,
                    _ => 500,
                };
                tracing::debug!("File read {} for {} failed: {}", path.display(), call_id, e);
                effect
                    .headers
                    .insert(TRANSPORT_ERROR_HEADER.to_string(), e.to_string());
            }
        }

        effect.fetch_duration_ms = started.elapsed().as_millis() as u64;
        Ok(effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lexis_test_{}_{}", label, uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_file_with_status_200() {
        let dir = temp_dir("file_client");
        std::fs::write(dir.join("agni.xml"), "<H1><key1>agni</key1></H1>").unwrap();

        let client = FileToolClient::new();
        let mut params = BTreeMap::new();
        params.insert("file".to_string(), "agni.xml".to_string());
        let endpoint = format!("file://{}", dir.display());
        let effect = client.execute("cdsl-0", &endpoint, &params).await.unwrap();

        assert_eq!(effect.status_code, 200);
        assert_eq!(effect.content_type, "application/xml");
        assert_eq!(effect.body, b"<H1><key1>agni</key1></H1>");
        assert!(client.is_success(&effect));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let dir = temp_dir("file_client_missing");
        let client = FileToolClient::new().with_base_dir(&dir);
        let effect = client
            .execute("cdsl-0", "mw/nothing.xml", &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(effect.status_code, 404);
        assert!(!client.is_success(&effect));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn relative_paths_resolve_against_base_dir() {
        let client = FileToolClient::new().with_base_dir("/srv/cdsl");
        assert_eq!(
            client.resolve("mw", &BTreeMap::new()),
            Some(PathBuf::from("/srv/cdsl/mw"))
        );
        assert_eq!(
            client.resolve("/abs/mw.txt", &BTreeMap::new()),
            Some(PathBuf::from("/abs/mw.txt"))
        );
        assert_eq!(guess_content_type(Path::new("x.HTML")), "text/html");
        assert_eq!(guess_content_type(Path::new("x")), "text/plain");
    }

    #[tokio::test]
    async fn file_param_cannot_leave_the_endpoint_directory() {
        let dir = temp_dir("file_client_escape");
        let client = FileToolClient::new().with_base_dir(&dir);
        for file in ["../etc/passwd", "/etc/passwd", "mw/../../secret.xml", "./agni.xml"] {
            let mut params = BTreeMap::new();
            params.insert("file".to_string(), file.to_string());
            assert_eq!(client.resolve("mw", &params), None, "{}", file);

            let effect = client.execute("cdsl-0", "mw", &params).await.unwrap();
            assert_eq!(effect.status_code, 400);
            assert!(effect.headers.contains_key(TRANSPORT_ERROR_HEADER));
            assert!(effect.body.is_empty());
            assert!(!client.is_success(&effect));
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
