//! PicGo / PicList HTTP server backend.
//!
//! Two request shapes, selected by `remote_server_mode`:
//!
//! * **JSON mode**: `POST {"list": ["/abs/a.png", …]}`; the server reads the
//!   files from the shared filesystem. Impossible on mobile hosts.
//! * **Binary mode**: `POST multipart/form-data` with one `list` part per
//!   image; the server never touches the client's filesystem.
//!
//! The server answers `{ "success"?, "msg"?, "result": string | string[],
//! "fullResult"? }`. `fullResult` (PicList) is appended to the upload history.

use super::{UploadItem, Uploader};
use crate::config::UploaderConfig;
use crate::error::UploadError;
use crate::output::UploadResponse;
use crate::pipeline::multipart::{self, NamedBlob, PayloadData};
use crate::settings::UploadHistory;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MOBILE_NEEDS_REMOTE: &str = "Mobile App must use remote server mode.";

/// Uploads through a PicGo-compatible HTTP server.
pub struct PicGoUploader {
    config: UploaderConfig,
    client: reqwest::Client,
    history: Arc<dyn UploadHistory>,
}

impl PicGoUploader {
    pub fn new(
        config: UploaderConfig,
        history: Arc<dyn UploadHistory>,
    ) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| UploadError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            history,
        })
    }

    fn url(&self) -> &str {
        &self.config.upload_server
    }

    fn ensure_json_mode_allowed(&self) -> Result<(), UploadError> {
        if self.config.platform.is_mobile() {
            return Err(UploadError::UnsupportedPlatform {
                reason: MOBILE_NEEDS_REMOTE.to_string(),
            });
        }
        Ok(())
    }

    async fn post_json(&self, body: Option<Value>) -> Result<UploadResponse, UploadError> {
        let mut request = self.client.post(self.url());
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.send(request).await
    }

    async fn post_blobs(&self, blobs: Vec<NamedBlob>) -> Result<UploadResponse, UploadError> {
        let mut payload = PayloadData::new();
        for blob in blobs {
            payload.append("list", blob);
        }
        let (body, boundary) = multipart::generate(&payload);
        let request = self
            .client
            .post(self.url())
            .header(reqwest::header::CONTENT_TYPE, multipart::content_type(&boundary))
            .body(body);
        self.send(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<UploadResponse, UploadError> {
        let url = self.url().to_string();
        let transport = |e: reqwest::Error| UploadError::RequestFailed {
            url: url.clone(),
            reason: e.to_string(),
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport)?;
        debug!("PicGo server answered HTTP {} ({} bytes)", status, text.len());

        let parsed = parse_response(&url, status, &text)?;
        if !parsed.full_result.is_empty() {
            let history = Arc::clone(&self.history);
            let entries = parsed.full_result.clone();
            tokio::task::spawn_blocking(move || history.append(entries))
                .await
                .map_err(|e| UploadError::Internal(format!("history task failed: {e}")))??;
        }
        Ok(parsed)
    }

    async fn read_blobs(&self, items: &[UploadItem]) -> Result<Vec<NamedBlob>, UploadError> {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%3f");
        let mut blobs = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let path = item.file();
            let data = tokio::fs::read(path)
                .await
                .map_err(|e| UploadError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{e}"))
                .unwrap_or_default();
            blobs.push(NamedBlob::new(format!("{stamp}-{i}{ext}"), data));
        }
        Ok(blobs)
    }
}

#[async_trait]
impl Uploader for PicGoUploader {
    fn name(&self) -> &'static str {
        "PicGo"
    }

    async fn upload(&self, items: &[UploadItem]) -> Result<UploadResponse, UploadError> {
        if items.is_empty() {
            return Ok(UploadResponse::success(Vec::new()));
        }

        if self.config.remote_server_mode {
            info!("Uploading {} image(s) to {} as multipart", items.len(), self.url());
            let blobs = self.read_blobs(items).await?;
            self.post_blobs(blobs).await
        } else {
            self.ensure_json_mode_allowed()?;
            info!("Uploading {} path(s) to {}", items.len(), self.url());
            let list: Vec<String> = items
                .iter()
                .map(|i| i.file().to_string_lossy().into_owned())
                .collect();
            self.post_json(Some(serde_json::json!({ "list": list })))
                .await
        }
    }

    async fn upload_by_clipboard(
        &self,
        data: Option<&[NamedBlob]>,
    ) -> Result<UploadResponse, UploadError> {
        let response = if self.config.remote_server_mode {
            let blobs = data.filter(|d| !d.is_empty()).ok_or_else(|| {
                UploadError::InvalidConfig(
                    "remote server mode needs the clipboard image data".to_string(),
                )
            })?;
            self.post_blobs(blobs.to_vec()).await?
        } else {
            self.ensure_json_mode_allowed()?;
            if data.is_some() {
                debug!("JSON mode: ignoring host clipboard data, server reads its own");
            }
            self.post_json(None).await?
        };
        Ok(first_only(response))
    }
}

fn first_only(mut response: UploadResponse) -> UploadResponse {
    if response.success {
        response.result.truncate(1);
    }
    response
}

// ── Response parsing ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResultField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerBody {
    success: Option<bool>,
    #[serde(alias = "message")]
    msg: Option<String>,
    result: Option<ResultField>,
    full_result: Option<Vec<Value>>,
}

/// Interpret a server reply.
///
/// Non-200 answers and `success: false` become failure responses carrying
/// the server's message; an unreadable 200 body is an error.
pub fn parse_response(url: &str, status: u16, body: &str) -> Result<UploadResponse, UploadError> {
    if status != 200 {
        let msg = serde_json::from_str::<ServerBody>(body)
            .ok()
            .and_then(|b| b.msg)
            .or_else(|| Some(body.trim().to_string()).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| format!("HTTP {status}"));
        warn!("PicGo server at {} answered HTTP {}: {}", url, status, msg);
        return Ok(UploadResponse::failure(msg));
    }

    let parsed: ServerBody =
        serde_json::from_str(body).map_err(|e| UploadError::InvalidResponse {
            url: url.to_string(),
            detail: e.to_string(),
        })?;

    let result = match parsed.result {
        Some(ResultField::One(single)) => vec![single],
        Some(ResultField::Many(urls)) => urls,
        None => Vec::new(),
    };

    if parsed.success == Some(false) || result.is_empty() {
        let msg = parsed
            .msg
            .unwrap_or_else(|| "server returned no upload result".to_string());
        return Ok(UploadResponse {
            full_result: parsed.full_result.unwrap_or_default(),
            ..UploadResponse::failure(msg)
        });
    }

    Ok(UploadResponse {
        success: true,
        msg: parsed.msg.unwrap_or_else(|| "success".to_string()),
        result,
        full_result: parsed.full_result.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Platform;
    use crate::settings::MemoryHistory;
    use std::path::PathBuf;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn uploader(server: &MockServer, remote: bool) -> (PicGoUploader, Arc<MemoryHistory>) {
        let config = UploaderConfig::builder()
            .upload_server(format!("{}/upload", server.uri()))
            .remote_server_mode(remote)
            .build()
            .unwrap();
        let history = Arc::new(MemoryHistory::new());
        (PicGoUploader::new(config, history.clone()).unwrap(), history)
    }

    #[test]
    fn parses_list_and_single_results() {
        let r = parse_response("u", 200, r#"{"success":true,"result":["a","b"]}"#).unwrap();
        assert!(r.success);
        assert_eq!(r.result, vec!["a", "b"]);

        let r = parse_response("u", 200, r#"{"msg":"ok","result":"a"}"#).unwrap();
        assert_eq!(r.result, vec!["a"]);
        assert_eq!(r.msg, "ok");
    }

    #[test]
    fn non_200_carries_server_message() {
        let r = parse_response("u", 500, r#"{"msg":"no config"}"#).unwrap();
        assert!(!r.success);
        assert_eq!(r.msg, "no config");

        let r = parse_response("u", 502, "Bad Gateway").unwrap();
        assert_eq!(r.msg, "Bad Gateway");

        let r = parse_response("u", 404, "").unwrap();
        assert_eq!(r.msg, "HTTP 404");
    }

    #[test]
    fn success_false_is_failure() {
        let r = parse_response("u", 200, r#"{"success":false,"message":"upload error"}"#).unwrap();
        assert!(!r.success);
        assert_eq!(r.msg, "upload error");
    }

    #[test]
    fn garbage_body_is_invalid_response() {
        let err = parse_response("u", 200, "<html>").unwrap_err();
        assert!(matches!(err, UploadError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn json_mode_posts_paths() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(body_json(serde_json::json!({"list": ["/vault/a.png", "/vault/b.png"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": ["https://cdn/a.png", "https://cdn/b.png"],
                "fullResult": [{"imgUrl": "https://cdn/a.png"}, {"imgUrl": "https://cdn/b.png"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (up, history) = uploader(&server, false);
        let items = vec![
            UploadItem::Path(PathBuf::from("/vault/a.png")),
            UploadItem::Path(PathBuf::from("/vault/b.png")),
        ];
        let r = up.upload(&items).await.unwrap();
        assert!(r.success);
        assert_eq!(r.result, vec!["https://cdn/a.png", "https://cdn/b.png"]);
        assert_eq!(history.entries().len(), 2);
    }

    #[tokio::test]
    async fn json_mode_on_mobile_fails_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = UploaderConfig::builder()
            .upload_server(format!("{}/upload", server.uri()))
            .platform(Platform::Mobile)
            .build()
            .unwrap();
        let up = PicGoUploader::new(config, Arc::new(MemoryHistory::new())).unwrap();
        let err = up
            .upload(&[UploadItem::Path(PathBuf::from("/a.png"))])
            .await
            .unwrap_err();
        assert!(err.is_precondition());

        let err = up.upload_by_clipboard(None).await.unwrap_err();
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn binary_mode_sends_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cat.png");
        std::fs::write(&file, b"\x89PNG\r\n\x1a\nfake").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header_exists("content-type"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"result": ["https://cdn/cat.png"]})),
            )
            .mount(&server)
            .await;

        let (up, _) = uploader(&server, true);
        let r = up.upload(&[UploadItem::Path(file)]).await.unwrap();
        assert_eq!(r.result, vec!["https://cdn/cat.png"]);

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0].headers.get("content-type").unwrap();
        assert!(content_type
            .to_str()
            .unwrap()
            .starts_with("multipart/form-data; boundary=----Boundary"));
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"list\"; filename=\""));
        assert!(body.contains(".png\""));
        assert!(body.contains("Content-Type: image/png"));
    }

    #[tokio::test]
    async fn history_write_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": ["https://cdn/a.png"],
                "fullResult": [{"imgUrl": "https://cdn/a.png"}]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = crate::settings::SettingsFile::open(dir.path().join("missing/data.json")).unwrap();
        let config = UploaderConfig::builder()
            .upload_server(format!("{}/upload", server.uri()))
            .build()
            .unwrap();
        let up = PicGoUploader::new(config, Arc::new(store)).unwrap();

        let err = up
            .upload(&[UploadItem::Path(PathBuf::from("/a.png"))])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::WriteFailed { .. }));
    }

    #[tokio::test]
    async fn server_error_is_failure_not_err() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"msg": "boom"})),
            )
            .mount(&server)
            .await;

        let (up, history) = uploader(&server, false);
        let r = up
            .upload(&[UploadItem::Path(PathBuf::from("/a.png"))])
            .await
            .unwrap();
        assert!(!r.success);
        assert_eq!(r.msg, "boom");
        assert!(history.entries().is_empty());
    }

    #[tokio::test]
    async fn clipboard_returns_first_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"result": ["https://cdn/1.png", "https://cdn/2.png"]}),
            ))
            .mount(&server)
            .await;

        let (up, _) = uploader(&server, false);
        let r = up.upload_by_clipboard(None).await.unwrap();
        assert_eq!(r.result, vec!["https://cdn/1.png"]);

        let (up, _) = uploader(&server, true);
        let blob = NamedBlob::new("clip.png", vec![1, 2, 3]);
        let r = up.upload_by_clipboard(Some(&[blob])).await.unwrap();
        assert_eq!(r.first_url(), Some("https://cdn/1.png"));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let config = UploaderConfig::builder()
            .upload_server("http://127.0.0.1:9/upload")
            .request_timeout_secs(2)
            .build()
            .unwrap();
        let up = PicGoUploader::new(config, Arc::new(MemoryHistory::new())).unwrap();
        let err = up
            .upload(&[UploadItem::Path(PathBuf::from("/a.png"))])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::RequestFailed { .. }));
    }
}
