//! Files API client: upload a document, wait for it to become usable,
//! clean it up afterwards.
//!
//! Uploads use the simple multipart protocol, which covers files up to
//! 20 MB; uploaded files expire on the server after 48 hours.
//!
//! See: <https://ai.google.dev/api/files>

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{apply_auth, http_client, read_json};
use crate::config::GeminiConfig;
use crate::error::GeminiError;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Server-side processing state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    /// Still being processed.
    Processing,
    /// Ready for use in requests.
    Active,
    /// Processing failed.
    Failed,
    /// Any state this client does not know about.
    #[serde(other)]
    Unknown,
}

/// A file uploaded to the Files API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    /// Human-facing name supplied at upload.
    #[serde(default)]
    pub display_name: String,
    /// MIME type recorded by the server.
    #[serde(default)]
    pub mime_type: String,
    /// URI to reference in `generateContent` requests.
    #[serde(default)]
    pub uri: String,
    /// Current processing state.
    pub state: FileState,
}

impl GeminiFile {
    /// Whether the file can be referenced in requests.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == FileState::Active
    }
}

#[derive(Debug, Deserialize)]
struct UploadFileResponse {
    file: GeminiFile,
}

/// Uploads `path` and returns the created file record; the record may
/// still be in the `Processing` state.
pub fn upload_file(cfg: &GeminiConfig, path: &Path) -> Result<GeminiFile, GeminiError> {
    let display_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("file");
    let mime_type = mime_from_path(path).unwrap_or("application/octet-stream");
    let data = fs::read(path)?;

    let metadata = serde_json::to_string(&serde_json::json!({
        "file": { "displayName": display_name }
    }))?;
    let boundary = format!(
        "----tomecut{:x}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    );
    let body = multipart_body(&boundary, &metadata, mime_type, &data);

    debug!(file = display_name, bytes = data.len(), "uploading");
    let http = http_client(cfg)?;
    let request = apply_auth(cfg, http.post(cfg.upload_endpoint()))
        .header("X-Goog-Upload-Protocol", "multipart")
        .header(header::CONTENT_TYPE, format!("multipart/related; boundary={boundary}"))
        .body(body);

    let response: UploadFileResponse = read_json(request.send()?)?;
    Ok(response.file)
}

/// Fetches the current record for `name` (e.g. `files/abc123`).
pub fn get_file(cfg: &GeminiConfig, name: &str) -> Result<GeminiFile, GeminiError> {
    crate::client::get_json(cfg, &cfg.endpoint(name))
}

/// Deletes an uploaded file; expired files also vanish on their own.
pub fn delete_file(cfg: &GeminiConfig, name: &str) -> Result<(), GeminiError> {
    let http = http_client(cfg)?;
    let response = apply_auth(cfg, http.delete(cfg.endpoint(name))).send()?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        let body = response.text().unwrap_or_default();
        Err(GeminiError::from_response(status.as_u16(), &body))
    }
}

/// Polls until `file` becomes `Active`, failing on `Failed` or when
/// `timeout` elapses.
pub fn wait_until_active(
    cfg: &GeminiConfig,
    file: GeminiFile,
    timeout: Duration,
) -> Result<GeminiFile, GeminiError> {
    let deadline = Instant::now() + timeout;
    let mut current = file;
    loop {
        match current.state {
            FileState::Active => return Ok(current),
            FileState::Failed => {
                return Err(GeminiError::File(format!("{} failed server-side processing", current.name)));
            }
            FileState::Processing | FileState::Unknown => {
                if Instant::now() >= deadline {
                    return Err(GeminiError::File(format!(
                        "{} still processing after {}s",
                        current.name,
                        timeout.as_secs()
                    )));
                }
                debug!(file = %current.name, "waiting for processing");
                thread::sleep(POLL_INTERVAL);
                current = get_file(cfg, &current.name)?;
            }
        }
    }
}

/// Assembles a `multipart/related` body: a JSON metadata part followed
/// by the raw file content.
fn multipart_body(boundary: &str, metadata: &str, mime_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + metadata.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.as_bytes());
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn mime_from_path(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_resolution_covers_the_formats_we_ship() {
        assert_eq!(mime_from_path(Path::new("/x/book.pdf")), Some("application/pdf"));
        assert_eq!(mime_from_path(Path::new("/x/page.png")), Some("image/png"));
        assert_eq!(mime_from_path(Path::new("/x/unknown.xyz")), None);
    }

    #[test]
    fn multipart_body_carries_both_parts_in_order() {
        let body = multipart_body("----b", r#"{"file":{}}"#, "application/pdf", b"%PDF");
        let text = String::from_utf8_lossy(&body);
        let metadata_at = text.find(r#"{"file":{}}"#).unwrap();
        let content_at = text.find("%PDF").unwrap();
        assert!(metadata_at < content_at);
        assert!(text.starts_with("------b\r\n"));
        assert!(text.ends_with("------b--\r\n"));
        assert!(text.contains("Content-Type: application/pdf\r\n\r\n%PDF"));
    }

    #[test]
    fn file_states_deserialize_from_screaming_snake() {
        let raw = r#"{"name": "files/a", "state": "ACTIVE", "uri": "https://x/files/a"}"#;
        let file: GeminiFile = serde_json::from_str(raw).unwrap();
        assert!(file.is_ready());

        let odd = r#"{"name": "files/b", "state": "SOMETHING_NEW"}"#;
        let file: GeminiFile = serde_json::from_str(odd).unwrap();
        assert_eq!(file.state, FileState::Unknown);
        assert!(!file.is_ready());
    }
}
