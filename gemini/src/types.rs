//! Request and response bodies for `generateContent`.
//!
//! Only the slice of the API surface this pipeline exercises: text
//! prompts, references to uploaded files, and a generation config pinned
//! to deterministic JSON output.

use serde::{Deserialize, Serialize};

/// Body of a `generateContent` call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    /// Conversation turns; this pipeline always sends exactly one.
    pub contents: Vec<Content>,
    /// Sampling and output-format controls.
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    /// Ordered parts of the turn.
    #[serde(default)]
    pub parts: Vec<Part>,
    /// `user` on requests, `model` on responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Content {
    /// A user turn from the given parts.
    #[must_use]
    pub fn user(parts: Vec<Part>) -> Self {
        Self { parts, role: Some("user".to_string()) }
    }
}

/// One piece of a turn: prompt text or a reference to an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    /// Plain text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Reference to a Files API upload.
    #[serde(rename = "fileData", default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
}

impl Part {
    /// A text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), file_data: None }
    }

    /// A part referencing a file uploaded via the Files API.
    #[must_use]
    pub fn file(mime_type: impl Into<String>, file_uri: impl Into<String>) -> Self {
        Self {
            text: None,
            file_data: Some(FileData { mime_type: mime_type.into(), file_uri: file_uri.into() }),
        }
    }
}

/// Reference to a file uploaded via the Files API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    mime_type: String,
    file_uri: String,
}

/// Sampling and output-format controls.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationConfig {
    /// Sampling temperature; 0 for deterministic extraction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Output token cap.
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i32>,
    /// Response MIME type, e.g. `application/json`.
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

/// Body of a `generateContent` response.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    /// Ranked answers; the first is the one that matters.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Populated when the prompt itself was rejected.
    #[serde(rename = "promptFeedback", default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Concatenated text of the primary candidate, or `None` when the
    /// response carries no text at all.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let mut out = String::new();
        for part in &content.parts {
            if let Some(text) = &part.text {
                out.push_str(text);
            }
        }
        if out.is_empty() { None } else { Some(out) }
    }

    /// Why no text came back, for diagnostics.
    #[must_use]
    pub fn refusal_reason(&self) -> String {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return format!("prompt blocked: {reason}");
        }
        if let Some(reason) = self
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            return format!("finish reason: {reason}");
        }
        "no candidates returned".to_string()
    }
}

/// One ranked answer.
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    /// The answer's content, absent on safety stops.
    #[serde(default)]
    pub content: Option<Content>,
    /// Why generation stopped.
    #[serde(rename = "finishReason", default)]
    pub finish_reason: Option<String>,
}

/// Prompt-level rejection details.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptFeedback {
    /// Block reason code, e.g. `SAFETY`.
    #[serde(rename = "blockReason", default)]
    pub block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_camel_case_keys() {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::file("application/pdf", "https://example.test/files/x"),
                Part::text("extract the structure"),
            ])],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.0),
                response_mime_type: Some("application/json".to_string()),
                ..GenerationConfig::default()
            }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["fileData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["fileData"]["fileUri"], "https://example.test/files/x");
        assert_eq!(parts[1]["text"], "extract the structure");
        assert!(parts[1].get("fileData").is_none());
    }

    #[test]
    fn response_text_concatenates_parts() {
        let raw = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "{\"a\":"}, {"text": "1}"}]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn blocked_prompt_reports_its_reason() {
        let raw = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text(), None);
        assert_eq!(response.refusal_reason(), "prompt blocked: SAFETY");
    }
}
