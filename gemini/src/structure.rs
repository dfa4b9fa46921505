//! Structured extraction: ask the model for JSON and get JSON back.
//!
//! Requests pin temperature to 0 and ask for `application/json` output,
//! but the reply is still treated as untrusted text: models wrap JSON in
//! code fences or pad it with prose, so parsing falls back to the
//! fenced block and then to the outermost brace span.

use serde_json::Value;

use crate::client::generate;
use crate::config::GeminiConfig;
use crate::error::GeminiError;
use crate::files::GeminiFile;
use crate::types::{Content, GenerateContentRequest, GenerationConfig, Part};

/// Sends `prompt` (optionally alongside an uploaded file) and returns
/// the decoded JSON object from the reply.
pub fn generate_json(
    cfg: &GeminiConfig,
    prompt: &str,
    file: Option<&GeminiFile>,
) -> Result<Value, GeminiError> {
    let mut parts = Vec::new();
    if let Some(file) = file {
        parts.push(Part::file(file.mime_type.clone(), file.uri.clone()));
    }
    parts.push(Part::text(prompt));

    let request = GenerateContentRequest {
        contents: vec![Content::user(parts)],
        generation_config: Some(GenerationConfig {
            temperature: Some(0.0),
            response_mime_type: Some("application/json".to_string()),
            ..GenerationConfig::default()
        }),
    };

    let response = generate(cfg, cfg.model(), &request)?;
    let Some(text) = response.text() else {
        return Err(GeminiError::EmptyResponse(response.refusal_reason()));
    };
    extract_json_value(&text)
}

/// Decodes the first JSON object found in `text`.
///
/// Tries the whole string, then the contents of a ```` ``` ```` fence,
/// then the outermost `{...}` span.
pub fn extract_json_value(text: &str) -> Result<Value, GeminiError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }
    if let Some(inner) = strip_code_fence(trimmed) {
        if let Ok(value) = serde_json::from_str(inner) {
            return Ok(value);
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }
    Err(GeminiError::Parse("response contains no decodable JSON object".into()))
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.strip_suffix("```")?;
    Some(rest.trim())
}
