use serde::Deserialize;
use thiserror::Error;

/// Errors raised by the Gemini client.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// Transport-level failure (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status with the parsed API message.
    #[error("{message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body, or a status fallback.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("{message}{}", retry_suffix(*.retry_after_secs))]
    RateLimit {
        /// Message extracted from the error body.
        message: String,
        /// Server-suggested retry delay, when the response carried one.
        retry_after_secs: Option<u64>,
    },

    /// The model answered but the answer is unusable.
    #[error("unusable response: {0}")]
    Parse(String),

    /// The model returned no text at all.
    #[error("model returned no text: {0}")]
    EmptyResponse(String),

    /// JSON (de)serialization failure.
    #[error("invalid response format: {0}")]
    Json(#[from] serde_json::Error),

    /// An uploaded file never became usable.
    #[error("uploaded file not usable: {0}")]
    File(String),

    /// Reading a local file for upload failed.
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Client-side configuration problem (missing keys, bad state file).
    #[error("configuration error: {0}")]
    Config(String),

    /// Every configured credential was tried and rejected.
    #[error("all API keys exhausted; last error: {0}")]
    KeysExhausted(String),
}

fn retry_suffix(secs: Option<u64>) -> String {
    secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default()
}

impl GeminiError {
    /// Whether retrying the same credential might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } => true,
            Self::Api { status, .. } => matches!(status, 408 | 429) || *status >= 500,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Whether this error should rotate to the next credential:
    /// authorization and quota statuses, or a message carrying
    /// quota/rate/limit wording.
    #[must_use]
    pub fn rotates_key(&self) -> bool {
        match self {
            Self::RateLimit { .. } => true,
            Self::Api { status, message } => {
                matches!(status, 401 | 403 | 429) || has_quota_keyword(message)
            }
            _ => false,
        }
    }

    /// Server-suggested retry delay in seconds, when known.
    #[must_use]
    pub fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimit { retry_after_secs, .. } => *retry_after_secs,
            _ => None,
        }
    }

    /// Builds the right variant for a non-success HTTP response.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();
        if status == 429 {
            return Self::RateLimit {
                message: parsed
                    .as_ref()
                    .map_or_else(|| "rate limit exceeded".to_string(), ApiErrorResponse::message),
                retry_after_secs: parsed.as_ref().and_then(ApiErrorResponse::retry_delay_secs),
            };
        }
        let message = parsed
            .map_or_else(|| status_fallback(status).to_string(), |p| p.message());
        Self::Api { status, message }
    }
}

fn has_quota_keyword(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["quota", "rate", "limit"].iter().any(|k| lower.contains(k))
}

fn status_fallback(status: u16) -> &'static str {
    match status {
        400 => "invalid request",
        401 => "authentication failed, check the API key",
        403 => "access denied, check the API key permissions",
        404 => "model not found",
        429 => "rate limit exceeded",
        500 => "server error",
        502..=504 => "service temporarily unavailable",
        _ => "HTTP error",
    }
}

/// Error body shape of the Gemini API.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    status: Option<String>,
    details: Option<Vec<ApiErrorInfo>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorInfo {
    Quota(QuotaFailureInfo),
    Retry(RetryInfoDetail),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct QuotaFailureInfo {
    #[serde(rename = "@type")]
    type_url: Option<String>,
    // Required, not optional: untagged matching needs this field to tell a
    // QuotaFailure detail apart from the other detail shapes.
    violations: Vec<QuotaViolation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuotaViolation {
    quota_id: Option<String>,
    quota_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetryInfoDetail {
    #[serde(rename = "retryDelay")]
    retry_delay: String,
}

impl ApiErrorResponse {
    /// Best human-readable message in the body, preferring a concrete
    /// quota violation over the generic text.
    fn message(&self) -> String {
        let Some(error) = &self.error else {
            return "unknown API error".to_string();
        };
        if let Some(details) = &error.details {
            for detail in details {
                let ApiErrorInfo::Quota(quota) = detail else {
                    continue;
                };
                let is_quota = quota
                    .type_url
                    .as_deref()
                    .is_some_and(|t| t.contains("QuotaFailure"));
                if !is_quota {
                    continue;
                }
                if let Some(v) = quota.violations.first() {
                    return format!(
                        "quota exceeded: {} (limit {})",
                        v.quota_id.as_deref().unwrap_or("unknown"),
                        v.quota_value.as_deref().unwrap_or("?"),
                    );
                }
            }
        }
        error
            .message
            .clone()
            .or_else(|| error.status.clone())
            .unwrap_or_else(|| "unknown API error".to_string())
    }

    /// Retry delay parsed from a `RetryInfo` detail ("20s" format).
    fn retry_delay_secs(&self) -> Option<u64> {
        let details = self.error.as_ref()?.details.as_ref()?;
        details.iter().find_map(|detail| {
            let ApiErrorInfo::Retry(info) = detail else {
                return None;
            };
            info.retry_delay.trim_end_matches('s').parse().ok()
        })
    }
}
