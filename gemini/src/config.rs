use std::sync::Arc;

/// Gemini REST base URL used by the Developer API.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Files API upload endpoint (separate host path from the REST base).
pub const UPLOAD_BASE_URL: &str = "https://generativelanguage.googleapis.com/upload/v1beta/files";

pub const USER_AGENT: &str = "tomecut/0.1";

/// Model used when the caller does not pick one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Whole-request timeout; structure extraction over a full book PDF can
/// run for minutes.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Authentication strategy supported by the Gemini backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Attach `?key=API_KEY` to every request (default).
    Query,
    /// Send the API key via `x-goog-api-key` header.
    Header,
}

/// Handle to a configured Gemini backend; cheap to clone.
#[derive(Clone, Debug)]
pub struct GeminiBackend {
    inner: Arc<GeminiConfig>,
}

impl GeminiBackend {
    /// Creates a backend for one credential with the default model.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(GeminiConfig {
                api_key: api_key.into(),
                base_url: GEMINI_API_BASE_URL.to_string(),
                upload_url: UPLOAD_BASE_URL.to_string(),
                auth: AuthMode::Query,
                model: sanitize_model(DEFAULT_MODEL),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            }),
        }
    }

    /// Override the REST base URL (useful for sandboxes or proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).base_url = base_url.into();
        self
    }

    /// Override the Files API upload URL.
    #[must_use]
    pub fn with_upload_url(mut self, upload_url: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).upload_url = upload_url.into();
        self
    }

    /// Select header-based authentication.
    #[must_use]
    pub fn with_auth_mode(mut self, mode: AuthMode) -> Self {
        Arc::make_mut(&mut self.inner).auth = mode;
        self
    }

    /// Override the default model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).model = sanitize_model(model);
        self
    }

    /// Override the whole-request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        Arc::make_mut(&mut self.inner).timeout_secs = secs;
        self
    }

    /// Shared view of the resolved configuration.
    #[must_use]
    pub fn config(&self) -> Arc<GeminiConfig> {
        self.inner.clone()
    }
}

/// Resolved request parameters for one credential.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) upload_url: String,
    pub(crate) auth: AuthMode,
    pub(crate) model: String,
    pub(crate) timeout_secs: u64,
}

impl GeminiConfig {
    /// Model this configuration targets, in `models/<name>` form.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn endpoint(&self, suffix: &str) -> String {
        let mut url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            suffix.trim_start_matches('/')
        );
        if self.auth == AuthMode::Query {
            let separator = if url.contains('?') { '&' } else { '?' };
            url.push(separator);
            url.push_str("key=");
            url.push_str(&self.api_key);
        }
        url
    }

    pub(crate) fn model_endpoint(&self, model: &str, action: &str) -> String {
        let model = sanitize_model(model);
        self.endpoint(&format!("{model}:{action}"))
    }

    pub(crate) fn upload_endpoint(&self) -> String {
        let mut url = self.upload_url.clone();
        if self.auth == AuthMode::Query {
            url.push_str("?key=");
            url.push_str(&self.api_key);
        }
        url
    }
}

/// Normalizes a model name to the `models/<name>` resource form.
pub fn sanitize_model(model: impl Into<String>) -> String {
    let model = model.into();
    if model.starts_with("models/") {
        model
    } else {
        format!("models/{model}")
    }
}
