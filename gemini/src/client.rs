use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{AuthMode, GeminiConfig, USER_AGENT};
use crate::error::GeminiError;
use crate::types::{GenerateContentRequest, GenerateContentResponse};

/// Calls `generateContent` on the given model.
pub fn generate(
    cfg: &GeminiConfig,
    model: &str,
    request: &GenerateContentRequest,
) -> Result<GenerateContentResponse, GeminiError> {
    post_json(cfg, &cfg.model_endpoint(model, "generateContent"), request)
}

pub(crate) fn http_client(cfg: &GeminiConfig) -> Result<Client, GeminiError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()?)
}

pub(crate) fn apply_auth(cfg: &GeminiConfig, request: RequestBuilder) -> RequestBuilder {
    let request = request.header(header::USER_AGENT, USER_AGENT);
    if cfg.auth == AuthMode::Header {
        request.header("x-goog-api-key", &cfg.api_key)
    } else {
        request
    }
}

/// Reads a response, mapping non-success statuses to typed errors.
pub(crate) fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GeminiError> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(GeminiError::from_response(status.as_u16(), &body));
    }
    Ok(serde_json::from_str(&body)?)
}

pub(crate) fn get_json<T: DeserializeOwned>(
    cfg: &GeminiConfig,
    endpoint: &str,
) -> Result<T, GeminiError> {
    let http = http_client(cfg)?;
    let response = apply_auth(cfg, http.get(endpoint)).send()?;
    read_json(response)
}

/// POSTs a JSON body, retrying connect failures a couple of times before
/// giving up; every other failure surfaces immediately.
pub(crate) fn post_json<T: DeserializeOwned, B: Serialize>(
    cfg: &GeminiConfig,
    endpoint: &str,
    body: &B,
) -> Result<T, GeminiError> {
    let http = http_client(cfg)?;
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let request = apply_auth(cfg, http.post(endpoint)).json(body);
        match request.send() {
            Ok(response) => return read_json(response),
            Err(error) => {
                if !error.is_connect() || attempt >= 3 {
                    return Err(error.into());
                }
                debug!(attempt, %error, "connect failed, retrying");
                thread::sleep(Duration::from_millis(200 * u64::from(attempt)));
            }
        }
    }
}
