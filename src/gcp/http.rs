//! HTTP utilities for GCP REST API calls

use crate::error::CountError;
use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate a response body and strip control characters for logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Failure of a REST call
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Failed to send request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request failed: {status}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to parse response JSON: {0}")]
    Decode(String),

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl HttpError {
    /// Map a REST failure onto the counting taxonomy by status code
    pub fn classify(&self) -> CountError {
        match self {
            HttpError::Status { status, body } => {
                let detail = sanitize_for_log(body);
                if *status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
                    CountError::RateLimited { detail }
                } else if *status == StatusCode::FORBIDDEN {
                    CountError::PermissionDenied { detail }
                } else {
                    CountError::Command(format_status(*status))
                }
            }
            HttpError::Decode(detail) => CountError::Decode {
                detail: detail.clone(),
            },
            HttpError::Transport(e) => CountError::Command(format!("Request failed: {}", e)),
            HttpError::Auth(_) => CountError::Command(self.to_string()),
        }
    }
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cloud-asset-count/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request and parse the JSON body
    pub async fn get(&self, url: &str, token: &str) -> Result<Value, HttpError> {
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).bearer_auth(token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(HttpError::Status { status, body });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

/// Short user-facing message for a non-success status
pub fn format_status(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Authentication failed. Run 'gcloud auth application-default login'.".to_string(),
        404 => "Resource not found.".to_string(),
        400 => "Invalid request. Check the asset type.".to_string(),
        500 | 503 => "GCP service temporarily unavailable.".to_string(),
        _ => format!("API request failed: {}", status),
    }
}
