/// Blocking HTTP client for the `/api/{zip}` endpoint.
///
/// Used by the `explore` binary. Failures are collapsed into
/// `ClientFetchError`, which the Report View shows as a terse notice; no
/// retries are attempted here.

use std::time::Duration;

use crate::config::ClientConfig;
use crate::logging::{self, Component};
use crate::model::{ApiResponse, ErrorBody};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Ways fetching a report can fail on the client side.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFetchError {
    /// The request never produced a response (DNS, refused, timeout).
    Transport(String),
    /// Non-2xx response; carries the server's error message when it sent one.
    Status { code: u16, message: String },
    /// The body could not be decoded as a report.
    Parse(String),
}

impl std::fmt::Display for ClientFetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientFetchError::Transport(msg) => write!(f, "Request failed: {}", msg),
            ClientFetchError::Status { code, message } => write!(f, "HTTP {}: {}", code, message),
            ClientFetchError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ClientFetchError {}

impl From<reqwest::Error> for ClientFetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientFetchError::Parse(err.to_string())
        } else {
            ClientFetchError::Transport(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ApiClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientFetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientFetchError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    /// URL of the report for `zip`.
    pub fn report_url(&self, zip: &str) -> String {
        format!("{}/api/{}", self.base_url, zip)
    }

    /// Fetches and decodes the report for `zip`.
    pub fn fetch_report(&self, zip: &str) -> Result<ApiResponse, ClientFetchError> {
        let url = self.report_url(zip);
        logging::debug(Component::Client, Some(zip), &format!("GET {}", url));

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .map(|body| body.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
            logging::warn(Component::Client, Some(zip), &format!("HTTP {}: {}", status.as_u16(), message));
            return Err(ClientFetchError::Status {
                code: status.as_u16(),
                message,
            });
        }

        let text = response.text()?;
        serde_json::from_str(&text).map_err(|e| ClientFetchError::Parse(e.to_string()))
    }
}
