//! HTTP client for the CMS backend.
//!
//! Every upstream call in the crate goes through [`UpstreamClient`]: the session
//! resolver, the page loaders and the login/logout forwarding. The client owns
//! the timeout policy and the error mapping, so callers only ever see an
//! [`ApiOutcome`]. It never stores credentials; it forwards the caller's
//! `Cookie` and `Authorization` headers as-is.

mod outcome;

pub use outcome::{ApiOutcome, Envelope, FailureReason, Pagination};

use anyhow::{Context, Result};
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode,
    header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderValue, SET_COOKIE},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Maximum number of error body characters kept in a failure reason.
const MAX_ERROR_CHARS: usize = 200;

/// Raw upstream answer relayed back to the browser (login/logout).
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub body: Value,
    pub set_cookies: Vec<HeaderValue>,
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    base_url: String,
    client: Client,
}

impl UpstreamClient {
    /// Build a client with the crate user agent and a bounded request timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            client,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        build_url(&self.base_url, path)
    }

    /// GET a JSON document, forwarding the caller's credentials.
    #[instrument(skip(self, forward))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        forward: &HeaderMap,
    ) -> ApiOutcome<T> {
        let request = forward_credentials(self.client.get(self.url(path)), forward);

        let outcome = match request.send().await {
            Ok(response) => decode_json(response).await,
            Err(err) => ApiOutcome::Failure(map_transport_error(&err)),
        };

        if let ApiOutcome::Failure(reason) = &outcome {
            log_failure(path, reason);
        }

        outcome
    }

    /// GET an `/api/v1` resource wrapped in `{ data, pagination? }`.
    pub async fn get_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        forward: &HeaderMap,
    ) -> ApiOutcome<Envelope<T>> {
        self.get_json(path, forward).await
    }

    /// Liveness check: any success status counts, the body is ignored.
    #[instrument(skip(self))]
    pub async fn probe(&self, path: &str) -> bool {
        match self.client.get(self.url(path)).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                log_failure(path, &map_transport_error(&err));
                false
            }
        }
    }

    /// POST to upstream and hand back status, body and `Set-Cookie` headers.
    pub async fn post_forward(
        &self,
        path: &str,
        forward: &HeaderMap,
        body: Option<&Value>,
    ) -> ApiOutcome<ForwardedResponse> {
        self.send_forward(Method::POST, path, forward, body).await
    }

    /// Send a mutating request upstream and hand back status, body and
    /// `Set-Cookie` headers.
    ///
    /// Non-success statuses are not failures here: a rejected login still has a
    /// body the browser needs to see.
    #[instrument(skip(self, forward, body))]
    pub async fn send_forward(
        &self,
        method: Method,
        path: &str,
        forward: &HeaderMap,
        body: Option<&Value>,
    ) -> ApiOutcome<ForwardedResponse> {
        let mut request =
            forward_credentials(self.client.request(method, self.url(path)), forward);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let reason = map_transport_error(&err);
                log_failure(path, &reason);
                return ApiOutcome::Failure(reason);
            }
        };

        let status = response.status();
        let set_cookies: Vec<HeaderValue> =
            response.headers().get_all(SET_COOKIE).iter().cloned().collect();

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return ApiOutcome::Failure(map_transport_error(&err)),
        };

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(err) => {
                    let reason = FailureReason::Decode(err.to_string());
                    log_failure(path, &reason);
                    return ApiOutcome::Failure(reason);
                }
            }
        };

        debug!(%status, cookies = set_cookies.len(), "upstream forward completed");

        ApiOutcome::Success(ForwardedResponse {
            status,
            body,
            set_cookies,
        })
    }
}

/// Join a base URL and a path with exactly one slash; query strings pass through.
#[must_use]
pub fn build_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

fn forward_credentials(mut request: RequestBuilder, forward: &HeaderMap) -> RequestBuilder {
    for name in [COOKIE, AUTHORIZATION] {
        for value in forward.get_all(&name) {
            request = request.header(name.clone(), value.clone());
        }
    }
    request
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> ApiOutcome<T> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return ApiOutcome::Failure(FailureReason::Status {
            status,
            message: sanitize_body(&body),
        });
    }

    match response.bytes().await {
        Ok(bytes) => serde_json::from_slice::<T>(&bytes)
            .map_err(|err| FailureReason::Decode(err.to_string()))
            .into(),
        Err(err) => ApiOutcome::Failure(map_transport_error(&err)),
    }
}

fn map_transport_error(err: &reqwest::Error) -> FailureReason {
    if err.is_timeout() {
        FailureReason::Timeout
    } else if err.is_decode() {
        FailureReason::Decode(err.to_string())
    } else {
        FailureReason::Unreachable(err.to_string())
    }
}

fn log_failure(path: &str, reason: &FailureReason) {
    match reason {
        FailureReason::Status { .. } => debug!(path, %reason, "upstream call rejected"),
        _ => warn!(path, %reason, "upstream call failed"),
    }
}

fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
