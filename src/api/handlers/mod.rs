//! Page data loaders and shared handler utilities.
//!
//! Loaders run after the session gate, so every one of them can read the
//! caller from [`CurrentUser`](crate::guard::CurrentUser). Upstream failures
//! become [`LoadError`] responses; nothing here retries.

pub mod admin;
pub mod auth;
pub mod health;
pub mod public;

use crate::upstream::{FailureReason, ForwardedResponse};
use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Lowercase, URL-safe slugs as produced by the CMS.
pub fn valid_slug(slug: &str) -> bool {
    Regex::new(r"^[a-z0-9][a-z0-9-]*$").is_ok_and(|re| re.is_match(slug))
}

/// Resource ids are interpolated into upstream paths; keep them to one segment.
pub fn valid_id(id: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").is_ok_and(|re| re.is_match(id))
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Why a loader could not produce page data.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Upstream no longer accepts the session; send the caller to log in again.
    #[error("session expired")]
    SessionExpired(String),
    #[error(transparent)]
    Upstream(FailureReason),
}

impl LoadError {
    /// Map an upstream failure for `what`, sending 401s to `login_path`.
    #[must_use]
    pub fn from_upstream(what: &'static str, reason: FailureReason, login_path: &str) -> Self {
        if reason.is_not_found() {
            return Self::NotFound(what);
        }
        match reason.status() {
            Some(StatusCode::UNAUTHORIZED) => Self::SessionExpired(login_path.to_string()),
            _ => Self::Upstream(reason),
        }
    }
}

impl IntoResponse for LoadError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::SessionExpired(location) => return Redirect::to(location).into_response(),
            Self::Upstream(FailureReason::Status { status, .. }) => (*status, "upstream_error"),
            Self::Upstream(FailureReason::Timeout) => {
                (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout")
            }
            Self::Upstream(FailureReason::Unreachable(_) | FailureReason::Decode(_)) => {
                (StatusCode::BAD_GATEWAY, "bad_gateway")
            }
        };

        if status.is_server_error() {
            error!("Failed to load page data: {self}");
        }

        let body = ErrorBody {
            code,
            message: match &self {
                Self::NotFound(what) => format!("{what} not found"),
                _ => "Failed to load page data".to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Hand an upstream answer back as-is: status, JSON body and `Set-Cookie`.
pub fn relay(forwarded: ForwardedResponse) -> Response {
    let mut response = if forwarded.body.is_null() {
        forwarded.status.into_response()
    } else {
        (forwarded.status, Json(forwarded.body)).into_response()
    };
    append_cookies(response.headers_mut(), forwarded.set_cookies);
    response
}

fn append_cookies(headers: &mut HeaderMap, cookies: Vec<HeaderValue>) {
    for cookie in cookies {
        headers.append(SET_COOKIE, cookie);
    }
}

/// Fallback for paths no loader claims.
pub async fn not_found() -> LoadError {
    LoadError::NotFound("page")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_validation() {
        assert!(valid_slug("about"));
        assert!(valid_slug("my-first-post-2"));
        assert!(!valid_slug("About"));
        assert!(!valid_slug("-leading"));
        assert!(!valid_slug("a/b"));
        assert!(!valid_slug(""));
    }

    #[test]
    fn id_validation() {
        assert!(valid_id("4f1c2a"));
        assert!(valid_id("42"));
        assert!(!valid_id("../etc"));
        assert!(!valid_id("a?b=c"));
        assert!(!valid_id(&"x".repeat(65)));
    }

    #[test]
    fn upstream_failures_map_to_statuses() {
        let cases = [
            (
                FailureReason::Status {
                    status: StatusCode::NOT_FOUND,
                    message: String::new(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                FailureReason::Status {
                    status: StatusCode::UNAUTHORIZED,
                    message: String::new(),
                },
                StatusCode::SEE_OTHER,
            ),
            (
                FailureReason::Status {
                    status: StatusCode::FORBIDDEN,
                    message: String::new(),
                },
                StatusCode::FORBIDDEN,
            ),
            (FailureReason::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (
                FailureReason::Unreachable("refused".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                FailureReason::Decode("eof".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (reason, expected) in cases {
            let response = LoadError::from_upstream("page", reason, "/auth/login").into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn relay_keeps_status_body_and_cookies() {
        let response = relay(ForwardedResponse {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: serde_json::json!({ "message": "slug taken" }),
            set_cookies: vec![
                HeaderValue::from_static("a=1"),
                HeaderValue::from_static("b=2"),
            ],
        });
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 2);

        let empty = relay(ForwardedResponse {
            status: StatusCode::NO_CONTENT,
            body: serde_json::Value::Null,
            set_cookies: Vec::new(),
        });
        assert_eq!(empty.status(), StatusCode::NO_CONTENT);
        assert!(empty.headers().get("content-type").is_none());
    }

    #[test]
    fn session_expired_redirects_to_login() {
        let response = LoadError::SessionExpired("/auth/login".to_string()).into_response();
        assert_eq!(
            response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok()),
            Some("/auth/login")
        );
    }
}
