//! Session resolution.
//!
//! Flow Overview: look for the session token; when present, forward the
//! caller's cookies to upstream `GET /auth/me` and decode the identity. Every
//! failure (non-success status, non-JSON body, timeout, connection error)
//! degrades to "anonymous". Anonymous callers must still be able to render
//! public pages, so nothing here returns an error.

mod identity;
mod token;

pub use identity::Identity;
pub use token::{SessionToken, extract_session_token};

use crate::upstream::{ApiOutcome, UpstreamClient};
use axum::http::HeaderMap;
use tracing::{debug, instrument};

/// Upstream "who am I" endpoint.
pub const ME_PATH: &str = "/auth/me";

/// Default name of the cookie carrying the session token.
pub const DEFAULT_SESSION_COOKIE: &str = "session_token";

#[derive(Clone, Debug)]
pub struct SessionResolver {
    upstream: UpstreamClient,
    cookie_name: String,
}

impl SessionResolver {
    #[must_use]
    pub fn new(upstream: UpstreamClient, cookie_name: impl Into<String>) -> Self {
        Self {
            upstream,
            cookie_name: cookie_name.into(),
        }
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Resolve the caller for this request, or `None` for anonymous.
    ///
    /// No token means no upstream round trip.
    #[instrument(skip_all)]
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        if extract_session_token(headers, &self.cookie_name).is_none() {
            debug!("no session token, anonymous request");
            return None;
        }

        match self.upstream.get_json::<Identity>(ME_PATH, headers).await {
            ApiOutcome::Success(identity) => {
                debug!(user_id = %identity.id, "session resolved");
                Some(identity)
            }
            ApiOutcome::Failure(reason) => {
                debug!(%reason, "session not resolved, continuing anonymously");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header::COOKIE};
    use serde_json::json;
    use std::{net::TcpListener, time::Duration};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn resolver(base: &str) -> SessionResolver {
        let upstream = UpstreamClient::new(base, Duration::from_secs(2)).unwrap();
        SessionResolver::new(upstream, DEFAULT_SESSION_COOKIE)
    }

    fn with_cookie(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static(value));
        headers
    }

    #[tokio::test]
    async fn no_cookie_skips_upstream() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "u1" })))
            .expect(0)
            .mount(&server)
            .await;

        let identity = resolver(&server.uri()).resolve(&HeaderMap::new()).await;
        assert!(identity.is_none());
    }

    #[tokio::test]
    async fn valid_cookie_resolves_identity_idempotently() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .and(header("cookie", "session_token=good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u1",
                "email": "ada@example.com",
                "first_name": "Ada",
                "last_name": "Lovelace"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let resolver = resolver(&server.uri());
        let headers = with_cookie("session_token=good");
        let first = resolver.resolve(&headers).await;
        let second = resolver.resolve(&headers).await;

        assert_eq!(first.as_ref().map(|i| i.id.as_str()), Some("u1"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn upstream_failures_degrade_to_anonymous() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .and(header("cookie", "session_token=expired"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "code": "unauthorized",
                "message": "Session expired"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .and(header("cookie", "session_token=html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .and(header("cookie", "session_token=slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "u1" }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let resolver = resolver(&server.uri());
        assert!(resolver.resolve(&with_cookie("session_token=expired")).await.is_none());
        assert!(resolver.resolve(&with_cookie("session_token=html")).await.is_none());

        let impatient = SessionResolver::new(
            UpstreamClient::new(&server.uri(), Duration::from_millis(50)).unwrap(),
            DEFAULT_SESSION_COOKIE,
        );
        assert!(impatient.resolve(&with_cookie("session_token=slow")).await.is_none());
    }

    #[tokio::test]
    async fn unreachable_upstream_degrades_to_anonymous() {
        let Ok(listener) = TcpListener::bind("127.0.0.1:0") else {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        };
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let identity = resolver(&format!("http://{addr}"))
            .resolve(&with_cookie("session_token=good"))
            .await;
        assert!(identity.is_none());
    }
}
