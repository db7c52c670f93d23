//! Route guard and the session gate middleware.
//!
//! Flow Overview: resolve the caller, evaluate the route policy for the
//! request path, then either attach the identity to the request and run the
//! loader, or answer with a redirect and skip the loader entirely.
//!
//! Security boundaries: evaluation fails closed. A path the guard cannot
//! classify is sent to the login page, never let through.

mod policy;

pub use policy::{ADMIN_PREFIX, AccessLevel, PolicyError, RoutePolicy};

use crate::session::{Identity, SessionResolver};
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::{any::Any, sync::Arc};
use thiserror::Error;
use tower_http::catch_panic::ResponseForPanic;
use tracing::{debug, error, warn};

pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
/// First sidebar destination.
pub const DEFAULT_LANDING_PATH: &str = "/admin/dashboard";

/// Identity resolved for this request, readable by every loader.
#[derive(Clone, Debug, Default)]
pub struct CurrentUser(pub Option<Identity>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("request path {0:?} is not absolute")]
    RelativePath(String),
    #[error("request path {0:?} contains dot segments")]
    DotSegments(String),
}

#[derive(Clone, Debug)]
pub struct GuardConfig {
    policy: RoutePolicy,
    login_path: String,
    landing_path: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::new(RoutePolicy::default())
    }
}

impl GuardConfig {
    #[must_use]
    pub fn new(policy: RoutePolicy) -> Self {
        Self {
            policy,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            landing_path: DEFAULT_LANDING_PATH.to_string(),
        }
    }

    #[must_use]
    pub fn with_login_path(mut self, path: String) -> Self {
        self.login_path = path;
        self
    }

    #[must_use]
    pub fn with_landing_path(mut self, path: String) -> Self {
        self.landing_path = path;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }
}

/// Decide whether a request for `path` may proceed.
///
/// # Errors
/// Returns an error for paths the policy table cannot classify safely; callers
/// must treat that as a denial.
pub fn evaluate(
    identity: Option<&Identity>,
    path: &str,
    config: &GuardConfig,
) -> Result<Decision, GuardError> {
    let path = normalize_path(path)?;
    let authenticated = identity.is_some();

    if authenticated && same_route(&path, &config.login_path) {
        return Ok(Decision::Redirect(config.landing_path.clone()));
    }

    // Cosmetic: the bare admin root has no page of its own.
    if authenticated && same_route(&path, ADMIN_PREFIX) {
        return Ok(Decision::Redirect(config.landing_path.clone()));
    }

    match config.policy.level_for(&path) {
        AccessLevel::Public => Ok(Decision::Allow),
        AccessLevel::Authenticated if authenticated => Ok(Decision::Allow),
        AccessLevel::Authenticated => Ok(Decision::Redirect(config.login_path.clone())),
    }
}

/// Shared state for [`session_gate`].
#[derive(Clone, Debug)]
pub struct Gate {
    resolver: SessionResolver,
    config: GuardConfig,
}

impl Gate {
    #[must_use]
    pub fn new(resolver: SessionResolver, config: GuardConfig) -> Self {
        Self { resolver, config }
    }

    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

/// Resolve the caller and apply the route guard before any loader runs.
pub async fn session_gate(
    State(gate): State<Arc<Gate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let identity = gate.resolver.resolve(request.headers()).await;

    let decision = evaluate(identity.as_ref(), &path, &gate.config).unwrap_or_else(|err| {
        warn!(%err, "guard evaluation failed, denying");
        Decision::Redirect(gate.config.login_path.clone())
    });

    match decision {
        Decision::Allow => {
            request.extensions_mut().insert(CurrentUser(identity));
            next.run(request).await
        }
        Decision::Redirect(location) => {
            debug!(path = %path, location = %location, "guard redirect");
            Redirect::to(&location).into_response()
        }
    }
}

/// Panic handler for the gated router: a request that panics is answered with
/// a redirect to the login page, like any other guard failure.
#[derive(Clone, Debug)]
pub struct LoginOnPanic {
    login_path: String,
}

impl LoginOnPanic {
    #[must_use]
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }
}

impl ResponseForPanic for LoginOnPanic {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let message = err
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| err.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!(panic = %message, "request panicked, redirecting to login");
        Redirect::to(&self.login_path).into_response()
    }
}

/// Collapse repeated slashes; reject relative paths and dot segments.
fn normalize_path(path: &str) -> Result<String, GuardError> {
    if !path.starts_with('/') {
        return Err(GuardError::RelativePath(path.to_string()));
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(GuardError::DotSegments(path.to_string()));
    }

    let mut normalized = format!("/{}", segments.join("/"));
    if path.ends_with('/') && normalized.len() > 1 {
        normalized.push('/');
    }
    Ok(normalized)
}

fn same_route(path: &str, route: &str) -> bool {
    path.trim_end_matches('/') == route.trim_end_matches('/')
}
