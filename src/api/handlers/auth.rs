//! Login and logout. The CMS owns the session: these handlers forward to it
//! and relay its `Set-Cookie` headers untouched.

use super::{LoadError, append_cookies, relay};
use crate::{api::AppState, guard::CurrentUser, session::Identity, upstream::ApiOutcome};
use axum::{
    Json,
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const UPSTREAM_LOGIN_PATH: &str = "/auth/login";
pub const UPSTREAM_LOGOUT_PATH: &str = "/auth/logout";

#[derive(Serialize, Debug)]
pub struct LoginPage {
    pub user: Option<Identity>,
}

/// Login page data. Authenticated callers are redirected by the gate first.
pub async fn login_page(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<LoginPage> {
    Json(LoginPage { user })
}

pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(credentials): Json<Value>,
) -> Result<Response, LoadError> {
    let forwarded = state
        .upstream
        .post_forward(UPSTREAM_LOGIN_PATH, &headers, Some(&credentials))
        .await
        .into_result()
        .map_err(LoadError::Upstream)?;

    debug!(status = %forwarded.status, "login forwarded");

    Ok(relay(forwarded))
}

/// End the session upstream and send the caller to the login page.
///
/// The redirect happens even when upstream fails; the browser cookie is then
/// left for upstream to expire.
pub async fn logout(Extension(state): Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let mut response = Redirect::to(&state.login_path).into_response();

    match state
        .upstream
        .post_forward(UPSTREAM_LOGOUT_PATH, &headers, None)
        .await
    {
        ApiOutcome::Success(forwarded) => {
            if !forwarded.status.is_success() {
                warn!(status = %forwarded.status, "upstream rejected logout");
            }
            append_cookies(response.headers_mut(), forwarded.set_cookies);
        }
        ApiOutcome::Failure(reason) => warn!(%reason, "logout not forwarded"),
    }

    response
}
