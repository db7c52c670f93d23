//! HTTP surface: router, shared state and the server loop.
//!
//! `/health` and `/openapi.json` are served outside the session gate. Every
//! other route, the fallback included, runs behind
//! [`session_gate`](crate::guard::session_gate).

pub mod handlers;
mod openapi;

pub use openapi::{ApiDoc, openapi};

use crate::{
    guard::{Gate, LoginOnPanic, session_gate},
    upstream::{FailureReason, UpstreamClient},
};
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, patch, post},
};
use handlers::{LoadError, admin, auth, health, public};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;

/// Fixed routes; the login page cannot be mounted on any of them.
pub const RESERVED_PATHS: [&str; 12] = [
    "/",
    "/health",
    "/openapi.json",
    "/projects",
    "/auth/logout",
    "/admin/dashboard",
    "/admin/pages",
    "/admin/projects",
    "/admin/media",
    "/admin/blogs",
    "/admin/galleries",
    "/admin/contacts",
];

/// Shared, immutable state for the loaders.
#[derive(Clone, Debug)]
pub struct AppState {
    pub upstream: UpstreamClient,
    pub login_path: String,
}

impl AppState {
    #[must_use]
    pub fn new(upstream: UpstreamClient, login_path: impl Into<String>) -> Self {
        Self {
            upstream,
            login_path: login_path.into(),
        }
    }

    /// Turn an upstream failure for `what` into a loader error.
    #[must_use]
    pub fn load_error(&self, what: &'static str, reason: FailureReason) -> LoadError {
        LoadError::from_upstream(what, reason, &self.login_path)
    }
}

/// Build the full application router.
///
/// The login page is mounted at the gate's configured login path, so the
/// guard's redirects and the page they point to always agree.
pub fn router(state: Arc<AppState>, gate: Arc<Gate>) -> Router {
    let login_path = gate.config().login_path().to_string();

    let pages = Router::new()
        .route("/", get(public::home))
        .route("/{slug}", get(public::page))
        .route("/projects", get(public::projects))
        .route("/projects/{slug}", get(public::project))
        .route("/blog/{slug}", get(public::blog))
        .route("/preview/pages/{slug}", get(public::preview_page))
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/pages", get(admin::pages))
        .route("/admin/pages/{id}/edit", get(admin::page_detail))
        .route("/admin/pages/{id}/preview", get(admin::page_detail))
        .route("/admin/projects", get(admin::projects))
        .route("/admin/projects/{id}/edit", get(admin::project_detail))
        .route("/admin/projects/{id}/preview", get(admin::project_detail))
        .route("/admin/media", get(admin::media))
        .route("/admin/blogs", get(admin::blogs))
        .route("/admin/blogs/{id}/edit", get(admin::blog_detail))
        .route("/admin/blogs/{id}/preview", get(admin::blog_detail))
        .route(
            "/admin/galleries",
            get(admin::galleries).post(admin::create_gallery),
        )
        .route("/admin/contacts", get(admin::contacts))
        .route(
            "/admin/contacts/{id}",
            get(admin::contact).delete(admin::delete_contact),
        )
        .route(
            "/admin/contacts/{id}/status",
            patch(admin::update_contact_status),
        )
        .route(&login_path, get(auth::login_page).post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(gate, session_gate))
        .layer(CatchPanicLayer::custom(LoginOnPanic::new(login_path)));

    Router::new()
        .route("/health", get(health::health))
        .route("/openapi.json", get(openapi::openapi_json))
        .merge(pages)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: Arc<AppState>, gate: Arc<Gate>) -> Result<()> {
    let app = router(state, gate);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install signal handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}
