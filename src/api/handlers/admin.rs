//! Admin loaders. Every route here sits under the protected prefix, so the
//! gate has already redirected anonymous callers before any of these run.

use super::{LoadError, relay, valid_id};
use crate::{api::AppState, guard::CurrentUser, session::Identity, upstream::Pagination};
use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, Method},
    response::Response,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{collections::BTreeMap, sync::Arc};
use tracing::warn;
use url::form_urlencoded;

/// Page size requested from the admin listing endpoints.
pub const PAGE_LIMIT: u32 = 20;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub label: &'static str,
    pub href: &'static str,
}

/// Sidebar entries; the first one is where `/admin` lands.
pub const NAVIGATION: [NavItem; 5] = [
    NavItem {
        label: "Dashboard",
        href: "/admin/dashboard",
    },
    NavItem {
        label: "Pages",
        href: "/admin/pages",
    },
    NavItem {
        label: "Projects",
        href: "/admin/projects",
    },
    NavItem {
        label: "Media",
        href: "/admin/media",
    },
    NavItem {
        label: "Contacts",
        href: "/admin/contacts",
    },
];

#[derive(Deserialize, Debug, Default)]
pub struct ListQuery {
    page: Option<String>,
    page_type: Option<String>,
}

impl ListQuery {
    /// Requested page, falling back to 1 for anything that is not a positive number.
    fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|page| page.trim().parse::<u32>().ok())
            .filter(|page| *page > 0)
            .unwrap_or(1)
    }

    fn page_type(&self) -> Option<&str> {
        self.page_type
            .as_deref()
            .map(str::trim)
            .filter(|kind| !kind.is_empty() && *kind != "all")
    }
}

#[derive(Serialize, Debug)]
pub struct Dashboard {
    pub user: Option<Identity>,
    pub navigation: &'static [NavItem],
}

/// Listing page data; the items sit under the resource name (`pages`, `media`, ...).
#[derive(Serialize, Debug)]
pub struct Listing {
    pub user: Option<Identity>,
    #[serde(flatten)]
    pub items: BTreeMap<&'static str, Value>,
    pub pagination: Pagination,
}

/// One resource for the edit and preview screens, under its singular name.
#[derive(Serialize, Debug)]
pub struct Detail {
    pub user: Option<Identity>,
    #[serde(flatten)]
    pub item: BTreeMap<&'static str, Value>,
}

#[derive(Serialize, Debug)]
pub struct ContactData {
    pub user: Option<Identity>,
    pub contact: Value,
}

#[derive(Deserialize, Debug)]
pub struct StatusUpdate {
    pub status: String,
}

pub async fn dashboard(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<Dashboard> {
    Json(Dashboard {
        user,
        navigation: &NAVIGATION,
    })
}

pub async fn pages(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Listing>, LoadError> {
    list(&state, &headers, user, "pages", &query).await.map(Json)
}

pub async fn projects(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Listing>, LoadError> {
    list(&state, &headers, user, "projects", &query).await.map(Json)
}

pub async fn media(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Listing>, LoadError> {
    list(&state, &headers, user, "media", &query).await.map(Json)
}

pub async fn blogs(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Listing>, LoadError> {
    list(&state, &headers, user, "blogs", &query).await.map(Json)
}

pub async fn contacts(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Listing>, LoadError> {
    list(&state, &headers, user, "contacts", &query).await.map(Json)
}

pub async fn contact(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ContactData>, LoadError> {
    if !valid_id(&id) {
        return Err(LoadError::NotFound("contact"));
    }

    let contact = state
        .upstream
        .get_json::<Value>(&format!("/api/v1/admin/contacts/{id}"), &headers)
        .await
        .into_result()
        .map_err(|reason| state.load_error("contact", reason))?;

    Ok(Json(ContactData { user, contact }))
}

pub async fn galleries(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Listing>, LoadError> {
    list(&state, &headers, user, "galleries", &query).await.map(Json)
}

/// Create a gallery; the CMS validates the draft and its answer is relayed.
pub async fn create_gallery(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<Value>,
) -> Result<Response, LoadError> {
    let forwarded = state
        .upstream
        .send_forward(Method::POST, "/api/v1/admin/galleries", &headers, Some(&draft))
        .await
        .into_result()
        .map_err(LoadError::Upstream)?;

    if !forwarded.status.is_success() {
        warn!(status = %forwarded.status, "upstream rejected gallery");
    }
    Ok(relay(forwarded))
}

pub async fn page_detail(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Detail>, LoadError> {
    detail(&state, &headers, user, "pages", "page", &id).await.map(Json)
}

pub async fn project_detail(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Detail>, LoadError> {
    detail(&state, &headers, user, "projects", "project", &id).await.map(Json)
}

pub async fn blog_detail(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Detail>, LoadError> {
    detail(&state, &headers, user, "blogs", "blog", &id).await.map(Json)
}

pub async fn update_contact_status(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Response, LoadError> {
    if !valid_id(&id) {
        return Err(LoadError::NotFound("contact"));
    }

    let forwarded = state
        .upstream
        .send_forward(
            Method::PATCH,
            &format!("/api/v1/admin/contacts/{id}/status"),
            &headers,
            Some(&json!({ "status": update.status })),
        )
        .await
        .into_result()
        .map_err(LoadError::Upstream)?;

    if !forwarded.status.is_success() {
        warn!(%id, status = %forwarded.status, "upstream rejected contact status");
    }
    Ok(relay(forwarded))
}

pub async fn delete_contact(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, LoadError> {
    if !valid_id(&id) {
        return Err(LoadError::NotFound("contact"));
    }

    let forwarded = state
        .upstream
        .send_forward(
            Method::DELETE,
            &format!("/api/v1/admin/contacts/{id}"),
            &headers,
            None,
        )
        .await
        .into_result()
        .map_err(LoadError::Upstream)?;

    if !forwarded.status.is_success() {
        warn!(%id, status = %forwarded.status, "upstream rejected contact delete");
    }
    Ok(relay(forwarded))
}

async fn detail(
    state: &AppState,
    headers: &HeaderMap,
    user: Option<Identity>,
    resource: &str,
    key: &'static str,
    id: &str,
) -> Result<Detail, LoadError> {
    if !valid_id(id) {
        return Err(LoadError::NotFound(key));
    }

    let item = state
        .upstream
        .get_json::<Value>(&format!("/api/v1/admin/{resource}/{id}"), headers)
        .await
        .into_result()
        .map_err(|reason| state.load_error(key, reason))?;

    Ok(Detail {
        user,
        item: BTreeMap::from([(key, unwrap_data(item))]),
    })
}

/// Admin detail endpoints answer either `{ data: item }` or the bare item.
fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut object) if object.get("data").is_some_and(|data| !data.is_null()) => {
            object.remove("data").unwrap_or_default()
        }
        other => other,
    }
}

async fn list(
    state: &AppState,
    headers: &HeaderMap,
    user: Option<Identity>,
    resource: &'static str,
    query: &ListQuery,
) -> Result<Listing, LoadError> {
    let envelope = state
        .upstream
        .get_envelope::<Value>(&listing_path(resource, query), headers)
        .await
        .into_result()
        .map_err(|reason| state.load_error(resource, reason))?;

    Ok(Listing {
        user,
        pagination: envelope.pagination(),
        items: BTreeMap::from([(resource, envelope.data)]),
    })
}

fn listing_path(resource: &str, query: &ListQuery) -> String {
    let mut params = form_urlencoded::Serializer::new(String::new());
    params.append_pair("page", &query.page().to_string());
    params.append_pair("limit", &PAGE_LIMIT.to_string());
    if let Some(kind) = query.page_type() {
        params.append_pair("page_type", kind);
    }

    format!("/api/v1/admin/{resource}?{}", params.finish())
}
