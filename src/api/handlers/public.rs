//! Public site loaders: home, CMS pages, projects and blog posts.

use super::{LoadError, valid_id, valid_slug};
use crate::{api::AppState, guard::CurrentUser, session::Identity, upstream::Pagination};
use axum::{
    Json,
    extract::{Extension, Path},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, instrument};

const HOME_SLUG: &str = "home";

/// Upper bound on media requests in flight for one page.
pub const MEDIA_PREFETCH_CONCURRENCY: usize = 8;

#[derive(Serialize, Debug)]
pub struct PageData {
    pub user: Option<Identity>,
    pub page: Value,
    pub media_map: Map<String, Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_preview: bool,
}

#[derive(Serialize, Debug)]
pub struct ProjectList {
    pub user: Option<Identity>,
    pub projects: Value,
    pub pagination: Pagination,
}

#[derive(Serialize, Debug)]
pub struct ProjectData {
    pub user: Option<Identity>,
    pub project: Value,
}

#[derive(Serialize, Debug)]
pub struct BlogData {
    pub user: Option<Identity>,
    pub blog: Value,
}

pub async fn home(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
) -> Result<Json<PageData>, LoadError> {
    load_published_page(&state, &headers, HOME_SLUG, user).await.map(Json)
}

pub async fn page(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Response, LoadError> {
    // The home page is only reachable at `/`.
    if slug == HOME_SLUG {
        return Ok(Redirect::permanent("/").into_response());
    }
    if !valid_slug(&slug) {
        return Err(LoadError::NotFound("page"));
    }

    let data = load_published_page(&state, &headers, &slug, user).await?;
    Ok(Json(data).into_response())
}

pub async fn projects(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
) -> Result<Json<ProjectList>, LoadError> {
    let envelope = state
        .upstream
        .get_envelope::<Value>("/api/v1/projects", &headers)
        .await
        .into_result()
        .map_err(|reason| state.load_error("projects", reason))?;

    Ok(Json(ProjectList {
        user,
        pagination: envelope.pagination(),
        projects: envelope.data,
    }))
}

pub async fn project(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<ProjectData>, LoadError> {
    if !valid_slug(&slug) {
        return Err(LoadError::NotFound("project"));
    }

    let project = state
        .upstream
        .get_json::<Value>(&format!("/api/v1/projects/{slug}"), &headers)
        .await
        .into_result()
        .map_err(|reason| state.load_error("project", reason))?;

    Ok(Json(ProjectData { user, project }))
}

pub async fn blog(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<BlogData>, LoadError> {
    if !valid_slug(&slug) {
        return Err(LoadError::NotFound("blog"));
    }

    let blog = state
        .upstream
        .get_json::<Value>(&format!("/api/v1/blogs/{slug}"), &headers)
        .await
        .into_result()
        .map_err(|reason| state.load_error("blog", reason))?;

    Ok(Json(BlogData { user, blog }))
}

/// Page preview: any status is rendered, the CMS decides what the forwarded
/// session may see.
pub async fn preview_page(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<PageData>, LoadError> {
    if !valid_slug(&slug) {
        return Err(LoadError::NotFound("page"));
    }

    let page = fetch_page(&state, &headers, &slug).await?;
    let media_map = prefetch_media(&state, &headers, &page).await;

    Ok(Json(PageData {
        user,
        page,
        media_map,
        is_preview: true,
    }))
}

/// Fetch a page, hide drafts, and prefetch the media its blocks reference.
#[instrument(skip(state, headers, user))]
async fn load_published_page(
    state: &AppState,
    headers: &HeaderMap,
    slug: &str,
    user: Option<Identity>,
) -> Result<PageData, LoadError> {
    let page = fetch_page(state, headers, slug).await?;

    // Drafts and archived pages stay invisible on the public site.
    if page.get("status").and_then(Value::as_str) != Some("published") {
        debug!(slug, "page is not published");
        return Err(LoadError::NotFound("page"));
    }

    let media_map = prefetch_media(state, headers, &page).await;

    Ok(PageData {
        user,
        page,
        media_map,
        is_preview: false,
    })
}

async fn fetch_page(state: &AppState, headers: &HeaderMap, slug: &str) -> Result<Value, LoadError> {
    state
        .upstream
        .get_json::<Value>(&format!("/api/v1/pages/{slug}"), headers)
        .await
        .into_result()
        .map_err(|reason| state.load_error("page", reason))
}

/// Fetch referenced media items, at most [`MEDIA_PREFETCH_CONCURRENCY`] at a
/// time; failures are left out.
async fn prefetch_media(state: &AppState, headers: &HeaderMap, page: &Value) -> Map<String, Value> {
    stream::iter(media_ids(page))
        .map(|id| async move {
            let media = state
                .upstream
                .get_json::<Value>(&format!("/api/v1/media/{id}"), headers)
                .await
                .ok();
            (id, media)
        })
        .buffer_unordered(MEDIA_PREFETCH_CONCURRENCY)
        .filter_map(|(id, media)| async move { media.map(|media| (id, media)) })
        .collect()
        .await
}

/// Media ids referenced by `blocks[].data.image_id` and
/// `blocks[].data.images[].media_id`.
fn media_ids(page: &Value) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    let Some(blocks) = page.get("blocks").and_then(Value::as_array) else {
        return ids;
    };

    for data in blocks.iter().filter_map(|block| block.get("data")) {
        if let Some(id) = data.get("image_id").and_then(id_string) {
            ids.insert(id);
        }
        if let Some(images) = data.get("images").and_then(Value::as_array) {
            ids.extend(images.iter().filter_map(|img| img.get("media_id").and_then(id_string)));
        }
    }

    ids.retain(|id| valid_id(id));
    ids
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn media_ids_collects_images_and_galleries() {
        let page = json!({
            "blocks": [
                { "type": "hero", "data": { "image_id": "m1" } },
                { "type": "gallery", "data": { "images": [
                    { "media_id": "m2" }, { "media_id": 3 }, { "caption": "no id" }
                ] } },
                { "type": "text", "data": { "body": "hello" } },
                { "type": "hero", "data": { "image_id": "m1" } },
                { "type": "broken", "data": { "image_id": "../secret" } },
                { "type": "empty" }
            ]
        });

        let ids: Vec<String> = media_ids(&page).into_iter().collect();
        assert_eq!(ids, vec!["3", "m1", "m2"]);
    }

    #[test]
    fn media_ids_without_blocks() {
        assert!(media_ids(&json!({ "title": "x" })).is_empty());
        assert!(media_ids(&json!({ "blocks": "nope" })).is_empty());
        assert!(media_ids(&json!({ "blocks": [{ "data": { "image_id": "" } }] })).is_empty());
    }
}
