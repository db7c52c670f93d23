use super::handlers::health;
use axum::Json;
use utoipa::OpenApi;

/// Operational endpoints. Page data routes return opaque CMS payloads and
/// are left out of the document.
#[derive(OpenApi)]
#[openapi(
    paths(health::health),
    components(schemas(health::Health)),
    tags((name = "health", description = "Liveness of the gate and its upstream"))
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}
