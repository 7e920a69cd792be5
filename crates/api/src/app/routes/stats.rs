use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};

use identyflow_auth::Principal;
use identyflow_core::UserId;

use crate::app::dto;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/analytics", get(analytics))
        .route("/instrutor/:id", get(instrutor))
        .route("/god-metrics", get(god_metrics))
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    dto::json_result(StatusCode::OK, services.stats.dashboard(&principal).await)
}

pub async fn analytics(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    dto::json_result(StatusCode::OK, services.stats.analytics(&principal).await)
}

pub async fn instrutor(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    let id: UserId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    dto::json_result(StatusCode::OK, services.stats.instrutor(&principal, id).await)
}

pub async fn god_metrics(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    dto::json_result(StatusCode::OK, services.stats.god_metrics(&principal).await)
}
