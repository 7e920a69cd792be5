use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, patch, put},
    Json, Router,
};

use identyflow_auth::Principal;
use identyflow_core::CursoId;
use identyflow_school::{CursoPatch, NewCurso};

use crate::app::dto;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_cursos).post(create_curso))
        .route("/:id", put(update_curso).delete(delete_curso))
        .route("/:id/reativar", patch(reactivate_curso))
}

pub async fn list_cursos(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    dto::json_result(StatusCode::OK, services.school.list_cursos(&principal).await)
}

pub async fn create_curso(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<NewCurso>,
) -> Response {
    dto::json_result(
        StatusCode::CREATED,
        services.school.create_curso(&principal, body).await,
    )
}

pub async fn update_curso(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<CursoPatch>,
) -> Response {
    let id: CursoId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    dto::json_result(
        StatusCode::OK,
        services.school.update_curso(&principal, id, body).await,
    )
}

/// Soft delete: the curso stays stored with `ativo = false`.
pub async fn delete_curso(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    let id: CursoId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .school
        .soft_delete_curso(&principal, id)
        .await
        .map(|curso| serde_json::json!({ "message": "curso desativado", "curso": curso }));
    dto::json_result(StatusCode::OK, result)
}

pub async fn reactivate_curso(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    let id: CursoId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .school
        .reactivate_curso(&principal, id)
        .await
        .map(|curso| serde_json::json!({ "message": "curso reativado", "curso": curso }));
    dto::json_result(StatusCode::OK, result)
}
