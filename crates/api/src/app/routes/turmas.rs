use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};

use identyflow_auth::Principal;
use identyflow_core::{CursoId, TurmaId};
use identyflow_school::{NewTurma, TurmaPatch};

use crate::app::dto;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_turmas).post(create_turma))
        .route("/proxima/:curso_nome", get(proxima_turma))
        .route("/curso/:curso_id", get(turmas_by_curso))
        .route("/:id", get(get_turma).put(update_turma).delete(delete_turma))
        .route("/:id/alunos", get(turma_alunos))
}

pub async fn list_turmas(Extension(services): Extension<Arc<AppServices>>) -> Response {
    dto::json_result(StatusCode::OK, services.school.list_turmas().await)
}

pub async fn get_turma(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let id: TurmaId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    dto::json_result(StatusCode::OK, services.school.get_turma(id).await)
}

pub async fn turmas_by_curso(
    Extension(services): Extension<Arc<AppServices>>,
    Path(curso_id): Path<String>,
) -> Response {
    let curso_id: CursoId = match dto::parse_id(&curso_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    dto::json_result(StatusCode::OK, services.school.turmas_by_curso(curso_id).await)
}

pub async fn proxima_turma(
    Extension(services): Extension<Arc<AppServices>>,
    Path(curso_nome): Path<String>,
) -> Response {
    dto::json_result(StatusCode::OK, services.school.proxima_turma(&curso_nome).await)
}

pub async fn create_turma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<NewTurma>,
) -> Response {
    dto::json_result(
        StatusCode::CREATED,
        services.school.create_turma(&principal, body).await,
    )
}

pub async fn update_turma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<TurmaPatch>,
) -> Response {
    let id: TurmaId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    dto::json_result(
        StatusCode::OK,
        services.school.update_turma(&principal, id, body).await,
    )
}

pub async fn delete_turma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    let id: TurmaId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .school
        .delete_turma(&principal, id)
        .await
        .map(|()| serde_json::json!({ "message": "turma removida" }));
    dto::json_result(StatusCode::OK, result)
}

pub async fn turma_alunos(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    let id: TurmaId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    dto::json_result(StatusCode::OK, services.school.turma_alunos(&principal, id).await)
}
