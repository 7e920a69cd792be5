use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};

use identyflow_auth::Principal;
use identyflow_core::{TurmaId, UserId};
use identyflow_school::NewAluno;

use crate::app::dto;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_alunos).post(create_aluno))
        .route("/instrutor/:instrutor_id", get(alunos_by_instrutor))
        .route("/turma/:turma_id", get(alunos_by_turma))
}

pub async fn create_aluno(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<NewAluno>,
) -> Response {
    dto::json_result(
        StatusCode::CREATED,
        services.school.create_aluno(&principal, body).await,
    )
}

pub async fn list_alunos(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    dto::json_result(StatusCode::OK, services.school.list_alunos(&principal).await)
}

pub async fn alunos_by_instrutor(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(instrutor_id): Path<String>,
) -> Response {
    let instrutor_id: UserId = match dto::parse_id(&instrutor_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    dto::json_result(
        StatusCode::OK,
        services.school.alunos_by_instrutor(&principal, instrutor_id).await,
    )
}

pub async fn alunos_by_turma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(turma_id): Path<String>,
) -> Response {
    let turma_id: TurmaId = match dto::parse_id(&turma_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    dto::json_result(
        StatusCode::OK,
        services.school.alunos_by_turma(&principal, turma_id).await,
    )
}
