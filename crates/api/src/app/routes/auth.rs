use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};

use identyflow_auth::Principal;
use identyflow_core::UserId;
use identyflow_infra::{CreateMember, RegisterUser, UpdateUser};

use crate::app::dto;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", put(update_user).delete(delete_user))
        .route("/instrutor", post(create_member))
        .route("/instrutores-sem-admin", get(list_unbound_instrutores))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RegisterUser>,
) -> Response {
    let result = services.users.register(body).await.map(|user| {
        serde_json::json!({
            "message": "usuario registrado",
            "user": user,
        })
    });
    dto::json_result(StatusCode::CREATED, result)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> Response {
    dto::json_result(
        StatusCode::OK,
        services.users.login(&body.email, &body.senha).await,
    )
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    dto::json_result(StatusCode::OK, services.users.list(&principal).await)
}

pub async fn list_unbound_instrutores(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    dto::json_result(
        StatusCode::OK,
        services.users.list_unbound_instrutores(&principal).await,
    )
}

pub async fn create_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateMember>,
) -> Response {
    let linking = body.instrutor_existente_id.is_some();
    let result = services
        .users
        .create_member(&principal, body)
        .await
        .map(dto::member_to_json);
    let status = if linking { StatusCode::OK } else { StatusCode::CREATED };
    dto::json_result(status, result)
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUser>,
) -> Response {
    let id: UserId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    dto::json_result(
        StatusCode::OK,
        services.users.update(&principal, id, body).await,
    )
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    let id: UserId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .users
        .delete(&principal, id)
        .await
        .map(|()| serde_json::json!({ "message": "usuario removido" }));
    dto::json_result(StatusCode::OK, result)
}
