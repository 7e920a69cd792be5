use axum::{
    routing::{get, post},
    Router,
};

pub mod alunos;
pub mod auth;
pub mod cursos;
pub mod stats;
pub mod subscription;
pub mod system;
pub mod turmas;

/// Endpoints reachable without a bearer token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/subscription/planos", get(subscription::planos))
        .route("/subscription/webhook", post(subscription::webhook))
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/auth", auth::router())
        .nest("/cursos", cursos::router())
        .nest("/turmas", turmas::router())
        .nest("/alunos", alunos::router())
        .nest("/stats", stats::router())
        .nest("/subscription", subscription::router())
}
