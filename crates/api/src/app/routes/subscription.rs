use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use identyflow_auth::Principal;
use identyflow_billing::{SIGNATURE_HEADER, WebhookEvent, verify_signature};
use identyflow_core::DomainError;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/minha", get(minha))
        .route("/feature/:feature", get(feature))
        .route("/limite/:tipo", get(limite))
        .route("/criar", post(criar))
        .route("/trial", post(trial))
        .route("/cancelar", post(cancelar))
}

pub async fn planos(Extension(services): Extension<Arc<AppServices>>) -> Response {
    (StatusCode::OK, Json(services.catalog().clone())).into_response()
}

pub async fn minha(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    let result = services
        .subscriptions
        .summary(&principal)
        .await
        .and_then(|summary| summary.ok_or_else(|| DomainError::SubscriptionNotFound.into()));
    dto::json_result(StatusCode::OK, result)
}

pub async fn feature(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(feature): Path<String>,
) -> Response {
    dto::json_result(
        StatusCode::OK,
        services.subscriptions.feature(&principal, &feature).await,
    )
}

pub async fn limite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(tipo): Path<String>,
) -> Response {
    dto::json_result(
        StatusCode::OK,
        services.subscriptions.limit(&principal, &tipo).await,
    )
}

pub async fn criar(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::SubscribeRequest>,
) -> Response {
    let result = services
        .subscriptions
        .subscribe(&principal, &body.plano, body.ciclo, body.pagamento)
        .await
        .map(|sub| dto::assinatura_to_json("assinatura criada", &sub));
    dto::json_result(StatusCode::CREATED, result)
}

pub async fn trial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    let result = services
        .subscriptions
        .start_trial(&principal)
        .await
        .map(|sub| dto::assinatura_to_json("trial de 7 dias iniciado", &sub));
    dto::json_result(StatusCode::CREATED, result)
}

pub async fn cancelar(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    let result = services.subscriptions.cancel(&principal).await.map(|sub| {
        json!({
            "message": format!(
                "assinatura cancelada; acesso ate {}",
                sub.data_expiracao.format("%d/%m/%Y")
            ),
            "dataExpiracao": sub.data_expiracao,
        })
    });
    dto::json_result(StatusCode::OK, result)
}

/// Gateway callback. The raw body must carry a valid HMAC signature
/// before it is parsed or applied.
pub async fn webhook(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(secret) = services.webhook_secret.as_deref() else {
        tracing::warn!("webhook received but no WEBHOOK_SECRET is configured");
        return errors::json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "webhook_disabled",
            "webhooks are not configured",
        );
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = verify_signature(secret, &body, signature) {
        tracing::warn!(error = %e, "webhook signature rejected");
        return errors::json_error(StatusCode::UNAUTHORIZED, "invalid_signature", e.to_string());
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_payload", e.to_string());
        }
    };

    let result = services
        .subscriptions
        .apply_webhook(&event)
        .await
        .map(|outcome| json!({ "received": true, "outcome": outcome }));
    dto::json_result(StatusCode::OK, result)
}
