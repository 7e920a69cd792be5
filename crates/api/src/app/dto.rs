use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use identyflow_billing::{Ciclo, PaymentInfo, Subscription};
use identyflow_core::DomainError;
use identyflow_infra::{MemberOutcome, ServiceResult};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub senha: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub plano: String,
    #[serde(default)]
    pub ciclo: Ciclo,
    #[serde(default)]
    pub pagamento: Option<PaymentInfo>,
}

// -------------------------
// Response helpers
// -------------------------

/// Serialize a successful result with `status`, or map the error.
pub fn json_result<T: Serialize>(status: StatusCode, result: ServiceResult<T>) -> Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Parse a path id, answering 400 when it is not a valid id.
pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>()
        .map_err(|e| errors::service_error_to_response(e.into()))
}

pub fn assinatura_to_json(message: &str, sub: &Subscription) -> serde_json::Value {
    json!({
        "message": message,
        "assinatura": {
            "plano": sub.plano,
            "ciclo": sub.ciclo,
            "status": sub.status,
            "dataExpiracao": sub.data_expiracao,
        },
    })
}

pub fn member_to_json(outcome: MemberOutcome) -> serde_json::Value {
    match outcome {
        MemberOutcome::Linked(user) => json!({
            "message": "instrutor vinculado",
            "user": user,
        }),
        MemberOutcome::Created { user, senha_gerada } => {
            let mut body = json!({
                "message": "usuario criado",
                "user": user,
            });
            if let (Some(senha), Some(obj)) = (senha_gerada, body.as_object_mut()) {
                obj.insert("senhaGerada".to_string(), json!(senha));
            }
            body
        }
    }
}
