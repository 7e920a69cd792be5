use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use identyflow_core::DomainError;
use identyflow_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Authz(e) => json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
        ServiceError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid email or password",
        ),
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "datastore failure");
            internal_error()
        }
        ServiceError::Internal(msg) => {
            tracing::error!(error = %msg, "internal failure");
            internal_error()
        }
    }
}

fn domain_error_to_response(err: DomainError) -> Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidPlan(_) => json_error(StatusCode::BAD_REQUEST, "invalid_plan", message),
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::SubscriptionNotFound => {
            json_error(StatusCode::NOT_FOUND, "subscription_not_found", message)
        }
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::TrialAlreadyUsed => json_error(StatusCode::CONFLICT, "trial_already_used", message),
        DomainError::TurmaFull { turma, capacidade } => json_error_with(
            StatusCode::CONFLICT,
            "turma_full",
            message,
            json!({ "turma": turma, "capacidade": capacidade }),
        ),
        DomainError::InstructorLimitReached { limite, atual } => json_error_with(
            StatusCode::FORBIDDEN,
            "instructor_limit_reached",
            message,
            json!({ "limite": limite, "atual": atual }),
        ),
        DomainError::SubscriptionRequired => {
            json_error(StatusCode::FORBIDDEN, "subscription_required", message)
        }
        DomainError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", message),
    }
}

fn internal_error() -> Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error",
    )
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    json_error_with(status, code, message, Value::Null)
}

/// Like [`json_error`], merging the members of `extra` into the body.
pub fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    extra: Value,
) -> Response {
    let mut body = json!({
        "error": code,
        "message": message.into(),
    });
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
        body.extend(extra);
    }
    (status, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use identyflow_auth::{Action, AuthzError, Role};

    #[test]
    fn maps_domain_errors_to_status_codes() {
        let cases = [
            (DomainError::validation("x"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("turma"), StatusCode::NOT_FOUND),
            (DomainError::conflict("dup"), StatusCode::CONFLICT),
            (
                DomainError::TurmaFull { turma: "T1".into(), capacidade: 2 },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::InstructorLimitReached { limite: 3, atual: 3 },
                StatusCode::FORBIDDEN,
            ),
            (DomainError::SubscriptionRequired, StatusCode::FORBIDDEN),
            (DomainError::InvalidPlan("gold".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(service_error_to_response(err.into()).status(), status);
        }
    }

    #[test]
    fn authz_and_credentials() {
        let forbidden = AuthzError::Forbidden { action: Action::DeleteTurma, role: Role::Instrutor };
        assert_eq!(
            service_error_to_response(forbidden.into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            service_error_to_response(ServiceError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            service_error_to_response(ServiceError::Internal("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
