use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use validator::ValidationErrors;

use arkpos_auth::AuthzError;
use arkpos_infra::command_dispatcher::DispatchError;
use arkpos_infra::workflows::WorkflowError;
use arkpos_reporting::ReportError;

/// Handlers return the error branch as an already-rendered JSON response.
pub type ApiResult = Result<Response, Response>;

pub fn dispatch_error_to_response(err: DispatchError) -> Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            tracing::error!(error = %msg, "stored event could not be decoded");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn workflow_error_to_response(err: WorkflowError) -> Response {
    match err {
        WorkflowError::Dispatch(e) => dispatch_error_to_response(e),
        WorkflowError::UserNotFound => json_error(StatusCode::NOT_FOUND, "user_not_found", "user not found"),
        WorkflowError::InvalidPassword => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_password", "incorrect password")
        }
        WorkflowError::Suspended => json_error(StatusCode::FORBIDDEN, "user_suspended", "user is suspended"),
        WorkflowError::Password(e) => {
            tracing::error!(error = %e, "password hashing failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "password_error", e.to_string())
        }
    }
}

pub fn report_error_to_response(err: ReportError) -> Response {
    match err {
        ReportError::Fonts(msg) => {
            tracing::warn!(error = %msg, "pdf fonts unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "fonts_unavailable", msg)
        }
        ReportError::Render(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "render_error", msg),
    }
}

pub fn forbidden(err: AuthzError) -> Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn validation_failed(errs: ValidationErrors) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", errs.to_string())
}

pub fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not_found", "not found")
}

/// A blocking task panicked or was cancelled.
pub fn task_failed(err: tokio::task::JoinError) -> Response {
    tracing::error!(error = %err, "blocking task failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
