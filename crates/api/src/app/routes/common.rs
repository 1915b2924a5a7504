use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use validator::Validate;

use arkpos_auth::{CommandAuthorization, Permission};
use arkpos_infra::WorkflowResult;

use crate::app::errors;
use crate::context::PrincipalContext;

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Authorize a command input and hand it back for dispatch.
pub fn authorized<C>(principal: &PrincipalContext, inner: C, permission: &'static str) -> Result<C, Response> {
    let cmd = CmdAuth {
        inner,
        required: vec![Permission::new(permission)],
    };
    crate::authz::authorize_command(principal, &cmd).map_err(errors::forbidden)?;
    Ok(cmd.inner)
}

pub fn may_read(principal: &PrincipalContext, permission: &'static str) -> Result<(), Response> {
    crate::authz::require(principal, permission).map_err(errors::forbidden)
}

pub fn validated<T: Validate>(body: T) -> Result<T, Response> {
    body.validate().map_err(errors::validation_failed)?;
    Ok(body)
}

/// Runs a workflow off the async workers. Used for bcrypt and anything that may
/// touch the database.
pub async fn blocking<T, F>(f: F) -> Result<T, Response>
where
    F: FnOnce() -> WorkflowResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(errors::task_failed)?
        .map_err(errors::workflow_error_to_response)
}

pub fn ok<T: Serialize>(value: T) -> Response {
    Json(value).into_response()
}

pub fn created<T: Serialize>(value: T) -> Response {
    (StatusCode::CREATED, Json(value)).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn pdf(bytes: Vec<u8>, filename: &str) -> Response {
    (
        [
            (axum::http::header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                axum::http::header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}
