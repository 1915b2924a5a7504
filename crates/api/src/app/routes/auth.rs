use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use arkpos_auth::JwtClaims;
use arkpos_infra::workflows::NewUser;

use crate::app::dto::{ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, UpdateProfileRequest, UserView};
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{blocking, created, no_content, ok, validated};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Routes reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn router() -> Router {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/password", post(change_password))
}

/// Self-registration. The very first account becomes the administrator.
pub async fn register(Extension(services): Extension<Arc<AppServices>>, Json(body): Json<RegisterRequest>) -> ApiResult {
    let input = NewUser::from(validated(body)?);
    let user = blocking(move || services.workflows.register_user(input)).await?;
    tracing::info!(user_id = %user.id_typed(), role = user.role().as_str(), "account registered");
    Ok(created(UserView::from(&user)))
}

pub async fn login(Extension(services): Extension<Arc<AppServices>>, Json(body): Json<LoginRequest>) -> ApiResult {
    let body = validated(body)?;
    let svc = services.clone();
    let user = blocking(move || svc.workflows.login(&body.identifier, &body.password)).await?;

    let claims = JwtClaims::new(
        user.id_typed(),
        user.full_name(),
        vec![user.role().clone()],
        Utc::now(),
        services.token_ttl,
    );
    let token = services.jwt.issue(&claims).map_err(|e| {
        tracing::error!(error = %e, "token signing failed");
        errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "token_error", e.to_string())
    })?;

    Ok(ok(LoginResponse {
        token,
        expires_at: claims.expires_at,
        user: UserView::from(&user),
    }))
}

pub async fn profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let user = blocking(move || services.workflows.user(principal.user_id())).await?;
    Ok(ok(UserView::from(&user)))
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult {
    let body = validated(body)?;
    let user = blocking(move || {
        services
            .workflows
            .update_profile(principal.user_id(), &body.full_name, body.phone)
    })
    .await?;
    Ok(ok(UserView::from(&user)))
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ChangePasswordRequest>,
) -> ApiResult {
    let body = validated(body)?;
    blocking(move || {
        services
            .workflows
            .change_password(principal.user_id(), &body.current_password, &body.new_password)
    })
    .await?;
    Ok(no_content())
}
