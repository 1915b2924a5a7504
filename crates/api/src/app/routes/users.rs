use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};

use arkpos_auth::UserId;

use crate::app::dto::SuspendRequest;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{authorized, blocking, may_read, no_content, ok};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/:id/suspend", post(suspend_user))
        .route("/:id/reactivate", post(reactivate_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    may_read(&principal, "users.manage")?;
    Ok(ok(services.projections().users.list()))
}

pub async fn suspend_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<UserId>,
    body: Option<Json<SuspendRequest>>,
) -> ApiResult {
    let reason = body.and_then(|Json(b)| b.reason);
    let (target, reason) = authorized(&principal, (id, reason), "users.manage")?;
    let actor = principal.user_id();
    blocking(move || services.workflows.suspend_user(actor, target, reason)).await?;
    Ok(no_content())
}

pub async fn reactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<UserId>,
) -> ApiResult {
    let target = authorized(&principal, id, "users.manage")?;
    blocking(move || services.workflows.reactivate_user(target)).await?;
    Ok(no_content())
}
