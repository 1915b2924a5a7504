use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::app::dto::{AdjustmentRequest, PageQuery};
use crate::app::errors::ApiResult;
use crate::app::routes::common::{authorized, blocking, created, may_read, ok, validated};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/adjustments", get(list_adjustments).post(adjust_stock))
        .route("/low-stock", get(low_stock))
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<AdjustmentRequest>,
) -> ApiResult {
    let body = authorized(&principal, validated(body)?, "inventory.adjust")?;
    let user_id = principal.user_id();
    let product_id = body.product_id;

    let stock = blocking(move || {
        services
            .workflows
            .adjust_stock(body.product_id, body.delta, &body.reason, user_id)
    })
    .await?;
    Ok(created(json!({ "product_id": product_id, "stock": stock })))
}

pub async fn list_adjustments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<PageQuery>,
) -> ApiResult {
    may_read(&principal, "inventory.read")?;
    Ok(ok(services.projections().adjustments.page(query.request())))
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    may_read(&principal, "inventory.read")?;
    Ok(ok(services.projections().catalog.low_stock()))
}
