use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::get,
    Json, Router,
};
use serde_json::json;

use arkpos_purchasing::PurchaseId;

use crate::app::dto::{PageQuery, PurchaseRequest};
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{authorized, blocking, created, may_read, no_content, ok, validated};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_purchases).post(register_purchase))
        .route("/price-history", get(price_history))
        .route("/:id", get(get_purchase).put(revise_purchase))
}

pub async fn list_purchases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    may_read(&principal, "purchases.read")?;
    Ok(ok(services.projections().purchases.list()))
}

pub async fn get_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<PurchaseId>,
) -> ApiResult {
    may_read(&principal, "purchases.read")?;
    services
        .projections()
        .purchases
        .get(id)
        .map(ok)
        .ok_or_else(errors::not_found)
}

pub async fn price_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<PageQuery>,
) -> ApiResult {
    may_read(&principal, "purchases.read")?;
    Ok(ok(services.projections().purchases.price_history(query.request())))
}

pub async fn register_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<PurchaseRequest>,
) -> ApiResult {
    let body = authorized(&principal, validated(body)?, "purchases.write")?;
    let user_id = principal.user_id();
    let supplier_id = body.supplier_id;
    let lines = body.into_lines();

    let purchase_id = blocking(move || services.workflows.register_purchase(supplier_id, user_id, lines)).await?;
    Ok(created(json!({ "purchase_id": purchase_id })))
}

pub async fn revise_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<PurchaseId>,
    Json(body): Json<PurchaseRequest>,
) -> ApiResult {
    let body = authorized(&principal, validated(body)?, "purchases.write")?;
    let user_id = principal.user_id();
    let supplier_id = body.supplier_id;
    let lines = body.into_lines();

    blocking(move || services.workflows.revise_purchase(id, supplier_id, user_id, lines)).await?;
    Ok(no_content())
}
