use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;

use arkpos_catalog::{CategoryId, Product, ProductId};
use arkpos_infra::workflows::NewProduct;

use crate::app::dto::{CategoryRequest, ProductRequest, SearchQuery};
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{authorized, blocking, created, may_read, no_content, ok, validated};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product))
        .route("/:id/deactivate", post(deactivate_product))
        .route("/:id/reactivate", post(reactivate_product))
}

pub fn categories_router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", put(rename_category).delete(remove_category))
}

fn product_json(product: &Product) -> serde_json::Value {
    json!({
        "product_id": product.id_typed(),
        "details": product.details(),
        "active": product.is_active(),
    })
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<SearchQuery>,
) -> ApiResult {
    may_read(&principal, "catalog.read")?;
    Ok(ok(services
        .projections()
        .catalog
        .list(query.term(), query.include_inactive)))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ProductId>,
) -> ApiResult {
    may_read(&principal, "catalog.read")?;
    services
        .projections()
        .catalog
        .get(id)
        .map(ok)
        .ok_or_else(errors::not_found)
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ProductRequest>,
) -> ApiResult {
    let body = validated(body)?;
    let input = authorized(
        &principal,
        NewProduct {
            details: body.details(),
            opening_stock: body.opening_stock.unwrap_or_default(),
        },
        "catalog.write",
    )?;
    let product_id = blocking(move || services.workflows.register_product(input)).await?;
    Ok(created(json!({ "product_id": product_id })))
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductRequest>,
) -> ApiResult {
    let body = validated(body)?;
    let details = authorized(&principal, body.details(), "catalog.write")?;
    let product = blocking(move || services.workflows.update_product(id, details)).await?;
    Ok(ok(product_json(&product)))
}

pub async fn deactivate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ProductId>,
) -> ApiResult {
    let id = authorized(&principal, id, "catalog.write")?;
    blocking(move || services.workflows.deactivate_product(id)).await?;
    Ok(no_content())
}

pub async fn reactivate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ProductId>,
) -> ApiResult {
    let id = authorized(&principal, id, "catalog.write")?;
    blocking(move || services.workflows.reactivate_product(id)).await?;
    Ok(no_content())
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    may_read(&principal, "catalog.read")?;
    Ok(ok(services.projections().catalog.categories()))
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CategoryRequest>,
) -> ApiResult {
    let body = authorized(&principal, validated(body)?, "catalog.write")?;
    let category_id = blocking(move || services.workflows.create_category(&body.name)).await?;
    Ok(created(json!({ "category_id": category_id })))
}

pub async fn rename_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryRequest>,
) -> ApiResult {
    let body = authorized(&principal, validated(body)?, "catalog.write")?;
    blocking(move || services.workflows.rename_category(id, &body.name)).await?;
    Ok(no_content())
}

pub async fn remove_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<CategoryId>,
) -> ApiResult {
    let id = authorized(&principal, id, "catalog.write")?;
    blocking(move || services.workflows.remove_category(id)).await?;
    Ok(no_content())
}
