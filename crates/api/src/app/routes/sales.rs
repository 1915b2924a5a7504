use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use arkpos_infra::projections::sales::SalesFilter;
use arkpos_infra::read_model::PageRequest;
use arkpos_infra::workflows::CheckoutRequest;
use arkpos_sales::SaleId;

use crate::app::dto::{CartRequest, SalesQuery, VoidRequest};
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{authorized, blocking, created, may_read, no_content, ok, pdf, validated};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(sales_history))
        .route("/quote", post(quote))
        .route("/checkout", post(checkout))
        .route("/:id", get(get_sale))
        .route("/:id/ticket", get(ticket))
        .route("/:id/ticket.pdf", get(ticket_pdf))
        .route("/:id/void", post(void_sale))
}

/// Prices the cart the way checkout would, without recording anything.
pub async fn quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CartRequest>,
) -> ApiResult {
    let body = authorized(&principal, validated(body)?, "sales.checkout")?;
    let lines = body.checkout_lines();
    let quote = blocking(move || {
        services
            .workflows
            .quote(&lines, &body.discount, body.payment_method, body.cash_received)
    })
    .await?;
    Ok(ok(quote))
}

pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CartRequest>,
) -> ApiResult {
    let body = authorized(&principal, validated(body)?, "sales.checkout")?;
    let request = CheckoutRequest {
        user_id: principal.user_id(),
        client_id: body.client_id,
        lines: body.checkout_lines(),
        discount: body.discount,
        payment_method: body.payment_method,
        cash_received: body.cash_received,
    };

    let svc = services.clone();
    let sale_id = blocking(move || svc.workflows.checkout(request)).await?;

    // The ticket is built from the aggregate so the caller can print right away.
    let ticket = blocking(move || services.workflows.ticket(sale_id)).await?;
    Ok(created(json!({ "sale_id": sale_id, "ticket": ticket })))
}

pub async fn sales_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<SalesQuery>,
) -> ApiResult {
    may_read(&principal, "sales.read")?;
    let filter = SalesFilter {
        query: query.q.filter(|q| !q.trim().is_empty()),
        from: query.from,
        to: query.to,
    };
    let page = PageRequest::from_query(query.page, query.page_size, 20);
    Ok(ok(services.projections().sales.history(&filter, page)))
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<SaleId>,
) -> ApiResult {
    may_read(&principal, "sales.read")?;
    services
        .projections()
        .sales
        .get(id)
        .map(ok)
        .ok_or_else(errors::not_found)
}

pub async fn ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<SaleId>,
) -> ApiResult {
    may_read(&principal, "sales.read")?;
    let ticket = blocking(move || services.workflows.ticket(id)).await?;
    Ok(ok(ticket))
}

pub async fn ticket_pdf(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<SaleId>,
) -> ApiResult {
    may_read(&principal, "sales.read")?;
    let svc = services.clone();
    let ticket = blocking(move || svc.workflows.ticket(id)).await?;

    let bytes = tokio::task::spawn_blocking(move || arkpos_reporting::render_ticket(&ticket, &services.fonts))
        .await
        .map_err(errors::task_failed)?
        .map_err(errors::report_error_to_response)?;
    Ok(pdf(bytes, &format!("ticket-{id}.pdf")))
}

pub async fn void_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<SaleId>,
    Json(body): Json<VoidRequest>,
) -> ApiResult {
    let body = authorized(&principal, validated(body)?, "sales.void")?;
    let user_id = principal.user_id();
    blocking(move || services.workflows.void_sale(id, user_id, &body.reason)).await?;
    Ok(no_content())
}
