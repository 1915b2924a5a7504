use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::get,
    Router,
};
use chrono::Utc;

use arkpos_reporting::{CashCut, Dashboard, DashboardInput, GeneralReport};

use crate::app::dto::{CashCutQuery, DashboardQuery};
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{may_read, ok, pdf};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

const DEFAULT_DASHBOARD_DAYS: u32 = 7;
const MAX_DASHBOARD_DAYS: u32 = 90;
const RECENT_SALES: usize = 10;

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/cash-cut", get(cash_cut))
        .route("/general.pdf", get(general_report))
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult {
    may_read(&principal, "reports.dashboard")?;
    let projections = services.projections();
    let days = query
        .days
        .unwrap_or(DEFAULT_DASHBOARD_DAYS)
        .clamp(1, MAX_DASHBOARD_DAYS);

    let dashboard = Dashboard::build(DashboardInput {
        today: Utc::now().date_naive(),
        days,
        sales: projections.sales.figures(),
        low_stock: projections.catalog.low_stock(),
        recent_sales: projections.sales.recent(RECENT_SALES),
        product_count: projections.catalog.product_count(),
        client_count: projections.parties.client_count(),
    });
    Ok(ok(dashboard))
}

/// A cashier's tally for one day. Cashiers only see their own drawer.
pub async fn cash_cut(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<CashCutQuery>,
) -> ApiResult {
    may_read(&principal, "reports.cash_cut")?;

    let user_id = match query.user_id {
        Some(other) if other != principal.user_id() => {
            may_read(&principal, "reports.cash_cut.any")?;
            other
        }
        _ => principal.user_id(),
    };
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());

    let cut = CashCut::compute(user_id, date, &services.projections().sales.figures());
    Ok(ok(cut))
}

pub async fn general_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    may_read(&principal, "reports.general")?;
    let projections = services.projections();

    let report = GeneralReport {
        company_name: projections
            .parties
            .company()
            .map(|c| c.name)
            .unwrap_or_else(|| arkpos_sales::DEFAULT_TICKET_TITLE.to_string()),
        generated_at: Utc::now(),
        low_stock: projections.catalog.low_stock(),
        recent_sales: projections.sales.recent(RECENT_SALES),
    };

    let bytes = tokio::task::spawn_blocking(move || arkpos_reporting::render_general_report(&report, &services.fonts))
        .await
        .map_err(errors::task_failed)?
        .map_err(errors::report_error_to_response)?;
    Ok(pdf(bytes, "reporte-general.pdf"))
}
