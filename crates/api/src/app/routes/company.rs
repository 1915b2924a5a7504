use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use arkpos_parties::CompanyProfile;

use crate::app::dto::CompanyRequest;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{authorized, blocking, ok, validated};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(get_company).put(save_company))
}

/// Any signed-in user may read the profile; it heads every ticket.
pub async fn get_company(Extension(services): Extension<Arc<AppServices>>) -> ApiResult {
    let company = blocking(move || services.workflows.company()).await?;
    Ok(ok(company.profile()))
}

pub async fn save_company(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CompanyRequest>,
) -> ApiResult {
    let profile = authorized(&principal, CompanyProfile::from(validated(body)?), "company.write")?;
    let saved = blocking(move || services.workflows.save_company(profile)).await?;
    Ok(ok(saved))
}
