//! Clients and suppliers share one aggregate; the kind comes from the mount point.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::get,
    Json, Router,
};
use serde_json::json;

use arkpos_parties::{Party, PartyDetails, PartyId, PartyKind};

use crate::app::dto::{PartyRequest, SearchQuery};
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{authorized, blocking, created, may_read, no_content, ok, validated};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn clients_router() -> Router {
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route("/:id", get(get_client).put(update_client).delete(remove_client))
}

pub fn suppliers_router() -> Router {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route("/:id", get(get_supplier).put(update_supplier).delete(remove_supplier))
}

fn write_permission(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Client => "parties.clients.write",
        PartyKind::Supplier => "parties.suppliers.write",
    }
}

fn party_json(party: &Party) -> serde_json::Value {
    json!({
        "party_id": party.id_typed(),
        "kind": party.kind(),
        "details": party.details(),
    })
}

fn list(services: &AppServices, principal: &PrincipalContext, kind: PartyKind, query: &SearchQuery) -> ApiResult {
    may_read(principal, "parties.read")?;
    let parties = &services.projections().parties;
    let rows = match kind {
        PartyKind::Client => parties.clients(query.term()),
        PartyKind::Supplier => parties.suppliers(query.term()),
    };
    Ok(ok(rows))
}

fn get_one(services: &AppServices, principal: &PrincipalContext, kind: PartyKind, id: PartyId) -> ApiResult {
    may_read(principal, "parties.read")?;
    services
        .projections()
        .parties
        .get(id)
        .filter(|row| row.kind == kind)
        .map(ok)
        .ok_or_else(errors::not_found)
}

async fn create(services: Arc<AppServices>, principal: PrincipalContext, kind: PartyKind, body: PartyRequest) -> ApiResult {
    let details = authorized(&principal, PartyDetails::from(validated(body)?), write_permission(kind))?;
    let party_id = blocking(move || services.workflows.register_party(kind, details)).await?;
    Ok(created(json!({ "party_id": party_id })))
}

async fn update(
    services: Arc<AppServices>,
    principal: PrincipalContext,
    kind: PartyKind,
    id: PartyId,
    body: PartyRequest,
) -> ApiResult {
    let details = authorized(&principal, PartyDetails::from(validated(body)?), write_permission(kind))?;
    let party = blocking(move || services.workflows.update_party(kind, id, details)).await?;
    Ok(ok(party_json(&party)))
}

pub async fn list_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<SearchQuery>,
) -> ApiResult {
    list(&services, &principal, PartyKind::Client, &query)
}

pub async fn get_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<PartyId>,
) -> ApiResult {
    get_one(&services, &principal, PartyKind::Client, id)
}

pub async fn create_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<PartyRequest>,
) -> ApiResult {
    create(services, principal, PartyKind::Client, body).await
}

pub async fn update_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<PartyId>,
    Json(body): Json<PartyRequest>,
) -> ApiResult {
    update(services, principal, PartyKind::Client, id, body).await
}

pub async fn remove_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<PartyId>,
) -> ApiResult {
    let id = authorized(&principal, id, write_permission(PartyKind::Client))?;
    blocking(move || services.workflows.remove_client(id)).await?;
    Ok(no_content())
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<SearchQuery>,
) -> ApiResult {
    list(&services, &principal, PartyKind::Supplier, &query)
}

pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<PartyId>,
) -> ApiResult {
    get_one(&services, &principal, PartyKind::Supplier, id)
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<PartyRequest>,
) -> ApiResult {
    create(services, principal, PartyKind::Supplier, body).await
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<PartyId>,
    Json(body): Json<PartyRequest>,
) -> ApiResult {
    update(services, principal, PartyKind::Supplier, id, body).await
}

pub async fn remove_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<PartyId>,
) -> ApiResult {
    let id = authorized(&principal, id, write_permission(PartyKind::Supplier))?;
    blocking(move || services.workflows.remove_supplier(id)).await?;
    Ok(no_content())
}
