use axum::{routing::get, Router};

pub mod auth;
pub mod common;
pub mod company;
pub mod inventory;
pub mod parties;
pub mod products;
pub mod purchases;
pub mod reports;
pub mod sales;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/products", products::router())
        .nest("/categories", products::categories_router())
        .nest("/clients", parties::clients_router())
        .nest("/suppliers", parties::suppliers_router())
        .nest("/purchases", purchases::router())
        .nest("/sales", sales::router())
        .nest("/inventory", inventory::router())
        .nest("/reports", reports::router())
        .nest("/company", company::router())
}
