use axum::{Router, routing::get};

pub mod documents;
pub mod items;
pub mod system;
pub mod transfers;
pub mod warehouses;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/documents", documents::router())
        .nest("/transfers", transfers::router())
        .nest("/items", items::router())
        .route("/warehouses", get(warehouses::list_warehouses))
}
