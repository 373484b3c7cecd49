use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::IntoResponse,
    routing::get,
};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new().route("/:code", get(get_item))
}

/// Item name and UoM for a scanned code. Never fails because of the ERP:
/// unknown or unreachable items come back with `fallback: true`.
pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(_user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    match services.items.lookup_item(&code).await {
        Ok(details) => Json(details).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
