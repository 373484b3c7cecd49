use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use crate::app::services::AppServices;
use crate::context::CurrentUser;

/// Warehouses for the transfer pickers; the offline defaults when the ERP is
/// unreachable (`fallback: true`).
pub async fn list_warehouses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(_user): Extension<CurrentUser>,
) -> axum::response::Response {
    Json(services.warehouses.list().await).into_response()
}
