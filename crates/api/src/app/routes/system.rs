use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use forgewms_auth::{Capability, authorize};

use crate::context::CurrentUser;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    let identity = user.identity();
    let known = [
        Capability::WAREHOUSE_OPERATOR,
        Capability::DASHBOARD,
        Capability::SERIAL_TRANSFER,
        Capability::QC_DASHBOARD,
        Capability::USER_MANAGEMENT,
    ];
    let capabilities: Vec<&str> = known
        .iter()
        .filter(|c| authorize(identity, c))
        .map(|c| c.as_str())
        .collect();

    Json(serde_json::json!({
        "tenant_id": user.tenant_id().to_string(),
        "user_id": user.user_id().to_string(),
        "username": identity.username,
        "roles": identity.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "capabilities": capabilities,
    }))
}
