use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use forgewms_core::TransferId;
use forgewms_infra::CreateTransferRequest;
use forgewms_warehouse::TransferStatus;

use crate::app::dto::{self, ListTransfersQuery, QcApproveRequest, QcRejectRequest};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_transfers).post(create_transfer))
        .route("/qc-queue", get(qc_queue))
        .route("/:id", get(get_transfer).delete(delete_transfer))
        .route("/:id/submit", post(submit_transfer))
        .route("/:id/qc-approve", post(qc_approve))
        .route("/:id/qc-reject", post(qc_reject))
}

pub async fn create_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateTransferRequest>,
) -> axum::response::Response {
    match services.transfers.create(user.identity(), body).await {
        Ok(transfer) => (StatusCode::CREATED, Json(transfer)).into_response(),
        Err(e) => errors::transfer_error_to_response(e),
    }
}

/// `GET /transfers?status=submitted`; the status defaults to `submitted`.
pub async fn list_transfers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListTransfersQuery>,
) -> axum::response::Response {
    let status = match query.status.as_deref() {
        None => TransferStatus::Submitted,
        Some(s) => match TransferStatus::parse(s) {
            Ok(status) => status,
            Err(e) => return errors::domain_error_to_response(e),
        },
    };
    match services.transfers.list(user.identity(), status).await {
        Ok(transfers) => Json(transfers).into_response(),
        Err(e) => errors::transfer_error_to_response(e),
    }
}

pub async fn qc_queue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    match services.transfers.qc_queue(user.identity()).await {
        Ok(queue) => Json(queue).into_response(),
        Err(e) => errors::transfer_error_to_response(e),
    }
}

pub async fn get_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransferId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.transfers.get(user.identity(), id).await {
        Ok(transfer) => Json(transfer).into_response(),
        Err(e) => errors::transfer_error_to_response(e),
    }
}

pub async fn submit_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransferId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.transfers.submit(user.identity(), id).await {
        Ok(transfer) => Json(transfer).into_response(),
        Err(e) => errors::transfer_error_to_response(e),
    }
}

pub async fn qc_approve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    body: Option<Json<QcApproveRequest>>,
) -> axum::response::Response {
    let id: TransferId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let notes = body.map(|Json(b)| b).unwrap_or_default().notes;
    match services.transfers.approve_and_post(user.identity(), id, notes).await {
        Ok(transfer) => Json(transfer).into_response(),
        Err(e) => errors::transfer_error_to_response(e),
    }
}

pub async fn qc_reject(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<QcRejectRequest>,
) -> axum::response::Response {
    let id: TransferId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.transfers.reject(user.identity(), id, &body.notes).await {
        Ok(transfer) => Json(transfer).into_response(),
        Err(e) => errors::transfer_error_to_response(e),
    }
}

pub async fn delete_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransferId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.transfers.delete(user.identity(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::transfer_error_to_response(e),
    }
}
