use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use forgewms_core::{DocumentId, LineId};
use forgewms_infra::{DraftDocumentRequest, DraftedDocument};

use crate::app::dto::{self, AllocateRequest, LineResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/", post(draft_document))
        .route("/:id", get(get_document))
        .route("/:id/lines/:line_id/allocate", post(allocate_line))
        .route("/:id/lines/:line_id/add-remaining", post(add_remaining))
}

pub async fn draft_document(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<DraftDocumentRequest>,
) -> axum::response::Response {
    match services.drafts.draft(user.identity(), body).await {
        Ok(document) => (StatusCode::CREATED, Json(DraftedDocument::from(&document))).into_response(),
        Err(e) => errors::document_error_to_response(e),
    }
}

pub async fn get_document(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let document_id: DocumentId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.views.view_document(user.identity(), document_id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::view_error_to_response(e),
    }
}

pub async fn allocate_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<AllocateRequest>,
) -> axum::response::Response {
    let (document_id, line_id) = match parse_line_path(&id, &line_id) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };

    match services
        .allocations
        .allocate(user.identity(), document_id, line_id, body.quantity)
        .await
    {
        Ok(line) => Json(LineResponse::from(&line)).into_response(),
        Err(e) => errors::allocation_error_to_response(e),
    }
}

pub async fn add_remaining(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path((id, line_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (document_id, line_id) = match parse_line_path(&id, &line_id) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };

    match services
        .allocations
        .add_remaining(user.identity(), document_id, line_id)
        .await
    {
        Ok(line) => Json(LineResponse::from(&line)).into_response(),
        Err(e) => errors::allocation_error_to_response(e),
    }
}

fn parse_line_path(id: &str, line_id: &str) -> Result<(DocumentId, LineId), axum::response::Response> {
    Ok((dto::parse_id(id)?, dto::parse_id(line_id)?))
}
